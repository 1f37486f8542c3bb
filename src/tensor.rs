use ndarray::{Array2, Array3};

use crate::error::{Error, Result};

/// Unfolds a third-order tensor into a matrix keeping `mode` as the row axis.
///
/// The remaining axes are linearized column-major: the first remaining axis
/// varies fastest along the columns. `fold` is the exact inverse.
pub fn unfold(tensor: &Array3<f64>, mode: usize) -> Result<Array2<f64>> {
    let (n1, n2, n3) = tensor.dim();
    match mode {
        0 => {
            let mut mat = Array2::zeros((n1, n2 * n3));
            for ((i, j, k), &value) in tensor.indexed_iter() {
                mat[[i, j + k * n2]] = value;
            }
            Ok(mat)
        }
        1 => {
            let mut mat = Array2::zeros((n2, n1 * n3));
            for ((i, j, k), &value) in tensor.indexed_iter() {
                mat[[j, i + k * n1]] = value;
            }
            Ok(mat)
        }
        2 => {
            let mut mat = Array2::zeros((n3, n1 * n2));
            for ((i, j, k), &value) in tensor.indexed_iter() {
                mat[[k, i + j * n1]] = value;
            }
            Ok(mat)
        }
        _ => Err(Error::Shape(format!(
            "unfold mode must be 0, 1 or 2, got {}",
            mode
        ))),
    }
}

/// Folds a mode matrix back into a tensor with the given dimensions.
pub fn fold(matrix: &Array2<f64>, dims: (usize, usize, usize), mode: usize) -> Result<Array3<f64>> {
    let (n1, n2, n3) = dims;
    let expected = match mode {
        0 => (n1, n2 * n3),
        1 => (n2, n1 * n3),
        2 => (n3, n1 * n2),
        _ => {
            return Err(Error::Shape(format!(
                "fold mode must be 0, 1 or 2, got {}",
                mode
            )))
        }
    };
    if matrix.dim() != expected {
        return Err(Error::Shape(format!(
            "cannot fold a {:?} matrix into {:?} along mode {}",
            matrix.dim(),
            dims,
            mode
        )));
    }
    let mut tensor = Array3::zeros(dims);
    for ((i, j, k), value) in tensor.indexed_iter_mut() {
        *value = match mode {
            0 => matrix[[i, j + k * n2]],
            1 => matrix[[j, i + k * n1]],
            _ => matrix[[k, i + j * n1]],
        };
    }
    Ok(tensor)
}
