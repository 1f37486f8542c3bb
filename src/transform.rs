use std::f64::consts::PI;
use std::str::FromStr;

use ndarray::{Array2, Array3};
use ndarray_linalg::{Eigh, UPLO};

use crate::error::{Error, Result};
use crate::tensor::{fold, unfold};

/// Which orthonormal transform is applied along the day axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Basis derived from the current estimate, refreshed as it changes.
    Unitary,
    /// Fixed orthonormal discrete cosine basis.
    Dct,
}

impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unitary" => Ok(Transform::Unitary),
            "dct" => Ok(Transform::Dct),
            _ => Err(Error::Configuration(format!(
                "unknown transform '{}', expected 'unitary' or 'dct'",
                s
            ))),
        }
    }
}

/// Orthonormal basis for the day axis, derived from the tensor itself.
///
/// Eigenvectors of the mode-2 Gram matrix; row k of the result is one basis
/// vector. Eigen-ordering and signs vary between runs, which does not matter
/// as long as the same basis is used for `forward` and `inverse`.
pub fn data_basis(tensor: &Array3<f64>) -> Result<Array2<f64>> {
    let mat = unfold(tensor, 2)?;
    let gram = mat.dot(&mat.t());
    let (_, vectors) = gram.eigh(UPLO::Lower)?;
    Ok(vectors.t().to_owned())
}

/// Orthonormal DCT-II matrix of size n×n, rows indexed by frequency.
pub fn dct_basis(n: usize) -> Array2<f64> {
    let mut phi = Array2::zeros((n, n));
    for k in 0..n {
        let scale = if k == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        };
        for t in 0..n {
            phi[[k, t]] = scale * (PI * (2 * t + 1) as f64 * k as f64 / (2 * n) as f64).cos();
        }
    }
    phi
}

/// Projects the day axis through the basis.
pub fn forward(tensor: &Array3<f64>, basis: &Array2<f64>) -> Result<Array3<f64>> {
    let dims = tensor.dim();
    fold(&basis.dot(&unfold(tensor, 2)?), dims, 2)
}

/// Inverse projection; exact inverse of `forward` for an orthonormal basis.
pub fn inverse(tensor: &Array3<f64>, basis: &Array2<f64>) -> Result<Array3<f64>> {
    let dims = tensor.dim();
    fold(&basis.t().dot(&unfold(tensor, 2)?), dims, 2)
}
