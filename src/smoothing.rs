use ndarray::Array2;
use ndarray_linalg::Inverse;

use crate::error::{Error, Result};

/// First-difference operator mapping a length-`tt` series to its `tt - 1`
/// consecutive differences.
pub fn difference_matrix(tt: usize) -> Result<Array2<f64>> {
    check_length(tt)?;
    let mut d = Array2::zeros((tt - 1, tt));
    for i in 0..tt - 1 {
        d[[i, i]] = -1.0;
        d[[i, i + 1]] = 1.0;
    }
    Ok(d)
}

/// `DᵀD` via the explicit dense product.
pub fn roughness_gram_dense(tt: usize) -> Result<Array2<f64>> {
    let d = difference_matrix(tt)?;
    Ok(d.t().dot(&d))
}

/// `DᵀD` assembled from its tridiagonal band, without materializing `D`.
pub fn roughness_gram_banded(tt: usize) -> Result<Array2<f64>> {
    check_length(tt)?;
    let mut gram = Array2::zeros((tt, tt));
    for i in 0..tt {
        gram[[i, i]] = if i == 0 || i == tt - 1 { 1.0 } else { 2.0 };
        if i + 1 < tt {
            gram[[i, i + 1]] = -1.0;
            gram[[i + 1, i]] = -1.0;
        }
    }
    Ok(gram)
}

pub fn roughness_gram(tt: usize, banded: bool) -> Result<Array2<f64>> {
    if banded {
        roughness_gram_banded(tt)
    } else {
        roughness_gram_dense(tt)
    }
}

/// Blending operator `(DᵀD + ratio·I)⁻¹ · ratio` with `ratio = rho / lambda`.
///
/// Right-multiplying a row of time series by this matrix gives the minimizer
/// of `lambda·‖Dz‖² + rho·‖z − x‖²` for that row.
pub fn fill_operator(gram: &Array2<f64>, ratio: f64) -> Result<Array2<f64>> {
    let tt = gram.nrows();
    let mut system = gram.clone();
    for i in 0..tt {
        system[[i, i]] += ratio;
    }
    Ok(system.inv()? * ratio)
}

fn check_length(tt: usize) -> Result<()> {
    if tt < 2 {
        return Err(Error::Configuration(format!(
            "temporal smoothing needs at least 2 time steps, got {}",
            tt
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array1};

    #[test]
    fn test_banded_and_dense_constructions_agree() {
        for tt in [2, 3, 6, 11] {
            let dense = roughness_gram_dense(tt).unwrap();
            let banded = roughness_gram_banded(tt).unwrap();
            for (a, b) in dense.iter().zip(banded.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_degenerate_length_is_a_configuration_error() {
        assert!(matches!(difference_matrix(1), Err(Error::Configuration(_))));
        assert!(matches!(
            roughness_gram_banded(0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_fill_operator_on_a_two_step_series() {
        // gram = [[1, -1], [-1, 1]], ratio 1: inverse of [[2, -1], [-1, 2]]
        // is [[2, 1], [1, 2]] / 3
        let gram = roughness_gram_banded(2).unwrap();
        let op = fill_operator(&gram, 1.0).unwrap();
        assert_abs_diff_eq!(op[[0, 0]], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(op[[0, 1]], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(op[[1, 0]], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(op[[1, 1]], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_series_is_a_fixed_point() {
        // a flat series has zero roughness, so blending leaves it untouched
        let gram = roughness_gram_banded(5).unwrap();
        let op = fill_operator(&gram, 0.7).unwrap();
        let series: Array1<f64> = arr1(&[4.2; 5]);
        let blended = series.dot(&op);
        for &v in blended.iter() {
            assert_abs_diff_eq!(v, 4.2, epsilon = 1e-10);
        }
    }
}
