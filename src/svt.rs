use ndarray::{s, Array2, Array3};
use ndarray_linalg::SVD;

use crate::error::Result;

/// Soft-thresholds the singular values of every frontal slice of a
/// transform-domain tensor.
///
/// Each (n1, n2) slice along the third axis is decomposed independently;
/// singular values strictly above `tau` are kept and shrunk by `tau`, the
/// rest are dropped. A slice with no singular value above `tau` comes back
/// as the zero matrix.
pub fn slicewise_svt(tensor: &Array3<f64>, tau: f64) -> Result<Array3<f64>> {
    let (n1, n2, n3) = tensor.dim();
    let mut out = Array3::zeros((n1, n2, n3));

    for k in 0..n3 {
        let slice = tensor.slice(s![.., .., k]).to_owned();
        let (u, sing, vt) = slice.svd(true, true)?;
        let (u, vt) = (u.unwrap(), vt.unwrap()); // requested factors are present

        // singular values come back non-increasing
        let kept = sing.iter().take_while(|&&v| v > tau).count();
        if kept == 0 {
            continue;
        }

        let shrunk = sing.slice(s![..kept]).mapv(|v| v - tau);
        let rebuilt = u
            .slice(s![.., ..kept])
            .dot(&Array2::from_diag(&shrunk))
            .dot(&vt.slice(s![..kept, ..]));
        out.slice_mut(s![.., .., k]).assign(&rebuilt);
    }

    Ok(out)
}
