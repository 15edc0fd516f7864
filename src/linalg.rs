//! Moore-Penrose pseudo-inverse of the correlation matrix.

use crate::errors::{KrigingError, Result};
use linfa::Float;
use linfa_linalg::svd::*;
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Default relative cutoff for small singular values when computing the
/// pseudo-inverse, expressed as a multiple of the machine epsilon.
pub const PINV_RCOND_FACTOR: f64 = 1e6;

/// Pseudo-inverse of a matrix together with the numerical rank of the matrix,
/// both computed from a single singular value decomposition.
#[derive(Debug)]
pub(crate) struct PseudoInverse<F: Float> {
    pub pinv: Array2<F>,
    pub rank: usize,
}

/// Compute the pseudo-inverse of `a`.
///
/// Singular values lower or equal to `rcond * s_max` are discarded.
/// Rank counts singular values greater than `s_max * max(nrows, ncols) * eps`.
pub(crate) fn pseudo_inverse<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    rcond: F,
) -> Result<PseudoInverse<F>> {
    let (u, sv, vt) = a.svd(true, true)?;
    let (u, vt) = match (u, vt) {
        (Some(u), Some(vt)) => (u, vt),
        _ => {
            return Err(KrigingError::PinvComputationError(
                "singular vectors are missing from SVD".to_string(),
            ))
        }
    };
    if sv.iter().any(|v| !v.is_finite()) {
        return Err(KrigingError::PinvComputationError(
            "non finite singular values".to_string(),
        ));
    }

    let s_max = sv.fold(F::zero(), |acc, &v| acc.max(v));
    let cutoff = rcond * s_max;
    let rank_tol = s_max * F::cast(a.nrows().max(a.ncols())) * F::epsilon();
    let rank = sv.iter().filter(|&&v| v > rank_tol).count();

    let sv_inv = sv.mapv(|v| if v > cutoff { F::one() / v } else { F::zero() });
    // V . diag(1/s) . U^t
    let pinv = (&vt.t() * &sv_inv).dot(&u.t());

    Ok(PseudoInverse { pinv, rank })
}
