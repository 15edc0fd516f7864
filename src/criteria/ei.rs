use crate::utils::{finite_or_zero, norm_cdf, norm_pdf};
use linfa::Float;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A structure for Expected Improvement implementation
/// (maximization of the objective)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ExpectedImprovement;

impl ExpectedImprovement {
    /// Name of the infill criterion
    pub fn name(&self) -> &'static str {
        "EI"
    }

    /// Compute EI given the prediction `pred` and its standard error `sigma`
    /// at some point, and the current maximum `fmax` of the objective function.
    ///
    /// `EI = (pred - fmax) * Phi(z) + sigma * phi(z)` with `z = (pred - fmax) / sigma`.
    ///
    /// No improvement is expected where there is no predictive uncertainty:
    /// EI is zero when `sigma` is zero, and also when the result is not finite.
    pub fn value<F: Float>(&self, pred: F, fmax: F, sigma: F) -> F {
        if !(sigma > F::zero()) {
            return F::zero();
        }
        let diff_y = pred - fmax;
        let z = diff_y / sigma;
        finite_or_zero(diff_y * norm_cdf(z) + sigma * norm_pdf(z))
    }
}

/// Expected Improvement infill criterion
pub const EI: ExpectedImprovement = ExpectedImprovement {};
