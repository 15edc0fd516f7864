use crate::correlation_models::AnisotropicExponentialCorr;
use crate::errors::{KrigingError, Result};
use crate::linalg::PINV_RCOND_FACTOR;
use linfa::{Float, ParamGuard};

use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated Kriging parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct KrigingValidParams<F: Float> {
    /// Correlation model holding the anisotropy weights
    pub(crate) corr: AnisotropicExponentialCorr<F>,
    /// Relative cutoff of small singular values for the pseudo-inverse of R
    pub(crate) pinv_rcond: F,
}

impl<F: Float> KrigingValidParams<F> {
    /// Get correlation model
    pub fn corr(&self) -> &AnisotropicExponentialCorr<F> {
        &self.corr
    }

    /// Get anisotropy weights
    pub fn anisotropy(&self) -> &Array1<F> {
        self.corr.sig_inv()
    }

    /// Get relative cutoff used by the pseudo-inverse
    pub fn pinv_rcond(&self) -> F {
        self.pinv_rcond
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [Kriging algorithm](struct.Kriging.html).
pub struct KrigingParams<F: Float>(KrigingValidParams<F>);

impl<F: Float> KrigingParams<F> {
    /// A constructor for Kriging parameters given the anisotropy weights
    pub fn new(anisotropy: Array1<F>) -> KrigingParams<F> {
        Self(KrigingValidParams {
            corr: AnisotropicExponentialCorr {
                sig_inv: anisotropy,
            },
            pinv_rcond: F::cast(PINV_RCOND_FACTOR) * F::epsilon(),
        })
    }

    /// Set anisotropy weights, i.e. the diagonal of the inverse metric
    pub fn anisotropy(mut self, anisotropy: Array1<F>) -> Self {
        self.0.corr.sig_inv = anisotropy;
        self
    }

    /// Set the relative cutoff for small singular values.
    ///
    /// Singular values of R smaller than `pinv_rcond * s_max` are
    /// considered null when computing its pseudo-inverse.
    pub fn pinv_rcond(mut self, pinv_rcond: F) -> Self {
        self.0.pinv_rcond = pinv_rcond;
        self
    }
}

impl<F: Float> From<KrigingValidParams<F>> for KrigingParams<F> {
    fn from(valid: KrigingValidParams<F>) -> Self {
        KrigingParams(valid)
    }
}

impl<F: Float> ParamGuard for KrigingParams<F> {
    type Checked = KrigingValidParams<F>;
    type Error = KrigingError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.corr.check()?;
        let rcond = self.0.pinv_rcond;
        if !rcond.is_finite() || rcond < F::zero() || rcond >= F::one() {
            return Err(KrigingError::InvalidInputError(format!(
                "`pinv_rcond` should be in [0, 1), got {rcond}"
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
