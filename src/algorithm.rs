use crate::correlation_models::AnisotropicExponentialCorr;
use crate::criteria::EI;
use crate::errors::{KrigingError, Result};
use crate::linalg::pseudo_inverse;
use crate::parameters::{KrigingParams, KrigingValidParams};
use crate::utils::safe_div;

use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use linfa::ParamGuard;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};
use ndarray_stats::QuantileExt;

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal parameters computed during fitting
/// used later on in prediction computations
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct KrigingInnerParams<F: Float> {
    /// Correlation matrix \[R\] of training points
    pub(crate) r_mx: Array2<F>,
    /// Moore-Penrose pseudo-inverse of \[R\]
    pub(crate) r_pinv: Array2<F>,
    /// Numerical rank of \[R\]
    pub(crate) rank: usize,
    /// Generalized least-squares estimate of the constant trend
    pub(crate) beta: F,
    /// Kriging weights: R^+ . (y - beta)
    pub(crate) gamma: Array1<F>,
    /// 1^t . R^+ . 1
    pub(crate) ones_ri_ones: F,
    /// Process variance estimate
    pub(crate) sigma2: F,
    /// Best observed output value
    pub(crate) y_max: F,
}

/// Ordinary Kriging model with an anisotropic exponential correlation
/// whose trend is estimated by generalized least squares.
///
/// The interpolated output is modeled as stochastic process
///
/// `Y(x) = b + Z(x)`
///
/// where `b` is the constant trend and `Z(x)` a gaussian process of
/// variance `sigma^2` with correlation `corr(x, x') = exp(-d(x, x'))`,
/// `d` being the Mahalanobis distance with diagonal inverse metric `sig_inv`.
///
/// The correlation matrix is inverted with a SVD based pseudo-inverse so that
/// fitting copes with ill-conditioned or singular matrices (duplicated points).
///
/// The model keeps its training data and can be refitted in place which is
/// what the replay objective (see [`Kriging::replay_path`]) relies on.
///
/// # Example
///
/// ```no_run
/// use egobox_replay::Kriging;
/// use ndarray::array;
///
/// let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
/// let yt = array![1., 0.5, 0.2, 2.];
///
/// let mut kriging = Kriging::new(array![1., 1.]).expect("valid anisotropy");
/// kriging.fit(&xt, &yt).expect("Kriging fitted");
///
/// let y = kriging.predict_point(&array![0.5, 0.5]).expect("prediction");
/// let s = kriging.predict_std_point(&array![0.5, 0.5]).expect("std error");
/// let ei = kriging.expected_improvement_point(&array![0.5, 0.5]).expect("EI");
///
/// // How well anisotropy [0.1, 0.1] explains the sequence of points (xt, yt)
/// let score = kriging.score(&array![0.1, 0.1]).expect("replay");
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct Kriging<F: Float> {
    /// Parameters used to fit this model
    pub(crate) params: KrigingValidParams<F>,
    /// Training inputs (n, nx)
    pub(crate) xt: Array2<F>,
    /// Training outputs (n,)
    pub(crate) yt: Array1<F>,
    /// Fitted internal params, none until first fit
    pub(crate) inner_params: Option<KrigingInnerParams<F>>,
    /// Last replay path computed
    pub(crate) recent_path: Array1<F>,
}

impl<F: Float> From<KrigingValidParams<F>> for Kriging<F> {
    fn from(params: KrigingValidParams<F>) -> Self {
        let nx = params.corr.dim();
        Kriging {
            params,
            xt: Array2::zeros((0, nx)),
            yt: Array1::zeros(0),
            inner_params: None,
            recent_path: Array1::zeros(0),
        }
    }
}

impl<F: Float> fmt::Display for Kriging<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.inner_params {
            Some(inner) => write!(
                f,
                "Kriging(corr={}, nt={}, trend={}, variance={}, rank={})",
                self.params.corr,
                self.yt.len(),
                inner.beta,
                inner.sigma2,
                inner.rank
            ),
            None => write!(f, "Kriging(corr={}, unfitted)", self.params.corr),
        }
    }
}

impl<F: Float> Kriging<F> {
    /// Kriging parameters constructor
    pub fn params(anisotropy: Array1<F>) -> KrigingParams<F> {
        KrigingParams::new(anisotropy)
    }

    /// Unfitted Kriging model with default parameters and given anisotropy weights
    pub fn new(anisotropy: Array1<F>) -> Result<Self> {
        Ok(Self::from(Self::params(anisotropy).check()?))
    }

    /// Fit the model on `x` training inputs (n, nx) and `y` training outputs (n,).
    ///
    /// Previous training data and fitted state are replaced.
    pub fn fit(
        &mut self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<()> {
        let (n, nx) = x.dim();
        if n != y.len() {
            return Err(KrigingError::InvalidInputError(format!(
                "training inputs and outputs should have the same number of rows, got {} and {}",
                n,
                y.len()
            )));
        }
        if n < 2 {
            return Err(KrigingError::InvalidInputError(format!(
                "at least 2 observations are required to fit, got {n}"
            )));
        }
        if nx != self.params.corr.dim() {
            return Err(KrigingError::InvalidInputError(format!(
                "training inputs have {} components, anisotropy expects {}",
                nx,
                self.params.corr.dim()
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(KrigingError::InvalidInputError(
                "training inputs should be finite".to_string(),
            ));
        }
        let y_max = *y.max().map_err(|e| {
            KrigingError::InvalidInputError(format!("training outputs are not comparable: {e}"))
        })?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(KrigingError::InvalidInputError(
                "training outputs should be finite".to_string(),
            ));
        }

        let r_mx = self.params.corr.correlation_matrix(x);
        let pinv = pseudo_inverse(&r_mx, self.params.pinv_rcond)?;
        let r_pinv = pinv.pinv;

        // b = (1^t.R^+.y) / (1^t.R^+.1)
        let ones_ri_ones = r_pinv.sum();
        let beta = r_pinv.dot(y).sum() / ones_ri_ones;
        let resid = y.mapv(|v| v - beta);
        let gamma = r_pinv.dot(&resid);
        let sigma2 = resid.dot(&gamma) / F::cast(n);

        if pinv.rank < n {
            debug!("Correlation matrix is rank deficient: rank {} < {}", pinv.rank, n);
        }
        debug!(
            "Kriging fitted on {} points: trend={}, variance={}",
            n, beta, sigma2
        );

        self.xt = x.to_owned();
        self.yt = y.to_owned();
        self.inner_params = Some(KrigingInnerParams {
            r_mx,
            r_pinv,
            rank: pinv.rank,
            beta,
            gamma,
            ones_ri_ones,
            sigma2,
            y_max,
        });
        Ok(())
    }

    pub(crate) fn inner(&self) -> Result<&KrigingInnerParams<F>> {
        self.inner_params.as_ref().ok_or(KrigingError::NotFittedError)
    }

    fn check_query_dim(&self, nx: usize) -> Result<()> {
        if nx != self.xt.ncols() {
            return Err(KrigingError::InvalidInputError(format!(
                "query point has {} components, model expects {}",
                nx,
                self.xt.ncols()
            )));
        }
        Ok(())
    }

    /// Kriging mean given r(x) correlations with training points
    fn mean_from_corr(&self, inner: &KrigingInnerParams<F>, r: &Array1<F>) -> F {
        inner.beta + r.dot(&inner.gamma)
    }

    /// Kriging standard error sqrt(mse(x)).sigma given r(x) correlations with training points
    fn std_from_corr(&self, inner: &KrigingInnerParams<F>, r: &Array1<F>) -> F {
        if inner.rank < inner.r_mx.ncols() {
            // no usable uncertainty from a singular correlation matrix
            return F::zero();
        }
        let ri_r = inner.r_pinv.dot(r);
        let u = F::one() - ri_r.sum();
        let mse = F::one() - r.dot(&ri_r) + safe_div(u * u, inner.ones_ri_ones);
        // Mean Squared Error might be slightly negative depending on
        // machine precision: set to zero in that case
        let mse = mse.max(F::zero());
        mse.sqrt() * inner.sigma2.max(F::zero()).sqrt()
    }

    /// Predict output value at a single point `x` of nx components
    pub fn predict_point(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        let inner = self.inner()?;
        self.check_query_dim(x.len())?;
        let r = self.params.corr.point_correlation(&self.xt, x);
        Ok(self.mean_from_corr(inner, &r))
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let inner = self.inner()?;
        self.check_query_dim(x.ncols())?;
        let r = self.params.corr.cross_correlation(&self.xt, x);
        Ok(r.t().dot(&inner.gamma).mapv(|v| v + inner.beta))
    }

    /// Predict standard error of the prediction, that is the square root of
    /// the kriging mean squared error scaled by the process standard deviation,
    /// at a single point `x`.
    ///
    /// Returns zero when the correlation matrix is rank deficient.
    pub fn predict_std_point(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        let inner = self.inner()?;
        self.check_query_dim(x.len())?;
        let r = self.params.corr.point_correlation(&self.xt, x);
        Ok(self.std_from_corr(inner, &r))
    }

    /// Predict standard errors at n given `x` points specified as a (n, nx) matrix.
    /// Returns n values as a vector (n,), see [`Kriging::predict_std_point`].
    pub fn predict_std(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let inner = self.inner()?;
        self.check_query_dim(x.ncols())?;
        let r = self.params.corr.cross_correlation(&self.xt, x);
        let mut std = Array1::zeros(x.nrows());
        Zip::from(&mut std)
            .and(r.columns())
            .for_each(|s, rj| *s = self.std_from_corr(inner, &rj.to_owned()));
        Ok(std)
    }

    /// Expected improvement over the best observed value at a single point `x`.
    ///
    /// Zero when the predicted standard error is zero or when the value is not finite.
    pub fn expected_improvement_point(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<F> {
        let inner = self.inner()?;
        self.check_query_dim(x.len())?;
        let r = self.params.corr.point_correlation(&self.xt, x);
        let pred = self.mean_from_corr(inner, &r);
        let sigma = self.std_from_corr(inner, &r);
        Ok(EI.value(pred, inner.y_max, sigma))
    }

    /// Expected improvement at n given `x` points specified as a (n, nx) matrix.
    pub fn expected_improvement(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        let inner = self.inner()?;
        self.check_query_dim(x.ncols())?;
        let r = self.params.corr.cross_correlation(&self.xt, x);
        let mut ei = Array1::zeros(x.nrows());
        Zip::from(&mut ei).and(r.columns()).for_each(|e, rj| {
            let rj = rj.to_owned();
            let pred = self.mean_from_corr(inner, &rj);
            let sigma = self.std_from_corr(inner, &rj);
            *e = EI.value(pred, inner.y_max, sigma);
        });
        Ok(ei)
    }

    /// Whether the model has been fitted
    pub fn is_fitted(&self) -> bool {
        self.inner_params.is_some()
    }

    /// Parameters of the model
    pub fn params_ref(&self) -> &KrigingValidParams<F> {
        &self.params
    }

    /// Current correlation model
    pub fn corr(&self) -> &AnisotropicExponentialCorr<F> {
        &self.params.corr
    }

    /// Current anisotropy weights
    pub fn anisotropy(&self) -> &Array1<F> {
        self.params.corr.sig_inv()
    }

    /// Number of input components
    pub fn dim(&self) -> usize {
        self.params.corr.dim()
    }

    /// Training dataset (inputs, outputs)
    pub fn training_data(&self) -> (&Array2<F>, &Array1<F>) {
        (&self.xt, &self.yt)
    }

    /// Correlation matrix of the training points
    pub fn correlation_matrix(&self) -> Result<&Array2<F>> {
        Ok(&self.inner()?.r_mx)
    }

    /// Pseudo-inverse of the correlation matrix
    pub fn pseudo_inverse(&self) -> Result<&Array2<F>> {
        Ok(&self.inner()?.r_pinv)
    }

    /// Estimated constant trend
    pub fn trend(&self) -> Result<F> {
        Ok(self.inner()?.beta)
    }

    /// Estimated process variance
    pub fn process_variance(&self) -> Result<F> {
        Ok(self.inner()?.sigma2)
    }

    /// Numerical rank of the correlation matrix
    pub fn rank(&self) -> Result<usize> {
        Ok(self.inner()?.rank)
    }

    /// Whether the correlation matrix is singular, in which case
    /// standard errors and expected improvements are zero
    pub fn is_rank_deficient(&self) -> Result<bool> {
        let inner = self.inner()?;
        Ok(inner.rank < inner.r_mx.ncols())
    }

    /// Best observed output value
    pub fn y_max(&self) -> Result<F> {
        Ok(self.inner()?.y_max)
    }

    /// Most recent replay path, empty if no replay was done
    pub fn recent_path(&self) -> &Array1<F> {
        &self.recent_path
    }

    /// Adaptor to use the standard error prediction through linfa `Predict` trait
    pub fn std_predictor(&self) -> KrigingStdPredictor<'_, F> {
        KrigingStdPredictor(self)
    }
}

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for Kriging<F>
where
    F: Float,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.predict(x).expect("Kriging prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

/// Kriging adaptator to implement `linfa::Predict` trait for standard error prediction.
pub struct KrigingStdPredictor<'a, F: Float>(&'a Kriging<F>);

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for KrigingStdPredictor<'_, F>
where
    F: Float,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.0.predict_std(x).expect("Kriging prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros(x.nrows())
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, KrigingError>
    for KrigingValidParams<F>
{
    type Object = Kriging<F>;

    /// Fit Kriging model with fixed anisotropy
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let mut kriging = Kriging::from(self.clone());
        kriging.fit(dataset.records(), dataset.targets())?;
        Ok(kriging)
    }
}
