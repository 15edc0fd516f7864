//! A module for the anisotropic exponential correlation model used to model
//! the error term of the Kriging model.
//!
//! The correlation between two points `x` and `x'` is given by
//!
//! `corr(x, x') = exp(-d(x, x'))`
//!
//! where `d` is the Mahalanobis distance with a diagonal inverse metric whose
//! diagonal is given by the anisotropy vector `sig_inv`:
//!
//! `d(x, x') = sqrt( sum_j sig_inv_j * (x_j - x'_j)^2 )`

use crate::errors::{KrigingError, Result};
use crate::utils::{differences, DiffMatrix};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anisotropic exponential correlation model
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct AnisotropicExponentialCorr<F: Float> {
    /// Inverse scale weights, the diagonal of the inverse metric (nx,)
    pub(crate) sig_inv: Array1<F>,
}

impl<F: Float> AnisotropicExponentialCorr<F> {
    /// Constructor given the anisotropy vector.
    ///
    /// Weights have to be finite and non-negative. A zero weight is legal and
    /// makes the correlation insensitive to the corresponding component.
    pub fn new(sig_inv: Array1<F>) -> Result<Self> {
        let corr = Self { sig_inv };
        corr.check()?;
        Ok(corr)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.sig_inv.is_empty() {
            return Err(KrigingError::InvalidInputError(
                "anisotropy vector should not be empty".to_string(),
            ));
        }
        if let Some((i, v)) = self
            .sig_inv
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < F::zero())
        {
            return Err(KrigingError::InvalidInputError(format!(
                "anisotropy weights should be finite and non-negative, got {v} at index {i}"
            )));
        }
        Ok(())
    }

    /// Anisotropy weights
    pub fn sig_inv(&self) -> &Array1<F> {
        &self.sig_inv
    }

    /// Number of input components
    pub fn dim(&self) -> usize {
        self.sig_inv.len()
    }

    /// Mahalanobis distances given componentwise differences `d` (n, nx).
    /// Returns (n,) distances.
    pub fn distances(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        d.mapv(|v| v * v).dot(&self.sig_inv).mapv(F::sqrt)
    }

    /// Correlation values given componentwise differences `d` (n, nx).
    /// Returns (n,) correlations in (0, 1].
    pub fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        self.distances(d).mapv(|v| F::exp(-v))
    }

    /// Correlation matrix R (n, n) of the `x` points given as a (n, nx) matrix.
    /// R is symmetric with a unit diagonal.
    pub fn correlation_matrix(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let x_diffs = DiffMatrix::new(x);
        let mut r_mx = Array2::eye(x_diffs.n_obs);
        let rxx = self.value(&x_diffs.d);
        Zip::from(x_diffs.d_indices.rows())
            .and(&rxx)
            .for_each(|ij, &v| {
                r_mx[[ij[0], ij[1]]] = v;
                r_mx[[ij[1], ij[0]]] = v;
            });
        r_mx
    }

    /// Correlation vector r(x) (n,) between the `xt` training points (n, nx)
    /// and the single point `x` (nx,)
    pub fn point_correlation(
        &self,
        xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        self.value(&differences(x, xt))
    }

    /// Correlation matrix (n, k) between the `xt` training points (n, nx)
    /// and k query points `x` given as a (k, nx) matrix
    pub fn cross_correlation(
        &self,
        xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let mut r = Array2::zeros((xt.nrows(), x.nrows()));
        Zip::from(r.columns_mut())
            .and(x.rows())
            .for_each(|mut rj, xj| rj.assign(&self.point_correlation(xt, &xj)));
        r
    }
}

impl<F: Float> fmt::Display for AnisotropicExponentialCorr<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AnisotropicExponential(sig_inv={})", self.sig_inv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_invalid_anisotropy() {
        assert!(matches!(
            AnisotropicExponentialCorr::new(array![1., -0.5]),
            Err(KrigingError::InvalidInputError(_))
        ));
        assert!(AnisotropicExponentialCorr::new(array![f64::NAN]).is_err());
        assert!(AnisotropicExponentialCorr::<f64>::new(array![]).is_err());
        assert!(AnisotropicExponentialCorr::new(array![0., 2.]).is_ok());
    }

    #[test]
    fn test_mahalanobis_distances() {
        let corr = AnisotropicExponentialCorr::new(array![4., 1.]).unwrap();
        let d = array![[1., 0.], [0., 3.], [1., 2.], [0., 0.]];
        assert_abs_diff_eq!(
            array![2., 3., f64::sqrt(8.), 0.],
            corr.distances(&d),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            array![
                f64::exp(-2.),
                f64::exp(-3.),
                f64::exp(-f64::sqrt(8.)),
                1.
            ],
            corr.value(&d),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_correlation_matrix() {
        let corr = AnisotropicExponentialCorr::new(array![1., 1.]).unwrap();
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let r_mx = corr.correlation_matrix(&xt);
        assert_eq!((4, 4), r_mx.dim());
        for i in 0..4 {
            assert_eq!(1., r_mx[[i, i]]);
            for j in 0..4 {
                assert_eq!(r_mx[[i, j]], r_mx[[j, i]]);
                assert!(r_mx[[i, j]] > 0. && r_mx[[i, j]] <= 1.);
            }
        }
        assert_abs_diff_eq!(f64::exp(-1.), r_mx[[0, 1]], epsilon = 1e-12);
        assert_abs_diff_eq!(f64::exp(-f64::sqrt(2.)), r_mx[[0, 3]], epsilon = 1e-12);
        assert_abs_diff_eq!(f64::exp(-f64::sqrt(2.)), r_mx[[1, 2]], epsilon = 1e-12);
    }

    #[test]
    fn test_zero_weight_collapses_component() {
        let corr = AnisotropicExponentialCorr::new(array![1., 0.]).unwrap();
        let xt = array![[0., 0.], [0., 5.], [1., 0.]];
        let r_mx = corr.correlation_matrix(&xt);
        assert_eq!(1., r_mx[[0, 1]]);
        assert_abs_diff_eq!(f64::exp(-1.), r_mx[[0, 2]], epsilon = 1e-12);
        assert_abs_diff_eq!(f64::exp(-1.), r_mx[[1, 2]], epsilon = 1e-12);
        assert!(r_mx.iter().all(|v| *v > 0. && *v <= 1.));
    }

    #[test]
    fn test_point_and_cross_correlation() {
        let corr = AnisotropicExponentialCorr::new(array![1., 1.]).unwrap();
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let r_mx = corr.correlation_matrix(&xt);

        // a training point gives the corresponding column of R
        let r2 = corr.point_correlation(&xt, &xt.row(2));
        assert_abs_diff_eq!(r_mx.column(2).to_owned(), r2, epsilon = 1e-12);

        let x = array![[0., 1.], [0.5, 0.5]];
        let r = corr.cross_correlation(&xt, &x);
        assert_eq!((4, 2), r.dim());
        assert_abs_diff_eq!(r_mx.column(2), r.column(0), epsilon = 1e-12);
        let expected = corr.point_correlation(&xt, &array![0.5, 0.5]);
        assert_abs_diff_eq!(expected, r.column(1).to_owned(), epsilon = 1e-12);
        assert_abs_diff_eq!(
            Array1::from_elem(4, f64::exp(-f64::sqrt(0.5))),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_one_dimensional_point_is_one_point() {
        // a (1,) query against 1d training data is a single point
        let corr = AnisotropicExponentialCorr::new(array![2.]).unwrap();
        let xt = array![[0.], [1.], [3.]];
        let r = corr.point_correlation(&xt, &array![1.]);
        assert_eq!(3, r.len());
        assert_abs_diff_eq!(
            array![f64::exp(-f64::sqrt(2.)), 1., f64::exp(-f64::sqrt(8.))],
            r,
            epsilon = 1e-12
        );
    }
}
