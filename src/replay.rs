//! Replay objective used to calibrate the anisotropy of the Kriging correlation
//! from the history of a past optimization run.
//!
//! Given the observations `(X, y)` of a run, in the order they were acquired,
//! and a candidate anisotropy vector, the history is replayed: at each step the
//! model is fitted on the observations acquired so far and the expected
//! improvement of the next acquired point is recorded. The sum of those
//! expected improvements scores how well the candidate anisotropy explains the
//! acquisition sequence as an expected improvement seeking behaviour.
//!
//! The replay works on the model training data in place: model state is saved
//! before and restored after the replay whatever the outcome (success, error or
//! panic).

use crate::algorithm::{Kriging, KrigingInnerParams};
use crate::correlation_models::AnisotropicExponentialCorr;
use crate::errors::{KrigingError, Result};
use crate::utils::finite_or_zero;

use linfa::Float;
use log::{debug, trace};
use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix1};
use std::time::Instant;

/// Saved state of a Kriging model
#[derive(Debug, Default)]
struct KrigingSnapshot<F: Float> {
    corr: AnisotropicExponentialCorr<F>,
    xt: Array2<F>,
    yt: Array1<F>,
    inner_params: Option<KrigingInnerParams<F>>,
}

/// Scope of a replay: the model runs with the candidate correlation and
/// gets its saved state back when the scope is dropped.
struct ReplayScope<'a, F: Float> {
    model: &'a mut Kriging<F>,
    saved: KrigingSnapshot<F>,
}

impl<'a, F: Float> ReplayScope<'a, F> {
    fn enter(model: &'a mut Kriging<F>, corr: AnisotropicExponentialCorr<F>) -> Self {
        let saved = KrigingSnapshot {
            corr: std::mem::replace(&mut model.params.corr, corr),
            xt: std::mem::take(&mut model.xt),
            yt: std::mem::take(&mut model.yt),
            inner_params: model.inner_params.take(),
        };
        ReplayScope { model, saved }
    }

    /// Expected improvements of history points: the ith one is computed
    /// with the model fitted on the first i points, first two points only seed
    /// the model. Returns (n-1,) values, the first one being zero.
    fn path(&mut self) -> Result<Array1<F>> {
        let xt = &self.saved.xt;
        let yt = &self.saved.yt;
        let n = yt.len();

        let mut path = Array1::zeros(n - 1);
        self.model.fit(&xt.slice(s![..2, ..]), &yt.slice(s![..2]))?;
        for i in 2..n {
            path[i - 1] = self.model.expected_improvement_point(&xt.row(i))?;
            trace!("Replay step {}: EI = {}", i, path[i - 1]);
            if i + 1 < n {
                self.model
                    .fit(&xt.slice(s![..=i, ..]), &yt.slice(s![..=i]))?;
            }
        }
        Ok(path.mapv(finite_or_zero))
    }

    /// Expected improvement of the last history point given all previous ones
    fn last(&mut self) -> Result<F> {
        let xt = &self.saved.xt;
        let yt = &self.saved.yt;
        let n = yt.len();

        self.model
            .fit(&xt.slice(s![..n - 1, ..]), &yt.slice(s![..n - 1]))?;
        let ei = self.model.expected_improvement_point(&xt.row(n - 1))?;
        Ok(finite_or_zero(ei))
    }
}

impl<F: Float> Drop for ReplayScope<'_, F> {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        self.model.params.corr = saved.corr;
        self.model.xt = saved.xt;
        self.model.yt = saved.yt;
        self.model.inner_params = saved.inner_params;
    }
}

impl<F: Float> Kriging<F> {
    /// Validate candidate anisotropy against the fitted model
    fn candidate_corr(
        &self,
        sig_inv: &ArrayBase<impl Data<Elem = F>, Ix1>,
        min_obs: usize,
    ) -> Result<AnisotropicExponentialCorr<F>> {
        self.inner()?;
        if sig_inv.len() != self.dim() {
            return Err(KrigingError::InvalidInputError(format!(
                "candidate anisotropy has {} components, model expects {}",
                sig_inv.len(),
                self.dim()
            )));
        }
        if self.yt.len() < min_obs {
            return Err(KrigingError::InvalidInputError(format!(
                "replay requires at least {} observations, got {}",
                min_obs,
                self.yt.len()
            )));
        }
        AnisotropicExponentialCorr::new(sig_inv.to_owned())
    }

    /// Replay the training history with the candidate anisotropy `sig_inv`.
    ///
    /// Returns the (n-1,) path of expected improvements where the value at
    /// index `i-1` is the expected improvement of the ith observation
    /// (for i >= 2) computed by the model fitted on observations `0..i`.
    /// The value at index 0 is zero as the first two observations seed the model.
    /// Non finite values are set to zero.
    ///
    /// Model state (training data, anisotropy, fitted parameters) is left unchanged,
    /// the path is kept available with [`Kriging::recent_path`].
    pub fn replay_path(
        &mut self,
        sig_inv: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        let corr = self.candidate_corr(sig_inv, 2)?;
        let now = Instant::now();
        let path = ReplayScope::enter(self, corr).path()?;
        debug!(
            "Replay path with sig_inv={} over {} points: sum EI = {} (elapsed {:?})",
            sig_inv,
            self.yt.len(),
            path.sum(),
            now.elapsed()
        );
        self.recent_path = path.clone();
        Ok(path)
    }

    /// Expected improvement of the last observation computed by the model
    /// fitted on all previous observations with the candidate anisotropy `sig_inv`.
    /// Requires at least 3 observations. Non finite value is set to zero.
    ///
    /// Model state is left unchanged.
    pub fn replay_last(&mut self, sig_inv: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        let corr = self.candidate_corr(sig_inv, 3)?;
        let ei = ReplayScope::enter(self, corr).last()?;
        debug!("Replay last with sig_inv={}: EI = {}", sig_inv, ei);
        Ok(ei)
    }

    /// Replay objective: the sum of the expected improvements path given by
    /// [`Kriging::replay_path`]. The greater the better the candidate anisotropy
    /// `sig_inv` explains the history.
    pub fn score(&mut self, sig_inv: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        Ok(self.replay_path(sig_inv)?.sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use egobox_doe::{Lhs, SamplingMethod};
    use ndarray::{array, concatenate, Axis};
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn square_history() -> Kriging<f64> {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let yt = array![1., 0.5, 0.2, 2.];
        let mut kriging = Kriging::<f64>::new(array![1., 1.]).unwrap();
        kriging.fit(&xt, &yt).unwrap();
        kriging
    }

    fn neg_rosenbrock(x: &Array2<f64>) -> Array1<f64> {
        x.map_axis(Axis(1), |xi| {
            -(0..xi.len() - 1)
                .map(|j| 100. * (xi[j + 1] - xi[j] * xi[j]).powi(2) + (1. - xi[j]).powi(2))
                .sum::<f64>()
        })
    }

    /// A few LHS points then points moving towards the optimum (1, 1, 1)
    fn rosenbrock_history() -> Kriging<f64> {
        let xlimits = array![[-2., 2.], [-2., 2.], [-2., 2.]];
        let rng = Xoshiro256Plus::seed_from_u64(42);
        let doe = Lhs::new(&xlimits).with_rng(rng).sample(5);
        let moves = array![
            [0.5, 0.5, 0.5],
            [0.8, 0.6, 0.4],
            [0.9, 0.8, 0.7],
            [1.1, 1.2, 1.3],
            [1., 1., 1.]
        ];
        let xt = concatenate![Axis(0), doe, moves];
        let yt = neg_rosenbrock(&xt);
        let mut kriging = Kriging::new(array![1., 1., 1.]).unwrap();
        kriging.fit(&xt, &yt).unwrap();
        kriging
    }

    fn assert_same_state(expected: &Kriging<f64>, actual: &Kriging<f64>) {
        assert_eq!(expected.training_data(), actual.training_data());
        assert_eq!(expected.anisotropy(), actual.anisotropy());
        assert_eq!(expected.inner_params, actual.inner_params);
    }

    #[test]
    fn test_replay_path_length_and_score() {
        let mut kriging = square_history();
        let path = kriging.replay_path(&array![1., 1.]).unwrap();
        assert_eq!(3, path.len());
        assert_eq!(0., path[0]);
        assert!(path.iter().all(|v| v.is_finite() && *v > -1e-12));
        assert_eq!(&path, kriging.recent_path());

        let score = kriging.score(&array![1., 1.]).unwrap();
        assert_abs_diff_eq!(path.sum(), score, epsilon = 1e-12);
        // same model, same candidate: same objective value
        let again = kriging.score(&array![1., 1.]).unwrap();
        assert_eq!(score.to_bits(), again.to_bits());
        assert!(score.is_finite());
    }

    #[test]
    fn test_replay_path_steps() {
        let mut kriging = square_history();
        let (xt, yt) = (kriging.xt.to_owned(), kriging.yt.to_owned());
        let path = kriging.replay_path(&array![0.5, 2.]).unwrap();

        let mut step = Kriging::new(array![0.5, 2.]).unwrap();
        for i in 2..4 {
            step.fit(&xt.slice(s![..i, ..]), &yt.slice(s![..i])).unwrap();
            let ei = step.expected_improvement_point(&xt.row(i)).unwrap();
            assert_eq!(ei, path[i - 1]);
        }
    }

    #[test]
    fn test_replay_restores_state() {
        let mut kriging = rosenbrock_history();
        let before = kriging.clone();

        let path = kriging.replay_path(&array![0.1, 10., 0.]).unwrap();
        assert_eq!(9, path.len());
        assert_same_state(&before, &kriging);

        kriging.replay_last(&array![0.1, 10., 0.]).unwrap();
        assert_same_state(&before, &kriging);

        kriging.score(&array![2., 2., 2.]).unwrap();
        assert_same_state(&before, &kriging);
        assert_eq!(
            before.predict_point(&array![0.2, 0.3, 0.1]).unwrap(),
            kriging.predict_point(&array![0.2, 0.3, 0.1]).unwrap()
        );
    }

    #[test]
    fn test_replay_last_is_last_step_of_path() {
        let mut kriging = rosenbrock_history();
        for sig_inv in [array![0.01, 0.01, 0.01], array![1., 1., 1.], array![10., 0.1, 1.]] {
            let path = kriging.replay_path(&sig_inv).unwrap();
            let last = kriging.replay_last(&sig_inv).unwrap();
            assert_eq!(path[path.len() - 1], last);
        }
    }

    #[test]
    fn test_score_depends_on_anisotropy() {
        let mut kriging = rosenbrock_history();
        let scores = [0.01, 0.1, 1., 10.]
            .iter()
            .map(|s| kriging.score(&Array1::from_elem(3, *s)).unwrap())
            .collect::<Vec<_>>();
        assert!(scores.iter().all(|v| v.is_finite() && *v > -1e-12));
        assert!(scores.windows(2).any(|w| w[0] != w[1]));
        // last replay is cached
        assert_abs_diff_eq!(scores[3], kriging.recent_path().sum(), epsilon = 1e-12);
    }

    #[test]
    fn test_replay_with_duplicates_is_sanitized() {
        let xt = array![[0., 0.], [0., 0.], [1., 1.], [1., 1.], [0.5, 0.2]];
        let yt = array![1., 1., 2., 2., 0.];
        let mut kriging = Kriging::<f64>::new(array![1., 1.]).unwrap();
        kriging.fit(&xt, &yt).unwrap();
        let path = kriging.replay_path(&array![1., 1.]).unwrap();
        assert_eq!(4, path.len());
        assert!(path.iter().all(|v| v.is_finite()));
        // prior model fitted on duplicates: no uncertainty, no improvement
        assert_eq!(0., path[1]);
        let score = kriging.score(&array![1., 0.]).unwrap();
        assert!(score.is_finite());
    }

    #[test]
    fn test_two_points_history() {
        let mut kriging = Kriging::new(array![1.]).unwrap();
        kriging.fit(&array![[0.], [1.]], &array![0., 1.]).unwrap();
        assert_eq!(array![0.], kriging.replay_path(&array![1.]).unwrap());
        assert_eq!(0., kriging.score(&array![3.]).unwrap());
        assert!(matches!(
            kriging.replay_last(&array![1.]),
            Err(KrigingError::InvalidInputError(_))
        ));
    }

    #[test]
    fn test_invalid_replay() {
        let mut unfitted = Kriging::<f64>::new(array![1., 1.]).unwrap();
        assert!(matches!(
            unfitted.replay_path(&array![1., 1.]),
            Err(KrigingError::NotFittedError)
        ));

        let mut kriging = square_history();
        let before = kriging.clone();
        assert!(kriging.replay_path(&array![1.]).is_err());
        assert!(matches!(
            kriging.score(&array![1., -1.]),
            Err(KrigingError::InvalidInputError(_))
        ));
        assert!(kriging.replay_last(&array![f64::NAN, 1.]).is_err());
        assert_same_state(&before, &kriging);
        assert!(kriging.recent_path().is_empty());
    }

    #[test]
    fn test_scope_restores_on_error() {
        let mut kriging = square_history();
        let before = kriging.clone();
        let corr = AnisotropicExponentialCorr::new(array![3., 3.]).unwrap();
        let res = (|| -> Result<()> {
            let scope = ReplayScope::enter(&mut kriging, corr);
            scope
                .model
                .fit(&array![[5., 5.], [6., 6.]], &array![9., 8.])?;
            scope.model.fit(&array![[5., 5.]], &array![9.])?;
            Ok(())
        })();
        assert!(res.is_err());
        assert_same_state(&before, &kriging);
    }

    #[test]
    fn test_scope_restores_on_panic() {
        let mut kriging = square_history();
        let before = kriging.clone();
        let corr = AnisotropicExponentialCorr::new(array![3., 3.]).unwrap();
        let res = catch_unwind(AssertUnwindSafe(|| {
            let scope = ReplayScope::enter(&mut kriging, corr);
            assert!(!scope.model.is_fitted());
            panic!("interrupted replay");
        }));
        assert!(res.is_err());
        assert_same_state(&before, &kriging);
    }
}
