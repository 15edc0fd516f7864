use libm::erfc;
use linfa::Float;
use ndarray::{s, Array2, ArrayBase, Data, Ix1, Ix2};

const SQRT_2PI: f64 = 2.5066282746310007;

/// A structure to retain pairwise differences used to compute the correlation matrix
#[derive(Debug)]
pub struct DiffMatrix<F: Float> {
    /// Differences as (n_obs * (n_obs-1))/2, nx) array
    pub d: Array2<F>,
    /// Indices of the differences in the original data array
    pub d_indices: Array2<usize>,
    /// Number of observations
    pub n_obs: usize,
}

impl<F: Float> DiffMatrix<F> {
    /// Compute differences given points given as an array (n_obs, nx)
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> DiffMatrix<F> {
        let n_obs = x.nrows();
        let n_pairs = n_obs * n_obs.saturating_sub(1) / 2;
        let mut d_indices = Array2::<usize>::zeros((n_pairs, 2));
        let mut d = Array2::zeros((n_pairs, x.ncols()));

        let mut start = 0;
        for k in 0..n_obs.saturating_sub(1) {
            let end = start + n_obs - k - 1;
            for (offset, i) in ((k + 1)..n_obs).enumerate() {
                d_indices[[start + offset, 0]] = k;
                d_indices[[start + offset, 1]] = i;
            }
            let diff = &x.slice(s![k, ..]) - &x.slice(s![k + 1..n_obs, ..]);
            d.slice_mut(s![start..end, ..]).assign(&diff);
            start = end;
        }

        DiffMatrix {
            d,
            d_indices,
            n_obs,
        }
    }
}

/// Computes differences between x and each element of y
/// resulting in a 2d array of shape (nrows(y), ncols(x));
/// *Panics* if x and y have not the same number of components
pub fn differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.len() == y.ncols());
    x.to_owned() - y
}

/// Replaces a non finite value (nan or +/-inf) by zero
pub fn finite_or_zero<F: Float>(v: F) -> F {
    if v.is_finite() {
        v
    } else {
        F::zero()
    }
}

/// Divides `num` by `den`, the quotient is zero when it is not finite
/// (zero denominator, nan or infinite operands).
pub fn safe_div<F: Float>(num: F, den: F) -> F {
    if den == F::zero() {
        F::zero()
    } else {
        finite_or_zero(num / den)
    }
}

/// Cumulative distribution function of Standard Normal at x
pub fn norm_cdf<F: Float>(x: F) -> F {
    let x = x.to_f64().unwrap_or(f64::NAN);
    F::cast(0.5 * erfc(-x / std::f64::consts::SQRT_2))
}

/// Probability density function of Standard Normal at x
pub fn norm_pdf<F: Float>(x: F) -> F {
    F::exp(F::cast(-0.5) * x * x) / F::cast(SQRT_2PI)
}
