//! This library implements an ordinary [Kriging](https://en.wikipedia.org/wiki/Kriging) model
//! with an anisotropic exponential correlation together with the
//! [Expected Improvement](https://en.wikipedia.org/wiki/Bayesian_optimization) infill criterion
//! used by the Efficient Global Optimization (EGO) algorithm.
//!
//! On top of it, a *replay objective* is provided to calibrate the anisotropy of the
//! correlation from the history of a past optimization run: the history is replayed
//! with a candidate anisotropy, refitting the model on the observations acquired so far
//! and summing the expected improvements of the next acquired points.
//! The greater the sum, the better the candidate anisotropy explains the
//! acquisition sequence. An outer search (grid scan, optimizer) maximizes this objective.
//!
//! The Kriging model is implemented by [Kriging] parameterized by [KrigingParams],
//! the replay objective by [Kriging::replay_path], [Kriging::replay_last] and [Kriging::score].
//!
//! ```no_run
//! use egobox_replay::Kriging;
//! use ndarray::{array, Array1};
//!
//! // points acquired by a past optimization run, in acquisition order
//! let xt = array![[0.1, 0.2], [0.9, 0.4], [0.5, 0.5], [0.6, 0.55], [0.62, 0.6]];
//! let yt = array![0.3, 0.1, 0.8, 0.9, 1.1];
//!
//! let mut kriging = Kriging::new(array![1., 1.]).expect("valid anisotropy");
//! kriging.fit(&xt, &yt).expect("Kriging fitted");
//!
//! let scores = [0.01, 0.1, 1., 10.]
//!     .map(|s| kriging.score(&Array1::from_elem(2, s)).expect("replay"));
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod correlation_models;
pub mod criteria;
mod errors;
mod linalg;
mod parameters;
mod replay;
mod utils;

pub use algorithm::*;
pub use errors::*;
pub use linalg::PINV_RCOND_FACTOR;
pub use parameters::*;
pub use utils::{finite_or_zero, norm_cdf, norm_pdf, safe_div};

/// Environment variable name used to set the log level of binaries and benches
/// built on top of this crate through `env_logger`
pub const EGOBOX_LOG: &str = "EGOBOX_LOG";
