//! Infill criterion used to score candidate points with a fitted Kriging model
mod ei;

pub use ei::{ExpectedImprovement, EI};
