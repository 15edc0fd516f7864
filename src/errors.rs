use thiserror::Error;

/// A result type for Kriging fitting, prediction and replay
pub type Result<T> = std::result::Result<T, KrigingError>;

/// An error when using [`Kriging`](crate::Kriging) model
#[derive(Error, Debug)]
pub enum KrigingError {
    /// When given data or hyperparameters are not consistent
    #[error("InvalidInput error: {0}")]
    InvalidInputError(String),
    /// When prediction or replay is requested before any fit
    #[error("Kriging model is not fitted")]
    NotFittedError,
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When pseudo-inverse of the correlation matrix cannot be built
    #[error("Pseudo-inverse computation error: {0}")]
    PinvComputationError(String),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
