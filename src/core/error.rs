//! Error types for the butterfly-matrix library
//!
//! Provides typed error handling for matrix computation operations.

use std::fmt;

/// Main error type for butterfly-matrix operations
#[derive(Debug)]
pub enum Error {
    /// Invalid input or configuration (bad worker count, empty or oversized input)
    InvalidInput(String),

    /// A computation is already in progress on this calculator instance
    AlreadyRunning,

    /// The computation did not finish: the deadline was reached or the
    /// run was cancelled. Carries a short human-readable cause.
    ComputationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {msg}")
            }
            Error::AlreadyRunning => {
                write!(f, "A distance-matrix computation is already running")
            }
            Error::ComputationFailed(cause) => {
                write!(f, "Failed to calculate. Cause: {cause}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Convenience result type for butterfly-matrix operations
pub type Result<T> = std::result::Result<T, Error>;
