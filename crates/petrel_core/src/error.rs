//! Error taxonomy shared by every component of the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid sizes or solver options, detected at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Assembly-state violation, out-of-range index, or view misuse.
    #[error("usage error: {0}")]
    Usage(String),

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("matrix is singular")]
    SingularMatrix,

    /// NaN or Inf produced by a user callback.
    #[error("numerical failure at t = {t}: {message}")]
    NumericalFailure { t: f64, message: String },

    #[error("Newton solver diverged after {iterations} iterations: {reason}")]
    Diverged { iterations: usize, reason: String },

    #[error("Newton solver failed to converge in {iterations} iterations (‖F(x)‖ = {residual_norm})")]
    MaxIterationsExceeded {
        iterations: usize,
        residual_norm: f64,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(Self::DimensionMismatch {
                context,
                expected,
                actual,
            });
        }
        Ok(())
    }
}
