//! Error types for the SEDUM engine.

use std::fmt;

/// Result type alias for SEDUM engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing or driving the engine.
///
/// Policy outcomes (admission denials, forwarding denials) are *not* errors;
/// they are returned as [`AdmitDecision`](crate::AdmitDecision) and
/// [`ForwardDecision`](crate::ForwardDecision) values. This enum covers the
/// cases where the caller violated the engine's contract.
#[derive(Debug)]
pub enum Error {
    /// Configuration error detected at construction time.
    Config(String),

    /// A message id was expected to be buffered but was not found.
    MessageNotBuffered(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => {
                write!(f, "configuration error: {}", msg)
            }
            Error::MessageNotBuffered(id) => {
                write!(f, "message not in buffer: {}", id)
            }
        }
    }
}

impl std::error::Error for Error {}
