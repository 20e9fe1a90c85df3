//! Errors reported by external messaging clients

use std::fmt;

/// Error type for calls into an external messaging client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    /// Endpoint could not be reached or the handshake failed
    Unreachable(String),
    /// The external system refused the request (unknown queue, bad property, ...)
    Rejected(String),
    /// Transport failed mid-operation
    Transport(String),
    /// Operation timed out
    Timeout,
    /// The client or handle was already closed
    Closed,
    /// Other error
    Other(String),
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalError::Unreachable(msg) => write!(f, "Unreachable: {}", msg),
            ExternalError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            ExternalError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ExternalError::Timeout => write!(f, "Operation timed out"),
            ExternalError::Closed => write!(f, "Handle closed"),
            ExternalError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ExternalError {}

/// Result type for external client calls
pub type ExternalResult<T> = Result<T, ExternalError>;
