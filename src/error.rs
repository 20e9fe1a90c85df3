//! Bridge error types

use std::fmt;

use crate::external::ExternalError;

/// Errors surfaced by bridges.
///
/// Only `Connection`, `Link` and `Config` ever reach a caller; translation and
/// delivery failures are logged where they happen and the bridge keeps running.
#[derive(Debug)]
pub enum BridgeError {
    /// Cannot establish or keep the external connection
    Connection(String),
    /// A requested link could not be registered
    Link { destination: String, reason: String },
    /// A message could not be converted in either direction
    Translation(String),
    /// An external send/receive or local hand-off failed at runtime
    Delivery(String),
    /// Bridge configuration rejected
    Config(String),
}

impl BridgeError {
    pub fn link(destination: &str, reason: impl fmt::Display) -> Self {
        BridgeError::Link {
            destination: destination.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short kind label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Connection(_) => "connection",
            BridgeError::Link { .. } => "link",
            BridgeError::Translation(_) => "translation",
            BridgeError::Delivery(_) => "delivery",
            BridgeError::Config(_) => "config",
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Connection(msg) => write!(f, "Connection error: {}", msg),
            BridgeError::Link {
                destination,
                reason,
            } => write!(f, "Link error on '{}': {}", destination, reason),
            BridgeError::Translation(msg) => write!(f, "Translation error: {}", msg),
            BridgeError::Delivery(msg) => write!(f, "Delivery error: {}", msg),
            BridgeError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<ExternalError> for BridgeError {
    fn from(err: ExternalError) -> Self {
        BridgeError::Delivery(err.to_string())
    }
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
