//! External Messaging Clients
//!
//! Narrow client surfaces for the three external systems a bridge can talk
//! to. Each surface covers exactly what the bridges need: connect and
//! disconnect, open a producer or consumer equivalent, send one message,
//! receive one message (non-blocking or via a listener), acknowledge, and
//! typed property access on the native message.
//!
//! Production deployments plug vendor SDK wrappers in behind these traits.
//! [`memory`] provides in-process implementations used by the sandbox runner
//! and the test suite.

mod error;
pub mod memory;
pub mod notification;
pub mod pubsub;
pub mod queue_manager;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use error::{ExternalError, ExternalResult};

/// A handle on the external system that must be released exactly once
#[async_trait]
pub trait ExternalHandle: Send + Sync {
    /// Release the handle. A second call returns `ExternalError::Closed`.
    async fn close(&self) -> ExternalResult<()>;
}

/// Connection parameters handed to a connector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// System-specific options, passed through untouched
    pub options: BTreeMap<String, String>,
}

impl ConnectParams {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
