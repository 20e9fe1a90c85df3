//! External Bridge Module
//!
//! A bridge connects the local broker to one external messaging system and
//! manages the links between local and remote destinations. Outbound links
//! forward broker messages to a remote destination; inbound links deliver
//! messages from a remote destination into the broker, either by polling on
//! the shared scheduler or through listeners the external client invokes.
//!
//! # Example Configuration
//!
//! ```toml
//! [[bridge]]
//! name = "orders-mq"
//! kind = "queue_manager"
//! url = "mq://mq.example.com:1414"
//! poll_interval = "1s"
//!
//! [bridge.options]
//! queue_manager = "QM1"
//!
//! [[bridge.links]]
//! local = "local.orders"
//! remote = "ORDERS.IN"
//! direction = "in"
//! ```

mod base;
mod factory;
mod lifecycle;
mod manager;
mod name_map;
mod registry;
mod sink;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BridgeKind;
use crate::error::Result;
use crate::ingest::Scheduler;
use crate::message::Message;
use crate::metrics::Metrics;

pub use base::{BridgeCore, Handoff};
pub use factory::BridgeFactory;
pub use lifecycle::{BridgeState, Lifecycle};
pub use manager::BridgeManager;
pub use name_map::NameMapping;
pub use registry::LinkRegistry;
pub use sink::{ChannelSink, RecordingSink};

/// Tracing target for operator-facing bridge logs
pub const PROTOCOL_TARGET: &str = "protocol";

/// The broker's inbound interface as seen by a bridge.
///
/// An error means the broker did not take the message; the bridge then
/// leaves it unacknowledged on the external system.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn inbound(&self, destination: &str, message: Message) -> Result<()>;
}

/// Dependencies injected into every bridge
#[derive(Clone)]
pub struct BridgeContext {
    pub sink: Arc<dyn InboundSink>,
    pub scheduler: Arc<dyn Scheduler>,
    pub metrics: Arc<Metrics>,
}

impl BridgeContext {
    pub fn new(sink: Arc<dyn InboundSink>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            sink,
            scheduler,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// A bridge to one external messaging system
#[async_trait]
pub trait ExternalBridge: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> BridgeKind;

    fn state(&self) -> BridgeState;

    /// Whether inbound link filters are evaluated by the external system
    fn supports_remote_filtering(&self) -> bool {
        false
    }

    /// Connect and start ingestion. Only valid in `Created`; on failure the bridge ends `Closed`.
    async fn initialise(&self) -> Result<()>;

    /// Stop ingestion, close every link and the client. Never fails; repeated calls are no-ops.
    async fn close(&self);

    /// Open a send handle for `remote` and forward `local` to it
    async fn register_outbound_link(&self, local: &str, remote: &str) -> Result<()>;

    /// Open a receive handle for `remote` and deliver its messages to `local`
    async fn register_inbound_link(
        &self,
        remote: &str,
        local: &str,
        filter: Option<&str>,
    ) -> Result<()>;

    /// Translate and send a broker message published to `local`.
    ///
    /// Missing links and send failures are logged and the message dropped.
    async fn outbound(&self, local: &str, message: &Message);

    /// Whether an outbound link (exact or wildcard) covers `local`
    fn handles_outbound(&self, local: &str) -> bool;

    /// Number of (outbound, inbound) links
    fn link_counts(&self) -> (usize, usize);

    /// Remote name used when the broker links a local destination without naming one
    fn default_remote_name(&self, local: &str) -> String {
        local.to_string()
    }

    /// Forward `local` to its default remote destination
    async fn register_local_link(&self, local: &str) -> Result<()> {
        let remote = self.default_remote_name(local);
        self.register_outbound_link(local, &remote).await
    }

    /// Deliver `remote` into the local destination of the same name
    async fn register_remote_link(&self, remote: &str, filter: Option<&str>) -> Result<()> {
        self.register_inbound_link(remote, remote, filter).await
    }
}
