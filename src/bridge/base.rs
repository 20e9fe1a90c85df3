//! State shared by every bridge adapter
//!
//! [`BridgeCore`] owns the lifecycle, the two link registries, the name
//! mapping and the running ingestion. Adapters supply the system-specific
//! parts (connect, open a handle, translate, send, acknowledge) and route
//! everything else through here so the discipline around them is identical
//! across systems.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::lifecycle::{BridgeState, Lifecycle};
use super::name_map::NameMapping;
use super::registry::LinkRegistry;
use super::{BridgeContext, PROTOCOL_TARGET};
use crate::config::LinkDirection;
use crate::destination;
use crate::error::{BridgeError, Result};
use crate::external::{ExternalHandle, ExternalResult};
use crate::ingest::{Ingestion, PushGate};
use crate::message::Message;
use crate::metrics::drop_reason;

/// Outcome of handing an inbound message to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Accepted by the broker
    Delivered,
    /// No local destination mapped for the remote name; discarded
    Unrouted,
    /// The broker refused the message
    Failed,
}

impl Handoff {
    /// Whether the external system should be told the message is done with
    pub fn acknowledge(&self) -> bool {
        !matches!(self, Handoff::Failed)
    }
}

/// Generic bridge state; `S` is the send handle, `R` the receive handle
pub struct BridgeCore<S: ?Sized, R: ?Sized> {
    name: String,
    ctx: BridgeContext,
    lifecycle: Lifecycle,
    senders: LinkRegistry<S>,
    receivers: LinkRegistry<R>,
    names: NameMapping,
    ingestion: Mutex<Option<Ingestion>>,
    registration: tokio::sync::Mutex<()>,
}

impl<S, R> BridgeCore<S, R>
where
    S: ?Sized + ExternalHandle,
    R: ?Sized + ExternalHandle,
{
    pub fn new(name: &str, ctx: BridgeContext) -> Self {
        Self {
            name: name.to_string(),
            ctx,
            lifecycle: Lifecycle::new(),
            senders: LinkRegistry::new(),
            receivers: LinkRegistry::new(),
            names: NameMapping::new(),
            ingestion: Mutex::new(None),
            registration: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ctx(&self) -> &BridgeContext {
        &self.ctx
    }

    pub fn state(&self) -> BridgeState {
        self.lifecycle.state()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn link_counts(&self) -> (usize, usize) {
        (self.senders.len(), self.receivers.len())
    }

    pub fn has_outbound(&self, local: &str) -> bool {
        self.resolve_outbound(local).is_some()
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn begin_initialise(&self) -> Result<()> {
        self.lifecycle.begin_initialise().map_err(|state| {
            BridgeError::Connection(format!(
                "bridge '{}' cannot initialise in state {}",
                self.name, state
            ))
        })
    }

    /// Run the external connect under `limit`, mapping failure to a connection error
    pub async fn connect_within<T, F>(&self, endpoint: &str, limit: Duration, connect: F) -> Result<T>
    where
        F: Future<Output = ExternalResult<T>>,
    {
        info!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Connecting to {}", self.name, endpoint
        );

        let reason = match tokio::time::timeout(limit, connect).await {
            Ok(Ok(client)) => return Ok(client),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("connect to {} timed out after {:?}", endpoint, limit),
        };

        error!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Connection failed: {}", self.name, reason
        );
        Err(BridgeError::Connection(reason))
    }

    /// Install the running ingestion and enter `Active`.
    ///
    /// False when a close started during initialise; the ingestion is
    /// stopped and the caller must release its client.
    pub fn activate(&self, ingestion: Ingestion) -> bool {
        let discipline = ingestion.discipline();
        *self.ingestion.lock() = Some(ingestion);

        if !self.lifecycle.activate() {
            if let Some(ingestion) = self.ingestion.lock().take() {
                ingestion.stop();
            }
            return false;
        }

        self.ctx.metrics.bridge_activated();
        info!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Active ({} ingestion)", self.name, discipline
        );
        true
    }

    /// Gate for push listeners, present once a push bridge is active
    pub fn push_gate(&self) -> Option<PushGate> {
        match self.ingestion.lock().as_ref() {
            Some(Ingestion::Push(registration)) => Some(registration.gate()),
            _ => None,
        }
    }

    /// Enter `Closing`. False if the bridge is already closing or closed.
    pub fn begin_close(&self) -> bool {
        match self.lifecycle.begin_close() {
            Some(previous) => {
                if previous == BridgeState::Active {
                    self.ctx.metrics.bridge_deactivated();
                }
                info!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Closing (was {})", self.name, previous
                );
                true
            }
            None => false,
        }
    }

    /// Stop ingestion, then close inbound and outbound handles. Errors are logged.
    pub async fn teardown(&self) {
        if let Some(ingestion) = self.ingestion.lock().take() {
            ingestion.stop();
        }

        for (remote, handle) in self.receivers.drain() {
            if let Err(e) = handle.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to close inbound link '{}': {}", self.name, remote, e
                );
            }
        }
        for (local, handle) in self.senders.drain() {
            if let Err(e) = handle.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to close outbound link '{}': {}", self.name, local, e
                );
            }
        }

        self.names.clear();
        self.update_link_gauges();
    }

    pub fn finish_close(&self) {
        self.lifecycle.finish_close();
        info!(target: PROTOCOL_TARGET, "Bridge '{}': Closed", self.name);
    }

    // ---------------------------------------------------------------------
    // Link registration
    // ---------------------------------------------------------------------

    /// Register an outbound link, closing any handle it replaces before `open` runs
    pub async fn register_sender<F>(&self, local: &str, remote: &str, open: F) -> Result<()>
    where
        F: Future<Output = ExternalResult<Arc<S>>>,
    {
        let _guard = self.registration.lock().await;
        self.require_active(local)?;

        if let Some(previous) = self.senders.remove(local) {
            debug!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Replacing outbound link '{}'", self.name, local
            );
            if let Err(e) = previous.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to close replaced link '{}': {}", self.name, local, e
                );
            }
            self.names.unmap_outbound(local);
        }

        let handle = open.await.map_err(|e| {
            error!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Cannot open '{}' for outbound link '{}': {}",
                self.name,
                remote,
                local,
                e
            );
            BridgeError::link(remote, e)
        })?;

        self.senders.insert(local, handle);
        self.names.map_outbound(local, remote);

        if !self.is_active() {
            self.release_sender(local).await;
            return Err(BridgeError::link(remote, "bridge closed during registration"));
        }

        self.update_link_gauges();
        info!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Outbound link '{}' -> '{}'", self.name, local, remote
        );
        Ok(())
    }

    /// Register an inbound link, closing any handle it replaces before `open` runs
    pub async fn register_receiver<F>(
        &self,
        remote: &str,
        local: &str,
        filter: Option<&str>,
        remote_filtering: bool,
        open: F,
    ) -> Result<()>
    where
        F: Future<Output = ExternalResult<Arc<R>>>,
    {
        let _guard = self.registration.lock().await;
        self.require_active(remote)?;

        if let (Some(filter), false) = (filter, remote_filtering) {
            warn!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Remote filtering not supported, filter '{}' on '{}' ignored",
                self.name,
                filter,
                remote
            );
        }

        if let Some(previous) = self.receivers.remove(remote) {
            debug!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Replacing inbound link '{}'", self.name, remote
            );
            if let Err(e) = previous.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to close replaced link '{}': {}", self.name, remote, e
                );
            }
            self.names.unmap_inbound(remote);
        }

        // Push clients may deliver before `open` returns
        self.names.map_inbound(remote, local);

        let handle = open.await.map_err(|e| {
            error!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Cannot open '{}' for inbound link: {}", self.name, remote, e
            );
            self.names.unmap_inbound(remote);
            BridgeError::link(remote, e)
        })?;

        self.receivers.insert(remote, handle);

        if !self.is_active() {
            self.release_receiver(remote).await;
            return Err(BridgeError::link(remote, "bridge closed during registration"));
        }

        self.update_link_gauges();
        info!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Inbound link '{}' -> '{}'", self.name, remote, local
        );
        Ok(())
    }

    fn require_active(&self, destination: &str) -> Result<()> {
        match self.state() {
            BridgeState::Active => Ok(()),
            state => Err(BridgeError::link(
                destination,
                format!("bridge '{}' is {}", self.name, state),
            )),
        }
    }

    async fn release_sender(&self, local: &str) {
        self.names.unmap_outbound(local);
        if let Some(handle) = self.senders.remove(local) {
            if let Err(e) = handle.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to close outbound link '{}': {}", self.name, local, e
                );
            }
        }
    }

    async fn release_receiver(&self, remote: &str) {
        self.names.unmap_inbound(remote);
        if let Some(handle) = self.receivers.remove(remote) {
            if let Err(e) = handle.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to close inbound link '{}': {}", self.name, remote, e
                );
            }
        }
    }

    fn update_link_gauges(&self) {
        let metrics = &self.ctx.metrics;
        metrics.links_set(&self.name, LinkDirection::Out.as_str(), self.senders.len());
        metrics.links_set(&self.name, LinkDirection::In.as_str(), self.receivers.len());
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    /// Exact link first, then the first registered filter that matches
    fn resolve_outbound(&self, local: &str) -> Option<(String, Arc<S>)> {
        if let (Some(handle), Some(remote)) = (self.senders.get(local), self.names.remote_for(local)) {
            return Some((remote, handle));
        }

        self.senders
            .snapshot()
            .into_iter()
            .filter(|(name, _)| destination::is_filter(name))
            .find(|(name, _)| destination::matches_filter(local, name))
            .and_then(|(name, handle)| self.names.remote_for(&name).map(|remote| (remote, handle)))
    }

    /// Find the link for an outbound message, logging and counting the drop if there is none
    pub fn outbound_link(&self, local: &str) -> Option<(String, Arc<S>)> {
        if !self.is_active() {
            warn!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Not active, message for '{}' dropped", self.name, local
            );
            self.ctx
                .metrics
                .message_dropped(&self.name, drop_reason::INACTIVE);
            return None;
        }

        let link = self.resolve_outbound(local);
        if link.is_none() {
            warn!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': No outbound link for '{}', message dropped", self.name, local
            );
            self.ctx
                .metrics
                .message_dropped(&self.name, drop_reason::NO_LINK);
        }
        link
    }

    pub fn outbound_sent(&self, local: &str, remote: &str, started: Instant) {
        debug!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Sent '{}' to '{}'", self.name, local, remote
        );
        self.ctx
            .metrics
            .message_sent(&self.name, started.elapsed().as_secs_f64());
    }

    pub fn outbound_failed(&self, local: &str, remote: &str, err: &BridgeError) {
        let reason = match err {
            BridgeError::Translation(_) => drop_reason::TRANSLATION,
            _ => drop_reason::SEND,
        };
        error!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Message for '{}' not sent to '{}': {}", self.name, local, remote, err
        );
        self.ctx.metrics.message_dropped(&self.name, reason);
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    pub fn inbound_link(&self, remote: &str) -> Option<Arc<R>> {
        self.receivers.get(remote)
    }

    /// Inbound links in registration order
    pub fn inbound_links(&self) -> Vec<(String, Arc<R>)> {
        self.receivers.snapshot()
    }

    pub fn received(&self, remote: &str) {
        debug!(
            target: PROTOCOL_TARGET,
            "Bridge '{}': Received message on '{}'", self.name, remote
        );
        self.ctx.metrics.message_received(&self.name);
    }

    /// Resolve the local destination and hand the message to the broker
    pub async fn deliver(&self, remote: &str, message: Message) -> Handoff {
        let Some(local) = self.names.local_for(remote) else {
            debug!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': No local destination for '{}', message discarded", self.name, remote
            );
            self.ctx.metrics.message_discarded(&self.name);
            return Handoff::Unrouted;
        };

        match self.ctx.sink.inbound(&local, message).await {
            Ok(()) => {
                debug!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Delivered '{}' to '{}'", self.name, remote, local
                );
                self.ctx.metrics.message_delivered(&self.name);
                Handoff::Delivered
            }
            Err(e) => {
                error!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Delivery of '{}' to '{}' failed: {}", self.name, remote, local, e
                );
                self.ctx.metrics.handoff_failed(&self.name);
                Handoff::Failed
            }
        }
    }

    pub fn acknowledged(&self) {
        self.ctx.metrics.message_acknowledged(&self.name);
    }
}
