//! Bridge Manager
//!
//! Owns every configured bridge and gives the broker one entry point for
//! starting, routing outbound messages and stopping them.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::{BridgeContext, BridgeFactory, BridgeState, ExternalBridge, PROTOCOL_TARGET};
use crate::config::{BridgeConfig, LinkRule};
use crate::message::Message;
use crate::metrics::Readiness;

struct ManagedBridge {
    bridge: Arc<dyn ExternalBridge>,
    links: Vec<LinkRule>,
}

/// Manages all bridges for a broker
pub struct BridgeManager {
    bridges: RwLock<Vec<Arc<ManagedBridge>>>,
}

impl BridgeManager {
    pub fn new() -> Self {
        Self {
            bridges: RwLock::new(Vec::new()),
        }
    }

    /// Build a manager from configuration. Disabled bridges are skipped;
    /// a bridge that cannot be built is logged and left out.
    pub fn from_configs(configs: &[BridgeConfig], factory: &BridgeFactory, ctx: &BridgeContext) -> Self {
        let manager = Self::new();

        for config in configs.iter().filter(|c| c.enabled) {
            match factory.create(config, ctx.clone()) {
                Ok(bridge) => manager.add_bridge(bridge, config.links.clone()),
                Err(e) => error!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to create: {}", config.name, e
                ),
            }
        }

        manager
    }

    /// Add a bridge with the links to register once it is started
    pub fn add_bridge(&self, bridge: Arc<dyn ExternalBridge>, links: Vec<LinkRule>) {
        info!(
            "Bridge manager: Added {} bridge '{}'",
            bridge.kind(),
            bridge.name()
        );
        self.bridges
            .write()
            .push(Arc::new(ManagedBridge { bridge, links }));
    }

    fn snapshot(&self) -> Vec<Arc<ManagedBridge>> {
        self.bridges.read().iter().cloned().collect()
    }

    /// Initialise every bridge, then register its configured links
    pub async fn start_all(&self) {
        for managed in self.snapshot() {
            let bridge = &managed.bridge;
            if let Err(e) = bridge.initialise().await {
                error!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Failed to start: {}", bridge.name(), e
                );
                continue;
            }

            for link in &managed.links {
                let remote = link.remote_name();
                let registered = if link.is_outbound() {
                    bridge.register_outbound_link(&link.local, remote).await
                } else {
                    bridge
                        .register_inbound_link(remote, &link.local, link.filter.as_deref())
                        .await
                };
                if let Err(e) = registered {
                    error!(
                        target: PROTOCOL_TARGET,
                        "Bridge '{}': Failed to register link: {}", bridge.name(), e
                    );
                }
            }
        }
    }

    /// Forward a broker message to every active bridge with a link for `local`.
    ///
    /// Returns the number of bridges the message was handed to.
    pub async fn outbound(&self, local: &str, message: &Message) -> usize {
        let targets: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|m| m.bridge.state() == BridgeState::Active && m.bridge.handles_outbound(local))
            .collect();

        if targets.is_empty() {
            warn!(
                target: PROTOCOL_TARGET,
                "Bridge manager: No bridge links '{}', message dropped", local
            );
            return 0;
        }

        for managed in &targets {
            debug!("Bridge '{}': Forwarding '{}'", managed.bridge.name(), local);
            managed.bridge.outbound(local, message).await;
        }
        targets.len()
    }

    /// Check if any bridge has an outbound link for `local`
    pub fn should_forward(&self, local: &str) -> bool {
        self.bridges
            .read()
            .iter()
            .any(|m| m.bridge.handles_outbound(local))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExternalBridge>> {
        self.bridges
            .read()
            .iter()
            .find(|m| m.bridge.name() == name)
            .map(|m| m.bridge.clone())
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.read().len()
    }

    pub fn active_count(&self) -> usize {
        self.bridges
            .read()
            .iter()
            .filter(|m| m.bridge.state() == BridgeState::Active)
            .count()
    }

    /// (name, state) of every bridge, in the order they were added
    pub fn status(&self) -> Vec<(String, BridgeState)> {
        self.bridges
            .read()
            .iter()
            .map(|m| (m.bridge.name().to_string(), m.bridge.state()))
            .collect()
    }

    /// Close every bridge
    pub async fn stop_all(&self) {
        for managed in self.snapshot() {
            managed.bridge.close().await;
        }
        info!("Bridge manager: Stopped {} bridges", self.bridge_count());
    }
}

impl Default for BridgeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness for BridgeManager {
    fn is_ready(&self) -> bool {
        let bridges = self.bridges.read();
        bridges
            .iter()
            .all(|m| m.bridge.state() == BridgeState::Active)
    }
}
