//! Bridge construction by kind

use std::sync::Arc;

use super::{BridgeContext, ExternalBridge};
use crate::adapters::{NotificationBridge, PubSubBridge, QueueManagerBridge};
use crate::config::{BridgeConfig, BridgeKind};
use crate::error::{BridgeError, Result};
use crate::external::memory::{MemoryNotificationService, MemoryPubSub, MemoryQueueManager};
use crate::external::notification::NotificationConnector;
use crate::external::pubsub::PubSubConnector;
use crate::external::queue_manager::QueueManagerConnector;

/// Holds one connector per external system and builds bridges from config
#[derive(Clone, Default)]
pub struct BridgeFactory {
    notification: Option<Arc<dyn NotificationConnector>>,
    queue_manager: Option<Arc<dyn QueueManagerConnector>>,
    pubsub: Option<Arc<dyn PubSubConnector>>,
}

impl BridgeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory backed by the in-memory systems
    pub fn in_memory(
        notification: MemoryNotificationService,
        queue_manager: MemoryQueueManager,
        pubsub: MemoryPubSub,
    ) -> Self {
        Self::new()
            .with_notification(Arc::new(notification))
            .with_queue_manager(Arc::new(queue_manager))
            .with_pubsub(Arc::new(pubsub))
    }

    pub fn with_notification(mut self, connector: Arc<dyn NotificationConnector>) -> Self {
        self.notification = Some(connector);
        self
    }

    pub fn with_queue_manager(mut self, connector: Arc<dyn QueueManagerConnector>) -> Self {
        self.queue_manager = Some(connector);
        self
    }

    pub fn with_pubsub(mut self, connector: Arc<dyn PubSubConnector>) -> Self {
        self.pubsub = Some(connector);
        self
    }

    pub fn create(&self, config: &BridgeConfig, ctx: BridgeContext) -> Result<Arc<dyn ExternalBridge>> {
        let missing = || {
            BridgeError::Config(format!(
                "no {} connector available for bridge '{}'",
                config.kind, config.name
            ))
        };

        let bridge: Arc<dyn ExternalBridge> = match config.kind {
            BridgeKind::Notification => {
                let connector = self.notification.clone().ok_or_else(missing)?;
                Arc::new(NotificationBridge::new(config.clone(), connector, ctx)?)
            }
            BridgeKind::QueueManager => {
                let connector = self.queue_manager.clone().ok_or_else(missing)?;
                Arc::new(QueueManagerBridge::new(config.clone(), connector, ctx)?)
            }
            BridgeKind::PubSub => {
                let connector = self.pubsub.clone().ok_or_else(missing)?;
                Arc::new(PubSubBridge::new(config.clone(), connector, ctx)?)
            }
        };
        Ok(bridge)
    }
}
