//! Notification fan-out bridge
//!
//! Outbound links publish to a topic ARN. Inbound links subscribe to a topic
//! and receive notifications through a listener run by the client; a
//! notification is acknowledged only once the broker has taken it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;

use crate::bridge::{
    BridgeContext, BridgeCore, BridgeState, ExternalBridge, PROTOCOL_TARGET,
};
use crate::config::{BridgeConfig, BridgeKind};
use crate::error::Result;
use crate::external::notification::{
    Notification, NotificationClient, NotificationConnector, NotificationListener,
    SubscribeRequest,
};
use crate::external::{ExternalError, ExternalHandle, ExternalResult};
use crate::ingest::{Ingestion, PushGate, PushRegistration};
use crate::message::Message;
use crate::translate;

/// Option naming the topic used by [`ExternalBridge::register_local_link`]
pub const TOPIC_ARN_OPTION: &str = "topic_arn";
/// Option naming the subscription delivery protocol
pub const SUBSCRIPTION_PROTOCOL_OPTION: &str = "subscription_protocol";
/// Option naming the subscription endpoint; defaults to the local destination
pub const SUBSCRIPTION_ENDPOINT_OPTION: &str = "subscription_endpoint";

const DEFAULT_SUBSCRIPTION_PROTOCOL: &str = "sqs";

/// Outbound link target. Topics need no per-link resource.
pub struct TopicHandle {
    topic_arn: String,
}

impl TopicHandle {
    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

#[async_trait]
impl ExternalHandle for TopicHandle {
    async fn close(&self) -> ExternalResult<()> {
        Ok(())
    }
}

/// Inbound link; closing it unsubscribes
pub struct SubscriptionHandle {
    client: Arc<dyn NotificationClient>,
    subscription_arn: String,
    closed: AtomicBool,
}

#[async_trait]
impl ExternalHandle for SubscriptionHandle {
    async fn close(&self) -> ExternalResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ExternalError::Closed);
        }
        self.client.unsubscribe(&self.subscription_arn).await
    }
}

pub struct NotificationBridge {
    inner: Arc<Inner>,
}

struct Inner {
    core: BridgeCore<TopicHandle, SubscriptionHandle>,
    config: BridgeConfig,
    connector: Arc<dyn NotificationConnector>,
    client: RwLock<Option<Arc<dyn NotificationClient>>>,
    topic_arn: Option<String>,
    protocol: String,
    endpoint: Option<String>,
}

impl NotificationBridge {
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn NotificationConnector>,
        ctx: BridgeContext,
    ) -> Result<Self> {
        let topic_arn = config.option(TOPIC_ARN_OPTION).filter(|t| !t.is_empty());
        let protocol = config
            .option(SUBSCRIPTION_PROTOCOL_OPTION)
            .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_PROTOCOL.to_string());
        let endpoint = config.option(SUBSCRIPTION_ENDPOINT_OPTION);

        Ok(Self {
            inner: Arc::new(Inner {
                core: BridgeCore::new(&config.name, ctx),
                config,
                connector,
                client: RwLock::new(None),
                topic_arn,
                protocol,
                endpoint,
            }),
        })
    }

    fn client(&self) -> Option<Arc<dyn NotificationClient>> {
        self.inner.client.read().clone()
    }

    async fn release_client(&self) {
        let client = self.inner.client.write().take();
        if let Some(client) = client {
            if let Err(e) = client.close().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Client close failed: {}",
                    self.inner.core.name(),
                    e
                );
            }
        }
    }
}

/// Listener for one subscription
struct NotificationReceiver {
    bridge: Weak<Inner>,
    gate: PushGate,
    remote: String,
}

#[async_trait]
impl NotificationListener for NotificationReceiver {
    async fn on_notification(&self, notification: Notification) -> ExternalResult<()> {
        if !self.gate.is_open() {
            return Err(ExternalError::Closed);
        }
        let Some(inner) = self.bridge.upgrade() else {
            return Err(ExternalError::Closed);
        };

        inner.core.received(&self.remote);
        let message = translate::notification::decode(&notification);
        if inner.core.deliver(&self.remote, message).await.acknowledge() {
            inner.core.acknowledged();
            Ok(())
        } else {
            Err(ExternalError::Other(format!(
                "notification {} not accepted by the broker",
                notification.message_id
            )))
        }
    }
}

#[async_trait]
impl ExternalBridge for NotificationBridge {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    fn kind(&self) -> BridgeKind {
        BridgeKind::Notification
    }

    fn state(&self) -> BridgeState {
        self.inner.core.state()
    }

    async fn initialise(&self) -> Result<()> {
        let inner = &self.inner;
        inner.core.begin_initialise()?;

        let params = inner.config.connect_params();
        let connected = inner
            .core
            .connect_within(
                &params.endpoint(),
                inner.config.connect_timeout,
                inner.connector.connect(&params),
            )
            .await;

        let client = match connected {
            Ok(client) => client,
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };
        *inner.client.write() = Some(client);

        if !inner.core.activate(Ingestion::Push(PushRegistration::new())) {
            self.release_client().await;
            return Err(crate::error::BridgeError::Connection(format!(
                "bridge '{}' closed during initialise",
                inner.core.name()
            )));
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.inner.core.begin_close() {
            return;
        }
        self.inner.core.teardown().await;
        self.release_client().await;
        self.inner.core.finish_close();
    }

    async fn register_outbound_link(&self, local: &str, remote: &str) -> Result<()> {
        let client = self.client();
        self.inner
            .core
            .register_sender(local, remote, async move {
                let client = client.ok_or(ExternalError::Closed)?;
                if !client.topic_exists(remote).await? {
                    return Err(ExternalError::Rejected(format!(
                        "topic '{}' does not exist",
                        remote
                    )));
                }
                Ok(Arc::new(TopicHandle {
                    topic_arn: remote.to_string(),
                }))
            })
            .await
    }

    async fn register_inbound_link(
        &self,
        remote: &str,
        local: &str,
        filter: Option<&str>,
    ) -> Result<()> {
        let inner = &self.inner;
        let client = self.client();
        let gate = inner.core.push_gate();
        let listener = gate.map(|gate| {
            Arc::new(NotificationReceiver {
                bridge: Arc::downgrade(inner),
                gate,
                remote: remote.to_string(),
            }) as Arc<dyn NotificationListener>
        });
        let request = SubscribeRequest {
            topic_arn: remote.to_string(),
            protocol: inner.protocol.clone(),
            endpoint: inner.endpoint.clone().unwrap_or_else(|| local.to_string()),
        };

        inner
            .core
            .register_receiver(remote, local, filter, self.supports_remote_filtering(), async move {
                let (client, listener) = match (client, listener) {
                    (Some(client), Some(listener)) => (client, listener),
                    _ => return Err(ExternalError::Closed),
                };
                let subscription_arn = client.subscribe(request, listener).await?;
                Ok(Arc::new(SubscriptionHandle {
                    client,
                    subscription_arn,
                    closed: AtomicBool::new(false),
                }))
            })
            .await
    }

    async fn outbound(&self, local: &str, message: &Message) {
        let core = &self.inner.core;
        let Some((remote, topic)) = core.outbound_link(local) else {
            return;
        };

        let started = Instant::now();
        let request = match translate::notification::encode(core.name(), topic.topic_arn(), message) {
            Ok(request) => request,
            Err(e) => {
                core.outbound_failed(local, &remote, &e);
                return;
            }
        };

        let Some(client) = self.client() else {
            core.outbound_failed(local, &remote, &ExternalError::Closed.into());
            return;
        };
        match client.publish(request).await {
            Ok(_) => core.outbound_sent(local, &remote, started),
            Err(e) => core.outbound_failed(local, &remote, &e.into()),
        }
    }

    fn handles_outbound(&self, local: &str) -> bool {
        self.inner.core.has_outbound(local)
    }

    fn link_counts(&self) -> (usize, usize) {
        self.inner.core.link_counts()
    }

    fn default_remote_name(&self, local: &str) -> String {
        self.inner
            .topic_arn
            .clone()
            .unwrap_or_else(|| local.to_string())
    }
}
