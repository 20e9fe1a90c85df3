//! Pub/sub log bridge
//!
//! Outbound links own a producer per remote topic. Inbound links own a
//! consumer whose listener runs on the client's delivery task; a message is
//! acknowledged only after the broker accepted it, otherwise the log
//! redelivers it.

use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{error, warn};

use crate::bridge::{
    BridgeContext, BridgeCore, BridgeState, ExternalBridge, PROTOCOL_TARGET,
};
use crate::config::{BridgeConfig, BridgeKind};
use crate::error::{BridgeError, Result};
use crate::external::pubsub::{
    PubSubClient, PubSubConnector, PubSubConsumer, PubSubListener, PubSubMessage, PubSubProducer,
};
use crate::external::ExternalError;
use crate::ingest::{Ingestion, PushGate, PushRegistration};
use crate::message::Message;
use crate::translate;

/// Option naming the subscription; also used as the producer name
pub const SUBSCRIPTION_NAME_OPTION: &str = "subscription_name";

pub struct PubSubBridge {
    inner: Arc<Inner>,
}

struct Inner {
    core: BridgeCore<dyn PubSubProducer, dyn PubSubConsumer>,
    config: BridgeConfig,
    connector: Arc<dyn PubSubConnector>,
    client: RwLock<Option<Arc<dyn PubSubClient>>>,
    subscription: String,
}

impl PubSubBridge {
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn PubSubConnector>,
        ctx: BridgeContext,
    ) -> Result<Self> {
        let subscription = config
            .option(SUBSCRIPTION_NAME_OPTION)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| config.name.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                core: BridgeCore::new(&config.name, ctx),
                config,
                connector,
                client: RwLock::new(None),
                subscription,
            }),
        })
    }

    /// Service url handed to the client
    pub fn service_url(&self) -> String {
        let params = self.inner.config.connect_params();
        format!("pulsar://{}:{}", params.host, params.port)
    }

    fn client(&self) -> Option<Arc<dyn PubSubClient>> {
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

/// Listener for one consumer
struct PubSubReceiver {
    bridge: Weak<Inner>,
    gate: PushGate,
    remote: String,
}

#[async_trait]
impl PubSubListener for PubSubReceiver {
    async fn received(&self, consumer: &dyn PubSubConsumer, message: PubSubMessage) {
        if !self.gate.is_open() {
            return;
        }
        let Some(inner) = self.bridge.upgrade() else {
            return;
        };

        inner.core.received(&self.remote);
        let id = message.id;
        let handoff = inner
            .core
            .deliver(&self.remote, translate::pubsub::decode(&message))
            .await;
        if !handoff.acknowledge() {
            // Left unacknowledged for redelivery
            return;
        }

        match consumer.acknowledge(id).await {
            Ok(()) => inner.core.acknowledged(),
            Err(e) => error!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Acknowledge of {} on '{}' failed: {}",
                inner.core.name(),
                id,
                self.remote,
                e
            ),
        }
    }
}

#[async_trait]
impl ExternalBridge for PubSubBridge {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    fn kind(&self) -> BridgeKind {
        BridgeKind::PubSub
    }

    fn state(&self) -> BridgeState {
        self.inner.core.state()
    }

    async fn initialise(&self) -> Result<()> {
        let inner = &self.inner;
        inner.core.begin_initialise()?;

        let service_url = self.service_url();
        let params = inner.config.connect_params();
        let connected = inner
            .core
            .connect_within(
                &service_url,
                inner.config.connect_timeout,
                inner.connector.connect(&service_url, &params),
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
            return Err(BridgeError::Connection(format!(
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
        let producer_name = self.inner.subscription.as_str();
        self.inner
            .core
            .register_sender(local, remote, async move {
                match client {
                    Some(client) => client.create_producer(remote, producer_name).await,
                    None => Err(ExternalError::Closed),
                }
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
        let listener = inner.core.push_gate().map(|gate| {
            Arc::new(PubSubReceiver {
                bridge: Arc::downgrade(inner),
                gate,
                remote: remote.to_string(),
            }) as Arc<dyn PubSubListener>
        });
        let subscription = inner.subscription.as_str();

        inner
            .core
            .register_receiver(remote, local, filter, self.supports_remote_filtering(), async move {
                match (client, listener) {
                    (Some(client), Some(listener)) => {
                        client.subscribe(remote, subscription, listener).await
                    }
                    _ => Err(ExternalError::Closed),
                }
            })
            .await
    }

    async fn outbound(&self, local: &str, message: &Message) {
        let core = &self.inner.core;
        let Some((remote, producer)) = core.outbound_link(local) else {
            return;
        };

        let started = Instant::now();
        let native = translate::pubsub::encode(core.name(), message);
        match producer.send(native).await {
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
}
