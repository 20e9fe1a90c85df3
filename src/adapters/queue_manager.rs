//! Queue-manager bridge
//!
//! Outbound links open an output queue; inbound links open an input queue
//! that is polled on the shared scheduler. Every tick takes at most one
//! message per inbound link under syncpoint, hands it to the broker, then
//! commits. A refused hand-off backs the message out so the next tick sees
//! it again.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::bridge::{
    BridgeContext, BridgeCore, BridgeState, ExternalBridge, PROTOCOL_TARGET,
};
use crate::config::{BridgeConfig, BridgeKind};
use crate::error::{BridgeError, Result};
use crate::external::queue_manager::{InputQueue, OutputQueue, QueueManager, QueueManagerConnector};
use crate::external::ExternalError;
use crate::ingest::{Ingestion, PollTask};
use crate::message::Message;
use crate::translate;

/// Option naming the queue manager to connect to
pub const QUEUE_MANAGER_OPTION: &str = "queue_manager";

pub struct QueueManagerBridge {
    inner: Arc<Inner>,
}

struct Inner {
    core: BridgeCore<dyn OutputQueue, dyn InputQueue>,
    config: BridgeConfig,
    queue_manager: String,
    connector: Arc<dyn QueueManagerConnector>,
    connection: RwLock<Option<Arc<dyn QueueManager>>>,
}

impl QueueManagerBridge {
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn QueueManagerConnector>,
        ctx: BridgeContext,
    ) -> Result<Self> {
        let queue_manager = config
            .option(QUEUE_MANAGER_OPTION)
            .filter(|qm| !qm.is_empty())
            .ok_or_else(|| {
                BridgeError::Config(format!(
                    "bridge '{}' requires option '{}'",
                    config.name, QUEUE_MANAGER_OPTION
                ))
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                core: BridgeCore::new(&config.name, ctx),
                config,
                queue_manager,
                connector,
                connection: RwLock::new(None),
            }),
        })
    }

    fn connection(&self) -> Option<Arc<dyn QueueManager>> {
        self.inner.connection.read().clone()
    }

    async fn release_connection(&self) {
        let connection = self.inner.connection.write().take();
        if let Some(connection) = connection {
            if let Err(e) = connection.disconnect().await {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Disconnect failed: {}",
                    self.inner.core.name(),
                    e
                );
            }
        }
    }
}

impl Inner {
    async fn poll_once(&self) {
        if !self.core.is_active() {
            return;
        }
        for (remote, queue) in self.core.inbound_links() {
            self.poll_link(&remote, queue.as_ref()).await;
        }
    }

    async fn poll_link(&self, remote: &str, queue: &dyn InputQueue) {
        let name = self.core.name();
        let received = tokio::time::timeout(self.config.receive_timeout, queue.get(Duration::ZERO));

        let native = match received.await {
            Ok(Ok(Some(native))) => native,
            Ok(Ok(None)) => {
                debug!(target: PROTOCOL_TARGET, "Bridge '{}': No message on '{}'", name, remote);
                return;
            }
            // Link closed underneath the tick
            Ok(Err(ExternalError::Closed)) => return,
            Ok(Err(e)) => {
                error!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Receive on '{}' failed: {}", name, remote, e
                );
                return;
            }
            Err(_) => {
                warn!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Receive on '{}' timed out after {:?}",
                    name,
                    remote,
                    self.config.receive_timeout
                );
                return;
            }
        };

        self.core.received(remote);
        let message = translate::queue_manager::decode(name, native);
        let handoff = self.core.deliver(remote, message).await;

        if handoff.acknowledge() {
            match queue.commit().await {
                Ok(()) => self.core.acknowledged(),
                Err(e) => error!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Commit on '{}' failed: {}", name, remote, e
                ),
            }
        } else if let Err(e) = queue.backout().await {
            error!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Backout on '{}' failed: {}", name, remote, e
            );
        }
    }
}

/// Poll task holding the bridge weakly; ends once the bridge is dropped
struct QueuePoller {
    bridge: Weak<Inner>,
}

#[async_trait]
impl PollTask for QueuePoller {
    async fn run(&self) -> bool {
        match self.bridge.upgrade() {
            Some(inner) => {
                inner.poll_once().await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ExternalBridge for QueueManagerBridge {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    fn kind(&self) -> BridgeKind {
        BridgeKind::QueueManager
    }

    fn state(&self) -> BridgeState {
        self.inner.core.state()
    }

    async fn initialise(&self) -> Result<()> {
        let inner = &self.inner;
        inner.core.begin_initialise()?;

        let params = inner.config.connect_params();
        let endpoint = format!("queue manager '{}' at {}", inner.queue_manager, params.endpoint());
        let connected = inner
            .core
            .connect_within(
                &endpoint,
                inner.config.connect_timeout,
                inner.connector.connect(&inner.queue_manager, &params),
            )
            .await;

        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };
        *inner.connection.write() = Some(connection);

        let poller: Arc<dyn PollTask> = Arc::new(QueuePoller {
            bridge: Arc::downgrade(&self.inner),
        });
        let schedule = inner.core.ctx().scheduler.schedule(
            inner.core.name(),
            inner.config.poll_interval,
            poller,
        );

        if !inner.core.activate(Ingestion::Poll(schedule)) {
            self.release_connection().await;
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
        self.release_connection().await;
        self.inner.core.finish_close();
    }

    async fn register_outbound_link(&self, local: &str, remote: &str) -> Result<()> {
        let connection = self.connection();
        self.inner
            .core
            .register_sender(local, remote, async move {
                match connection {
                    Some(connection) => connection.open_output(remote).await,
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
        let connection = self.connection();
        self.inner
            .core
            .register_receiver(remote, local, filter, self.supports_remote_filtering(), async move {
                match connection {
                    Some(connection) => connection.open_input(remote).await,
                    None => Err(ExternalError::Closed),
                }
            })
            .await
    }

    async fn outbound(&self, local: &str, message: &Message) {
        let core = &self.inner.core;
        let Some((remote, queue)) = core.outbound_link(local) else {
            return;
        };

        let started = Instant::now();
        let native = translate::queue_manager::encode(core.name(), message);
        match queue.put(native).await {
            Ok(()) => core.outbound_sent(local, &remote, started),
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
