//! Pub/sub log client surface
//!
//! Producers send to a topic; consumers receive through a listener that the
//! client invokes on its own delivery task, one message at a time per
//! consumer. Properties are plain strings.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ConnectParams, ExternalError, ExternalHandle, ExternalResult};

/// Default broker port
pub const DEFAULT_PORT: u16 = 6650;

/// Identifier assigned to each message by the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message delivered to a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    pub id: MessageId,
    /// Fully qualified topic name
    pub topic: String,
    pub data: Bytes,
    pub properties: Vec<(String, String)>,
    pub event_time: Option<SystemTime>,
    pub redelivery_count: u32,
}

/// A message handed to a producer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub data: Bytes,
    pub event_time: Option<SystemTime>,
    properties: Vec<(String, String)>,
}

impl OutgoingMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> ExternalResult<()> {
        if name.is_empty() {
            return Err(ExternalError::Rejected(
                "property name must not be empty".to_string(),
            ));
        }
        match self.properties.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.properties.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }
}

/// Opens pub/sub clients
#[async_trait]
pub trait PubSubConnector: Send + Sync {
    async fn connect(
        &self,
        service_url: &str,
        params: &ConnectParams,
    ) -> ExternalResult<Arc<dyn PubSubClient>>;
}

/// A connected pub/sub client
#[async_trait]
pub trait PubSubClient: Send + Sync {
    async fn create_producer(
        &self,
        topic: &str,
        producer_name: &str,
    ) -> ExternalResult<Arc<dyn PubSubProducer>>;

    /// Subscribe to a topic. `listener` is invoked for every delivered message.
    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        listener: Arc<dyn PubSubListener>,
    ) -> ExternalResult<Arc<dyn PubSubConsumer>>;

    async fn close(&self) -> ExternalResult<()>;
}

#[async_trait]
pub trait PubSubProducer: ExternalHandle {
    async fn send(&self, message: OutgoingMessage) -> ExternalResult<MessageId>;
}

#[async_trait]
pub trait PubSubConsumer: ExternalHandle {
    async fn acknowledge(&self, id: MessageId) -> ExternalResult<()>;
}

/// Receives messages pushed by the client.
///
/// Runs on the client's delivery task; a slow listener holds back further
/// deliveries for that consumer.
#[async_trait]
pub trait PubSubListener: Send + Sync {
    async fn received(&self, consumer: &dyn PubSubConsumer, message: PubSubMessage);
}
