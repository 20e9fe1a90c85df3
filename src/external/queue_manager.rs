//! Queue-manager client surface
//!
//! Queues are opened for output or input on a connected queue manager.
//! Input queues are read without waiting under syncpoint: a message taken by
//! [`InputQueue::get`] stays pending until [`InputQueue::commit`] removes it
//! for good or [`InputQueue::backout`] returns it to the head of the queue.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ConnectParams, ExternalError, ExternalHandle, ExternalResult};

/// Default listener port
pub const DEFAULT_PORT: u16 = 1414;

/// Fixed width of the correlation identifier field
pub const CORRELATION_ID_LENGTH: usize = 24;

/// Name prefixes reserved by the queue manager
const RESERVED_PREFIXES: &[&str] = &["JMS", "usr.JMS", "Root.", "mq"];

/// Natively typed message property
#[derive(Debug, Clone, PartialEq)]
pub enum MqProperty {
    String(String),
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Bytes),
}

/// Queue-manager message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MqMessage {
    pub payload: Bytes,
    /// Message format name; unset means no format
    pub format: Option<String>,
    /// Remaining lifetime; `None` is unlimited
    pub expiry: Option<Duration>,
    /// Set by the queue manager on put
    pub put_time: Option<SystemTime>,
    correlation_id: Option<Bytes>,
    properties: Vec<(String, MqProperty)>,
}

impl MqMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn correlation_id(&self) -> Option<&Bytes> {
        self.correlation_id.as_ref()
    }

    /// Set the correlation identifier (at most [`CORRELATION_ID_LENGTH`] bytes)
    pub fn set_correlation_id(&mut self, id: Bytes) -> ExternalResult<()> {
        if id.len() > CORRELATION_ID_LENGTH {
            return Err(ExternalError::Rejected(format!(
                "correlation id is {} bytes, limit is {}",
                id.len(),
                CORRELATION_ID_LENGTH
            )));
        }
        self.correlation_id = Some(id);
        Ok(())
    }

    pub fn set_string_property(&mut self, name: &str, value: &str) -> ExternalResult<()> {
        self.set_property(name, MqProperty::String(value.to_string()))
    }

    pub fn set_boolean_property(&mut self, name: &str, value: bool) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Boolean(value))
    }

    pub fn set_byte_property(&mut self, name: &str, value: i8) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Byte(value))
    }

    pub fn set_short_property(&mut self, name: &str, value: i16) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Short(value))
    }

    pub fn set_int_property(&mut self, name: &str, value: i32) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Int(value))
    }

    pub fn set_long_property(&mut self, name: &str, value: i64) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Long(value))
    }

    pub fn set_float_property(&mut self, name: &str, value: f32) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Float(value))
    }

    pub fn set_double_property(&mut self, name: &str, value: f64) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Double(value))
    }

    pub fn set_bytes_property(&mut self, name: &str, value: Bytes) -> ExternalResult<()> {
        self.set_property(name, MqProperty::Bytes(value))
    }

    pub fn property(&self, name: &str) -> Option<&MqProperty> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// All properties in the order they were set
    pub fn properties(&self) -> impl Iterator<Item = (&str, &MqProperty)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn set_property(&mut self, name: &str, value: MqProperty) -> ExternalResult<()> {
        validate_property_name(name)?;
        match self.properties.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value,
            None => self.properties.push((name.to_string(), value)),
        }
        Ok(())
    }
}

fn validate_property_name(name: &str) -> ExternalResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid_start || !valid_rest {
        return Err(ExternalError::Rejected(format!(
            "invalid property name '{}'",
            name
        )));
    }

    if RESERVED_PREFIXES
        .iter()
        .any(|prefix| name.len() >= prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix))
    {
        return Err(ExternalError::Rejected(format!(
            "property name '{}' uses a reserved prefix",
            name
        )));
    }

    Ok(())
}

/// Opens connections to a queue manager
#[async_trait]
pub trait QueueManagerConnector: Send + Sync {
    async fn connect(
        &self,
        queue_manager: &str,
        params: &ConnectParams,
    ) -> ExternalResult<Arc<dyn QueueManager>>;
}

/// A connected queue manager
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Open a queue for putting messages
    async fn open_output(&self, queue: &str) -> ExternalResult<Arc<dyn OutputQueue>>;

    /// Open a queue for getting messages
    async fn open_input(&self, queue: &str) -> ExternalResult<Arc<dyn InputQueue>>;

    async fn disconnect(&self) -> ExternalResult<()>;
}

/// Queue opened for output
#[async_trait]
pub trait OutputQueue: ExternalHandle {
    async fn put(&self, message: MqMessage) -> ExternalResult<()>;
}

/// Queue opened for input under syncpoint
#[async_trait]
pub trait InputQueue: ExternalHandle {
    /// Take the next message, waiting at most `wait`. `Ok(None)` when the queue is empty.
    async fn get(&self, wait: Duration) -> ExternalResult<Option<MqMessage>>;

    /// Confirm removal of every message taken since the last commit/backout
    async fn commit(&self) -> ExternalResult<()>;

    /// Return every uncommitted message to the queue
    async fn backout(&self) -> ExternalResult<()>;
}
