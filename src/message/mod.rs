//! Broker-side message model
//!
//! A [`Message`] is immutable once built. Bridges translate it freshly into the
//! external representation for every send and build a new one for every
//! inbound delivery.

mod parse;
mod value;

use std::time::SystemTime;

use bytes::Bytes;

pub use parse::{parse_properties, parse_value};
pub use value::{PropertyMap, TypedValue, ValueKind};

/// A message as seen by the local broker
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: Bytes,
    properties: PropertyMap,
    correlation_id: Option<Bytes>,
    content_type: Option<String>,
    expiry: Option<SystemTime>,
    creation: Option<SystemTime>,
}

impl Message {
    /// Start building a message around a payload
    pub fn builder(payload: impl Into<Bytes>) -> MessageBuilder {
        MessageBuilder::new(payload)
    }

    /// Message with a payload and nothing else
    pub fn from_payload(payload: impl Into<Bytes>) -> Self {
        MessageBuilder::new(payload).build()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn correlation_id(&self) -> Option<&Bytes> {
        self.correlation_id.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn expiry(&self) -> Option<SystemTime> {
        self.expiry
    }

    pub fn creation(&self) -> Option<SystemTime> {
        self.creation
    }

    /// Whether the expiry timestamp lies in the past
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Builder for [`Message`]
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            message: Message {
                payload: payload.into(),
                properties: PropertyMap::new(),
                correlation_id: None,
                content_type: None,
                expiry: None,
                creation: None,
            },
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.message.properties.insert(name, value);
        self
    }

    pub fn properties(mut self, properties: PropertyMap) -> Self {
        self.message.properties = properties;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<Bytes>) -> Self {
        self.message.correlation_id = Some(id.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.message.content_type = Some(content_type.into());
        self
    }

    pub fn expiry(mut self, expiry: SystemTime) -> Self {
        self.message.expiry = Some(expiry);
        self
    }

    pub fn creation(mut self, creation: SystemTime) -> Self {
        self.message.creation = Some(creation);
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_builder() {
        let message = Message::builder("hello")
            .property("a", 1i32)
            .property("b", "x")
            .correlation_id(&b"corr-1"[..])
            .content_type("text/plain")
            .build();

        assert_eq!(message.payload().as_ref(), b"hello");
        assert_eq!(message.properties().len(), 2);
        assert_eq!(message.correlation_id().map(|c| c.as_ref()), Some(&b"corr-1"[..]));
        assert_eq!(message.content_type(), Some("text/plain"));
        assert!(message.expiry().is_none());
    }

    #[test]
    fn test_expiry() {
        let now = SystemTime::now();
        let fresh = Message::builder("x")
            .expiry(now + Duration::from_secs(60))
            .build();
        let stale = Message::builder("x")
            .expiry(now - Duration::from_secs(1))
            .build();

        assert!(!fresh.is_expired(now));
        assert!(stale.is_expired(now));
        assert!(!Message::from_payload("x").is_expired(now));
    }
}
