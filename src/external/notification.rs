//! Notification fan-out client surface
//!
//! Messages are published to a topic ARN with string-valued attributes.
//! Subscriptions deliver notifications to a listener; a listener returning
//! `Ok` acknowledges the notification, an error leaves it to the service's
//! own retry policy.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use super::{ConnectParams, ExternalError, ExternalResult};

/// Default HTTPS port
pub const DEFAULT_PORT: u16 = 443;

/// Attribute limit per published message
pub const MAX_ATTRIBUTES: usize = 10;

const MAX_ATTRIBUTE_NAME_LENGTH: usize = 256;
const RESERVED_PREFIXES: &[&str] = &["AWS.", "Amazon."];

/// Declared data type of a message attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "String",
            AttributeType::Number => "Number",
        }
    }
}

/// A message attribute; the value is always carried as a string
#[derive(Debug, Clone, PartialEq)]
pub struct MessageAttribute {
    pub data_type: AttributeType,
    pub value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: AttributeType::String,
            value: value.into(),
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self {
            data_type: AttributeType::Number,
            value: value.into(),
        }
    }
}

/// A publish call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishRequest {
    pub topic_arn: String,
    pub message: String,
    attributes: Vec<(String, MessageAttribute)>,
}

impl PublishRequest {
    pub fn new(topic_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            message: message.into(),
            attributes: Vec::new(),
        }
    }

    pub fn set_attribute(&mut self, name: &str, attribute: MessageAttribute) -> ExternalResult<()> {
        if name.is_empty() || name.len() > MAX_ATTRIBUTE_NAME_LENGTH {
            return Err(ExternalError::Rejected(format!(
                "invalid attribute name '{}'",
                name
            )));
        }
        if RESERVED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return Err(ExternalError::Rejected(format!(
                "attribute name '{}' uses a reserved prefix",
                name
            )));
        }
        if attribute.value.is_empty() {
            return Err(ExternalError::Rejected(format!(
                "attribute '{}' has an empty value",
                name
            )));
        }

        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = attribute,
            None => {
                if self.attributes.len() >= MAX_ATTRIBUTES {
                    return Err(ExternalError::Rejected(format!(
                        "attribute limit of {} reached",
                        MAX_ATTRIBUTES
                    )));
                }
                self.attributes.push((name.to_string(), attribute));
            }
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&MessageAttribute> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn attributes(&self) -> &[(String, MessageAttribute)] {
        &self.attributes
    }
}

/// A subscribe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub topic_arn: String,
    /// Delivery protocol, e.g. `sqs`, `https`, `lambda`
    pub protocol: String,
    /// Protocol-specific endpoint (queue ARN, URL, ...)
    pub endpoint: String,
}

/// A notification delivered through a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message_id: String,
    pub topic_arn: String,
    pub subscription_arn: String,
    pub message: String,
    pub attributes: Vec<(String, MessageAttribute)>,
    pub timestamp: SystemTime,
}

/// Opens notification clients
#[async_trait]
pub trait NotificationConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> ExternalResult<Arc<dyn NotificationClient>>;
}

#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn topic_exists(&self, topic_arn: &str) -> ExternalResult<bool>;

    /// Publish a message, returning the assigned message id
    async fn publish(&self, request: PublishRequest) -> ExternalResult<String>;

    /// Subscribe, returning the subscription ARN
    async fn subscribe(
        &self,
        request: SubscribeRequest,
        listener: Arc<dyn NotificationListener>,
    ) -> ExternalResult<String>;

    async fn unsubscribe(&self, subscription_arn: &str) -> ExternalResult<()>;

    async fn close(&self) -> ExternalResult<()>;
}

/// Receives notifications; `Ok` acknowledges
#[async_trait]
pub trait NotificationListener: Send + Sync {
    async fn on_notification(&self, notification: Notification) -> ExternalResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_limits() {
        let mut request = PublishRequest::new("arn:topic", "body");
        assert!(request
            .set_attribute("AWS.Trace", MessageAttribute::string("x"))
            .is_err());
        assert!(request
            .set_attribute("empty", MessageAttribute::string(""))
            .is_err());

        for i in 0..MAX_ATTRIBUTES {
            request
                .set_attribute(&format!("a{}", i), MessageAttribute::number(i.to_string()))
                .unwrap();
        }
        assert!(request
            .set_attribute("overflow", MessageAttribute::string("x"))
            .is_err());
        // Replacing an existing attribute does not count against the limit
        assert!(request
            .set_attribute("a0", MessageAttribute::string("y"))
            .is_ok());
        assert_eq!(request.attributes().len(), MAX_ATTRIBUTES);
    }
}
