//! Broker message <-> notification publish/delivery
//!
//! Notifications carry a text body and string-valued attributes declared as
//! either `String` or `Number`. Numeric kinds become `Number` attributes,
//! strings become `String` attributes, and anything else falls back to its
//! string form.

use super::PropertyTable;
use crate::error::{BridgeError, Result};
use crate::external::notification::{MessageAttribute, Notification, PublishRequest};
use crate::external::ExternalResult;
use crate::message::{parse_value, Message, PropertyMap, TypedValue, ValueKind};

fn set_string(r: &mut PublishRequest, name: &str, value: &TypedValue) -> ExternalResult<()> {
    r.set_attribute(name, MessageAttribute::string(value.to_string()))
}

fn set_number(r: &mut PublishRequest, name: &str, value: &TypedValue) -> ExternalResult<()> {
    r.set_attribute(name, MessageAttribute::number(value.to_string()))
}

fn set_text(r: &mut PublishRequest, name: &str, value: &str) -> ExternalResult<()> {
    r.set_attribute(name, MessageAttribute::string(value))
}

pub static ATTRIBUTES: PropertyTable<PublishRequest> = PropertyTable::new(
    &[
        (ValueKind::String, set_string),
        (ValueKind::Byte, set_number),
        (ValueKind::Int16, set_number),
        (ValueKind::Int32, set_number),
        (ValueKind::Int64, set_number),
        (ValueKind::Float32, set_number),
        (ValueKind::Float64, set_number),
    ],
    Some(set_text),
);

/// Build the publish request for `topic_arn`. The body must be UTF-8 text.
pub fn encode(bridge: &str, topic_arn: &str, message: &Message) -> Result<PublishRequest> {
    let body = std::str::from_utf8(message.payload()).map_err(|e| {
        BridgeError::Translation(format!("payload is not valid UTF-8 text: {}", e))
    })?;

    let mut request = PublishRequest::new(topic_arn, body);
    ATTRIBUTES.apply(&mut request, message.properties(), bridge);
    Ok(request)
}

pub fn decode(notification: &Notification) -> Message {
    let properties: PropertyMap = notification
        .attributes
        .iter()
        .map(|(name, attribute)| (name.as_str(), parse_value(&attribute.value)))
        .collect();

    Message::builder(notification.message.clone())
        .properties(properties)
        .creation(notification.timestamp)
        .build()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::external::notification::AttributeType;

    #[test]
    fn test_encode_attribute_types() {
        let message = Message::builder("hello")
            .property("qty", 3i32)
            .property("ratio", 0.5f32)
            .property("express", true)
            .property("region", "eu")
            .build();

        let request = encode("sns", "arn:orders", &message).unwrap();
        assert_eq!(request.topic_arn, "arn:orders");
        assert_eq!(request.message, "hello");
        assert_eq!(request.attribute("qty"), Some(&MessageAttribute::number("3")));
        assert_eq!(request.attribute("ratio"), Some(&MessageAttribute::number("0.5")));
        assert_eq!(
            request.attribute("express").map(|a| a.data_type),
            Some(AttributeType::String)
        );
        assert_eq!(request.attribute("region"), Some(&MessageAttribute::string("eu")));
    }

    #[test]
    fn test_encode_rejects_binary_payload() {
        let message = Message::from_payload(&[0xff, 0xfe, 0x00][..]);
        let result = encode("sns", "arn:orders", &message);
        assert!(matches!(result, Err(BridgeError::Translation(_))));
    }

    #[test]
    fn test_encode_skips_reserved_attribute() {
        let message = Message::builder("x")
            .property("AWS.Trace", "t")
            .property("qty", 1i32)
            .build();

        let request = encode("sns", "arn:orders", &message).unwrap();
        assert_eq!(request.attributes().len(), 1);
        assert!(request.attribute("AWS.Trace").is_none());
    }

    #[test]
    fn test_decode_parses_attributes() {
        let timestamp = SystemTime::now();
        let notification = Notification {
            message_id: "m-1".to_string(),
            topic_arn: "arn:orders".to_string(),
            subscription_arn: "arn:orders:1".to_string(),
            message: "body".to_string(),
            attributes: vec![
                ("qty".to_string(), MessageAttribute::number("3")),
                ("express".to_string(), MessageAttribute::string("true")),
                ("region".to_string(), MessageAttribute::string("eu")),
            ],
            timestamp,
        };

        let decoded = decode(&notification);
        assert_eq!(decoded.payload().as_ref(), b"body");
        assert_eq!(decoded.creation(), Some(timestamp));
        assert_eq!(decoded.properties().get("qty"), Some(&TypedValue::Int32(3)));
        assert_eq!(
            decoded.properties().get("express"),
            Some(&TypedValue::Boolean(true))
        );
        assert_eq!(
            decoded.properties().get("region"),
            Some(&TypedValue::from("eu"))
        );
    }
}
