//! Broker message <-> pub/sub log message
//!
//! The log carries string properties only: every typed value is written as
//! its string representation and parsed back heuristically. Correlation id,
//! content type and expiry have no slot and are not carried; the creation
//! timestamp travels as the event time.

use super::PropertyTable;
use crate::external::pubsub::{OutgoingMessage, PubSubMessage};
use crate::external::ExternalResult;
use crate::message::{parse_properties, Message};

fn set_property(m: &mut OutgoingMessage, name: &str, value: &str) -> ExternalResult<()> {
    m.set_property(name, value)
}

pub static PROPERTIES: PropertyTable<OutgoingMessage> = PropertyTable::new(&[], Some(set_property));

pub fn encode(bridge: &str, message: &Message) -> OutgoingMessage {
    let mut native = OutgoingMessage::new(message.payload().clone());
    native.event_time = message.creation();
    PROPERTIES.apply(&mut native, message.properties(), bridge);
    native
}

pub fn decode(native: &PubSubMessage) -> Message {
    let mut builder = Message::builder(native.data.clone())
        .properties(parse_properties(native.properties.iter().map(|(k, v)| (k.as_str(), v))));
    if let Some(event_time) = native.event_time {
        builder = builder.creation(event_time);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::external::pubsub::MessageId;
    use crate::message::{PropertyMap, TypedValue};

    #[test]
    fn test_encode_stringifies_properties() {
        let message = Message::builder("payload")
            .property("qty", 3i32)
            .property("price", 2.0f64)
            .property("express", true)
            .property("sku", "A-1")
            .correlation_id(&b"ignored"[..])
            .build();

        let native = encode("pulsar", &message);
        assert_eq!(native.data.as_ref(), b"payload");
        assert_eq!(native.property("qty"), Some("3"));
        assert_eq!(native.property("price"), Some("2.0"));
        assert_eq!(native.property("express"), Some("true"));
        assert_eq!(native.property("sku"), Some("A-1"));
    }

    #[test]
    fn test_decode_parses_properties() {
        let now = SystemTime::now();
        let native = PubSubMessage {
            id: MessageId(1),
            topic: "persistent://public/default/orders".to_string(),
            data: Bytes::from_static(b"body"),
            properties: vec![
                ("qty".to_string(), "3".to_string()),
                ("express".to_string(), "TRUE".to_string()),
                ("price".to_string(), "2.5".to_string()),
                ("sku".to_string(), "A-1".to_string()),
            ],
            event_time: Some(now),
            redelivery_count: 0,
        };

        let decoded = decode(&native);
        let expected: PropertyMap = [
            ("qty", TypedValue::Int32(3)),
            ("express", TypedValue::Boolean(true)),
            ("price", TypedValue::Float64(2.5)),
            ("sku", TypedValue::from("A-1")),
        ]
        .into_iter()
        .collect();

        assert_eq!(decoded.properties(), &expected);
        assert_eq!(decoded.creation(), Some(now));
        assert_eq!(decoded.payload().as_ref(), b"body");
    }
}
