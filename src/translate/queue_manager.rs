//! Broker message <-> queue-manager message
//!
//! The queue manager stores typed properties natively, so every value kind
//! has a dedicated setter and no fallback is needed. Byte-array properties
//! have no broker counterpart and are dropped on the way in.

use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::PropertyTable;
use crate::bridge::PROTOCOL_TARGET;
use crate::external::queue_manager::{MqMessage, MqProperty};
use crate::external::{ExternalError, ExternalResult};
use crate::message::{Message, PropertyMap, TypedValue, ValueKind};

fn set_string(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::String(v) => m.set_string_property(name, v),
        other => mismatch(other),
    }
}

fn set_boolean(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Boolean(v) => m.set_boolean_property(name, *v),
        other => mismatch(other),
    }
}

fn set_byte(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Byte(v) => m.set_byte_property(name, *v),
        other => mismatch(other),
    }
}

fn set_short(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Int16(v) => m.set_short_property(name, *v),
        other => mismatch(other),
    }
}

fn set_int(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Int32(v) => m.set_int_property(name, *v),
        other => mismatch(other),
    }
}

fn set_long(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Int64(v) => m.set_long_property(name, *v),
        other => mismatch(other),
    }
}

fn set_float(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Float32(v) => m.set_float_property(name, *v),
        other => mismatch(other),
    }
}

fn set_double(m: &mut MqMessage, name: &str, value: &TypedValue) -> ExternalResult<()> {
    match value {
        TypedValue::Float64(v) => m.set_double_property(name, *v),
        other => mismatch(other),
    }
}

fn mismatch(value: &TypedValue) -> ExternalResult<()> {
    Err(ExternalError::Other(format!(
        "setter called with {} value",
        value.kind()
    )))
}

pub static PROPERTIES: PropertyTable<MqMessage> = PropertyTable::new(
    &[
        (ValueKind::String, set_string),
        (ValueKind::Boolean, set_boolean),
        (ValueKind::Byte, set_byte),
        (ValueKind::Int16, set_short),
        (ValueKind::Int32, set_int),
        (ValueKind::Int64, set_long),
        (ValueKind::Float32, set_float),
        (ValueKind::Float64, set_double),
    ],
    None,
);

/// Build the queue-manager message for an outbound send
pub fn encode(bridge: &str, message: &Message) -> MqMessage {
    let mut native = MqMessage::new(message.payload().clone());

    if let Some(id) = message.correlation_id() {
        if let Err(e) = native.set_correlation_id(id.clone()) {
            warn!(
                target: PROTOCOL_TARGET,
                "Bridge '{}': Correlation id not carried: {}", bridge, e
            );
        }
    }

    native.format = message.content_type().map(str::to_string);
    native.expiry = message.expiry().map(|expiry| {
        expiry
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    });

    PROPERTIES.apply(&mut native, message.properties(), bridge);
    native
}

/// Build the broker message for a message taken from an input queue
pub fn decode(bridge: &str, native: MqMessage) -> Message {
    let mut properties = PropertyMap::new();
    for (name, value) in native.properties() {
        let value = match value {
            MqProperty::String(v) => TypedValue::String(v.clone()),
            MqProperty::Boolean(v) => TypedValue::Boolean(*v),
            MqProperty::Byte(v) => TypedValue::Byte(*v),
            MqProperty::Short(v) => TypedValue::Int16(*v),
            MqProperty::Int(v) => TypedValue::Int32(*v),
            MqProperty::Long(v) => TypedValue::Int64(*v),
            MqProperty::Float(v) => TypedValue::Float32(*v),
            MqProperty::Double(v) => TypedValue::Float64(*v),
            MqProperty::Bytes(_) => {
                debug!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Byte-array property '{}' dropped", bridge, name
                );
                continue;
            }
        };
        properties.insert(name, value);
    }

    let mut builder = Message::builder(native.payload.clone()).properties(properties);
    if let Some(id) = native.correlation_id() {
        builder = builder.correlation_id(id.clone());
    }
    if let Some(format) = native.format.as_deref().filter(|f| !f.trim().is_empty()) {
        builder = builder.content_type(format.trim());
    }
    if let Some(put_time) = native.put_time {
        builder = builder.creation(put_time);
        if let Some(expiry) = native.expiry {
            builder = builder.expiry(put_time + expiry);
        }
    }
    builder.build()
}
