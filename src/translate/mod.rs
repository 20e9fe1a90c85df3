//! Message Translation
//!
//! Converts broker [`Message`](crate::message::Message)s to the native model of
//! each external system and back. Property mapping is table driven: every
//! system declares a [`PropertyTable`] from value kind to native setter, with
//! an optional string fallback for kinds it has no setter for.

pub mod notification;
pub mod pubsub;
pub mod queue_manager;

use tracing::debug;

use crate::bridge::PROTOCOL_TARGET;
use crate::external::ExternalResult;
use crate::message::{PropertyMap, TypedValue, ValueKind};

/// Native setter for one value kind
pub type Setter<T> = fn(&mut T, &str, &TypedValue) -> ExternalResult<()>;

/// Setter taking the string representation of any value
pub type Fallback<T> = fn(&mut T, &str, &str) -> ExternalResult<()>;

/// Maps typed properties onto a native message
pub struct PropertyTable<T: 'static> {
    setters: &'static [(ValueKind, Setter<T>)],
    fallback: Option<Fallback<T>>,
}

impl<T: 'static> PropertyTable<T> {
    pub const fn new(
        setters: &'static [(ValueKind, Setter<T>)],
        fallback: Option<Fallback<T>>,
    ) -> Self {
        Self { setters, fallback }
    }

    fn setter(&self, kind: ValueKind) -> Option<Setter<T>> {
        self.setters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, setter)| *setter)
    }

    /// Apply every property to `target`, returning how many were set.
    ///
    /// Properties the external API rejects, or that have neither a setter nor
    /// a fallback, are skipped.
    pub fn apply(&self, target: &mut T, properties: &PropertyMap, bridge: &str) -> usize {
        let mut applied = 0;

        for (name, value) in properties.iter() {
            let result = match (self.setter(value.kind()), self.fallback) {
                (Some(setter), _) => setter(target, name, value),
                (None, Some(fallback)) => fallback(target, name, &value.to_string()),
                (None, None) => {
                    debug!(
                        target: PROTOCOL_TARGET,
                        "Bridge '{}': No mapping for {} property '{}', dropped",
                        bridge,
                        value.kind(),
                        name
                    );
                    continue;
                }
            };

            match result {
                Ok(()) => applied += 1,
                Err(e) => debug!(
                    target: PROTOCOL_TARGET,
                    "Bridge '{}': Property '{}' skipped: {}", bridge, name, e
                ),
            }
        }

        applied
    }
}
