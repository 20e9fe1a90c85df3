//! VibeLink - External messaging bridges for a message broker
//!
//! Connects the broker's local destinations to a notification fan-out
//! service, a queue manager and a pub/sub log. Each bridge owns one external
//! connection, a set of named links and the translation between the broker's
//! typed message properties and the external system's native ones.

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod destination;
pub mod error;
pub mod external;
pub mod ingest;
pub mod message;
pub mod metrics;
pub mod translate;

pub use adapters::{NotificationBridge, PubSubBridge, QueueManagerBridge};
pub use bridge::{
    BridgeContext, BridgeFactory, BridgeManager, BridgeState, ExternalBridge, InboundSink,
};
pub use config::{BridgeConfig, BridgeKind, Config};
pub use error::{BridgeError, Result};
pub use ingest::{ManualScheduler, Scheduler, TokioScheduler};
pub use message::{Message, PropertyMap, TypedValue};
pub use metrics::{Metrics, MetricsServer};
