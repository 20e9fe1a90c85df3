//! Bridge Adapters
//!
//! One [`ExternalBridge`](crate::bridge::ExternalBridge) implementation per
//! external system. The queue manager is polled; the notification service
//! and the pub/sub log push messages to listeners.

mod notification;
mod pubsub;
mod queue_manager;

pub use notification::{
    NotificationBridge, SubscriptionHandle, TopicHandle, SUBSCRIPTION_ENDPOINT_OPTION,
    SUBSCRIPTION_PROTOCOL_OPTION, TOPIC_ARN_OPTION,
};
pub use pubsub::{PubSubBridge, SUBSCRIPTION_NAME_OPTION};
pub use queue_manager::{QueueManagerBridge, QUEUE_MANAGER_OPTION};
