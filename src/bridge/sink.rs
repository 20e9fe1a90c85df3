//! Inbound sink implementations
//!
//! [`ChannelSink`] forwards deliveries to an mpsc channel for a consumer
//! task. [`RecordingSink`] keeps them in memory and can be told to refuse
//! deliveries, which makes the acknowledge-after-hand-off paths observable.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::InboundSink;
use crate::error::{BridgeError, Result};
use crate::message::Message;

/// Sink that forwards every delivery to a channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(String, Message)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, Message)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl InboundSink for ChannelSink {
    async fn inbound(&self, destination: &str, message: Message) -> Result<()> {
        self.tx
            .send((destination.to_string(), message))
            .map_err(|_| BridgeError::Delivery("inbound channel closed".to_string()))
    }
}

/// Sink that records deliveries in memory
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(String, Message)>>,
    refuse: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again)
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<(String, Message)> {
        self.delivered.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().len()
    }
}

#[async_trait]
impl InboundSink for RecordingSink {
    async fn inbound(&self, destination: &str, message: Message) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(BridgeError::Delivery(format!(
                "destination '{}' refused the message",
                destination
            )));
        }
        self.delivered
            .lock()
            .push((destination.to_string(), message));
        Ok(())
    }
}
