//! Push registration gate
//!
//! Listeners registered with an external client keep running on the
//! client's own tasks. Closing the registration shuts the gate first, so a
//! listener invoked after close returns without touching the broker and
//! without acknowledging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owned by the bridge; closing it stops all of its listeners
#[derive(Debug)]
pub struct PushRegistration {
    open: Arc<AtomicBool>,
}

/// Cheap handle checked by listeners before every delivery
#[derive(Debug, Clone)]
pub struct PushGate {
    open: Arc<AtomicBool>,
}

impl PushRegistration {
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn gate(&self) -> PushGate {
        PushGate {
            open: self.open.clone(),
        }
    }

    /// Close the gate. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        self.open.swap(false, Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Default for PushRegistration {
    fn default() -> Self {
        Self::new()
    }
}

impl PushGate {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
