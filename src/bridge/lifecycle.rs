//! Bridge lifecycle state machine
//!
//! `Created → Initialising → Active → Closing → Closed`. Close may start from
//! any state except `Closing` and `Closed`; a close that starts during
//! initialise wins and the pending activation is refused.

use std::fmt;

use parking_lot::Mutex;

/// Lifecycle state of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Created,
    Initialising,
    Active,
    Closing,
    Closed,
}

impl BridgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeState::Created => "created",
            BridgeState::Initialising => "initialising",
            BridgeState::Active => "active",
            BridgeState::Closing => "closing",
            BridgeState::Closed => "closed",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<BridgeState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState::Created),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == BridgeState::Active
    }

    /// `Created → Initialising`. Returns the current state on refusal.
    pub fn begin_initialise(&self) -> Result<(), BridgeState> {
        let mut state = self.state.lock();
        match *state {
            BridgeState::Created => {
                *state = BridgeState::Initialising;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// `Initialising → Active`. False if a close got there first.
    pub fn activate(&self) -> bool {
        let mut state = self.state.lock();
        if *state == BridgeState::Initialising {
            *state = BridgeState::Active;
            true
        } else {
            false
        }
    }

    /// Enter `Closing`, returning the state it left. `None` when already closing or closed.
    pub fn begin_close(&self) -> Option<BridgeState> {
        let mut state = self.state.lock();
        match *state {
            BridgeState::Closing | BridgeState::Closed => None,
            previous => {
                *state = BridgeState::Closing;
                Some(previous)
            }
        }
    }

    pub fn finish_close(&self) {
        *self.state.lock() = BridgeState::Closed;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), BridgeState::Created);
        assert!(lifecycle.begin_initialise().is_ok());
        assert!(lifecycle.activate());
        assert!(lifecycle.is_active());
        assert_eq!(lifecycle.begin_close(), Some(BridgeState::Active));
        lifecycle.finish_close();
        assert_eq!(lifecycle.state(), BridgeState::Closed);
    }

    #[test]
    fn test_initialise_only_from_created() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_initialise().unwrap();
        assert_eq!(
            lifecycle.begin_initialise(),
            Err(BridgeState::Initialising)
        );

        lifecycle.activate();
        assert_eq!(lifecycle.begin_initialise(), Err(BridgeState::Active));
    }

    #[test]
    fn test_close_during_initialise_refuses_activation() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_initialise().unwrap();
        assert_eq!(lifecycle.begin_close(), Some(BridgeState::Initialising));
        assert!(!lifecycle.activate());
        lifecycle.finish_close();
        assert_eq!(lifecycle.state(), BridgeState::Closed);
    }

    #[test]
    fn test_second_close_is_refused() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.begin_close(), Some(BridgeState::Created));
        assert_eq!(lifecycle.begin_close(), None);
        lifecycle.finish_close();
        assert_eq!(lifecycle.begin_close(), None);
        assert!(lifecycle.begin_initialise().is_err());
    }
}
