//! Conversation session state shared between the worker and the controlling thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phase of the conversation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listening passively until the wake phrase is heard
    AwaitingWakeWord,
    /// Every utterance is handled as a request
    Active,
    /// Absorbing; no further captures are issued
    Terminated,
}

/// Cross-thread stop request
///
/// Cloning shares the underlying flag. Writes use `Release` and reads use
/// `Acquire` so a request made on one thread is seen by the other at its next
/// check.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal in the "running" state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Per-process session state owned by the conversation controller
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    stop: StopSignal,
}

impl SessionState {
    /// Create session state
    ///
    /// Starts in [`Phase::AwaitingWakeWord`] when a wake phrase is in use,
    /// otherwise directly in [`Phase::Active`].
    #[must_use]
    pub const fn new(requires_wake_word: bool, stop: StopSignal) -> Self {
        let phase = if requires_wake_word {
            Phase::AwaitingWakeWord
        } else {
            Phase::Active
        };
        Self { phase, stop }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the controller is still waiting for the wake phrase
    #[must_use]
    pub fn awaiting_wake_word(&self) -> bool {
        self.phase == Phase::AwaitingWakeWord
    }

    /// Whether a stop has been requested from any thread
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    /// Handle to the shared stop flag
    #[must_use]
    pub const fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Move from waiting to active
    pub fn activate(&mut self) {
        if self.phase == Phase::AwaitingWakeWord {
            self.phase = Phase::Active;
        }
    }

    /// Request a stop and enter the terminal phase
    pub fn terminate(&mut self) {
        self.stop.request();
        self.phase = Phase::Terminated;
    }
}
