//! Ctrl-C handling: the first interrupt cancels the batch, the second
//! abandons it.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop launching conversions and wait for the running ones to wind down.
    Cancel,
    /// Exit immediately.
    Abort,
}

#[derive(Debug, Default)]
pub struct InterruptState {
    count: AtomicUsize,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one interrupt and says what to do about it.
    pub fn record(&self) -> InterruptAction {
        match self.count.fetch_add(1, Ordering::SeqCst) {
            0 => InterruptAction::Cancel,
            _ => InterruptAction::Abort,
        }
    }
}
