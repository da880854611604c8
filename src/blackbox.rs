//! Blackbox collaborator signalling
//!
//! The CSV session logger lives outside the core; the controller only
//! signals it. The surface is two booleans and a snapshot: "logging
//! enabled", "a new entry is available", and the position/platform state the
//! entry should record. The logger polls [`Blackbox::take_entry`] at its own
//! pace; entries it does not collect in time are overwritten, never queued.

use crate::state::{PlatformSnapshot, PositionSnapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One loggable entry
#[derive(Debug, Clone)]
pub struct BlackboxEntry {
    pub position: PositionSnapshot,
    pub platform: PlatformSnapshot,
}

/// Signal surface between the controller and the external logger
#[derive(Default)]
pub struct Blackbox {
    enabled: AtomicBool,
    new_entry: AtomicBool,
    entry: Mutex<Option<BlackboxEntry>>,
}

impl Blackbox {
    /// Create a disabled blackbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable logging
    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::Relaxed) != enabled {
            log::info!("Blackbox {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    /// Current logging state
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Publish a new entry; no-op while disabled
    pub fn push_entry(&self, entry: BlackboxEntry) {
        if !self.is_enabled() {
            return;
        }
        *self.entry.lock() = Some(entry);
        self.new_entry.store(true, Ordering::Release);
    }

    /// True when an uncollected entry is pending
    pub fn has_new_entry(&self) -> bool {
        self.new_entry.load(Ordering::Acquire)
    }

    /// Collect the pending entry, clearing the new-entry flag
    pub fn take_entry(&self) -> Option<BlackboxEntry> {
        if !self.new_entry.swap(false, Ordering::AcqRel) {
            return None;
        }
        self.entry.lock().take()
    }
}
