//! Scan cadence and work caps
//!
//! The engine has no user-facing configuration. These values exist as a
//! struct so the browser backend and tests construct the engine the same
//! way; the defaults are what ships. Classification thresholds and keyword
//! sets are constants in `classifier` and `analyzer` and are not here.

use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Quiet period after the last scroll/resize before a reactive scan (2s)
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// Interval of the unconditional re-scan (5s)
pub const DEFAULT_PERIODIC_MS: u64 = 5_000;

/// Delay before an overridden element is also removed (100ms)
pub const DEFAULT_DEFERRED_REMOVAL_MS: u64 = 100;

/// Elements classified per full-document scan
pub const DEFAULT_SCAN_CAP: usize = 5_000;

/// Descendants classified per inserted subtree
pub const DEFAULT_DESCENDANT_CAP: usize = 100;

/// Cadence and caps for one engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepTimings {
    /// Reactive scan debounce
    pub debounce_ms: u64,
    /// Periodic scan interval
    pub periodic_ms: u64,
    /// Fallback removal delay after a style override
    pub deferred_removal_ms: u64,
    /// Full-scan element cap
    pub scan_cap: usize,
    /// Inserted-subtree descendant cap
    pub descendant_cap: usize,
}

impl Default for SweepTimings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            periodic_ms: DEFAULT_PERIODIC_MS,
            deferred_removal_ms: DEFAULT_DEFERRED_REMOVAL_MS,
            scan_cap: DEFAULT_SCAN_CAP,
            descendant_cap: DEFAULT_DESCENDANT_CAP,
        }
    }
}

impl SweepTimings {
    /// Shipping defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reactive scan debounce
    #[must_use]
    pub const fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the periodic scan interval
    #[must_use]
    pub const fn with_periodic_ms(mut self, ms: u64) -> Self {
        self.periodic_ms = ms;
        self
    }

    /// Set the deferred removal delay
    #[must_use]
    pub const fn with_deferred_removal_ms(mut self, ms: u64) -> Self {
        self.deferred_removal_ms = ms;
        self
    }

    /// Set the full-scan cap
    #[must_use]
    pub const fn with_scan_cap(mut self, cap: usize) -> Self {
        self.scan_cap = cap;
        self
    }

    /// Set the descendant cap
    #[must_use]
    pub const fn with_descendant_cap(mut self, cap: usize) -> Self {
        self.descendant_cap = cap;
        self
    }
}
