//! Time sources for the engine
//!
//! The scheduler works in plain milliseconds; where they come from is a
//! [`Clock`]. Tests drive a [`ManualClock`] forward by hand, the browser
//! backend reads `performance.now()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic millisecond source
pub trait Clock {
    /// Current time in milliseconds
    fn now_ms(&self) -> u64;
}

/// Test-controlled clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock starting at `time_ms`
    #[must_use]
    pub fn new(time_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(time_ms)),
        }
    }

    /// Fast-forward time by duration
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    /// Fast-forward time by milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, time_ms: u64) {
        self.current_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

/// High-resolution page clock (`performance.now()`)
#[cfg(all(feature = "web", target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceClock;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
impl Clock for PerformanceClock {
    fn now_ms(&self) -> u64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or(0.0)
            .max(0.0) as u64
    }
}
