//! Sweep Engine
//!
//! Owns the per-document state (tracked set, pending tasks, counters) and
//! exposes one entry point per host event. The host backend translates
//! browser events into these calls and keeps a single timer aimed at
//! [`Engine::next_deadline`]; tests drive the same calls with a
//! [`crate::mock::MockDom`] and a [`crate::clock::ManualClock`].
//!
//! ```text
//! inject_styles ─► start(ready) ──► on_ready ──► full scan
//!                     │
//!                     └─► PeriodicScan (every 5s) ─┐
//! on_viewport_change ─► ReactiveScan (2s quiet) ───┼─► run_due ─► full scan
//! neutralize (override) ─► DeferredRemoval (100ms) ┘           └► removal
//! on_mutations ─► MutationWatcher ─► classify/neutralize ─► unlock
//! on_interaction ─► unlock
//! ```

use crate::clock::Clock;
use crate::config::SweepTimings;
use crate::dom::{Dom, Mutation};
use crate::neutralizer::{complete_deferred_removal, sweep_node, Neutralization, SweepContext};
use crate::scheduler::{Scheduler, TaskKey};
use crate::style::inject_style_overrides;
use crate::tracked::TrackedSet;
use crate::unlock::{unlock_scroll, UnlockReport};
use crate::watcher::{BatchOutcome, MutationWatcher};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STATS
// =============================================================================

/// Running counters for one engine instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Style override injections that succeeded
    pub style_injections: u64,
    /// Full-document scans
    pub scans: u64,
    /// Unlock passes from any trigger
    pub unlocks: u64,
    /// Unlock passes triggered by user input
    pub interaction_unlocks: u64,
    /// Mutation batches processed
    pub mutation_batches: u64,
    /// Mutation records processed
    pub mutation_records: u64,
    /// Classifier invocations
    pub classified: u64,
    /// Elements removed outright
    pub removed: u64,
    /// Elements hidden by style override
    pub overridden: u64,
    /// Deferred removals that found the element still attached
    pub deferred_removals: u64,
}

impl SweepStats {
    /// Elements neutralized so far
    #[must_use]
    pub const fn neutralized(&self) -> u64 {
        self.removed + self.overridden
    }

    /// Export as JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn count(&mut self, action: Option<Neutralization>) {
        self.classified += 1;
        match action {
            Some(Neutralization::Removed) => self.removed += 1,
            Some(Neutralization::Overridden) => self.overridden += 1,
            Some(Neutralization::AlreadyTracked) | None => {}
        }
    }
}

/// Result of one full-document scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Elements classified
    pub classified: usize,
    /// Elements removed outright
    pub removed: usize,
    /// Elements hidden by style override
    pub overridden: usize,
    /// Unlock pass run before classification
    pub unlock: UnlockReport,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Overlay sweep engine for one document
pub struct Engine<D: Dom, C: Clock> {
    dom: D,
    clock: C,
    timings: SweepTimings,
    watcher: MutationWatcher,
    tracked: TrackedSet<D::Node>,
    scheduler: Scheduler<D::Node>,
    stats: SweepStats,
    started: bool,
    initial_scan_done: bool,
}

impl<D: Dom, C: Clock> fmt::Debug for Engine<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("timings", &self.timings)
            .field("tracked", &self.tracked)
            .field("scheduler", &self.scheduler)
            .field("stats", &self.stats)
            .field("started", &self.started)
            .field("initial_scan_done", &self.initial_scan_done)
            .finish_non_exhaustive()
    }
}

impl<D: Dom, C: Clock> Engine<D, C> {
    /// Engine with the shipping cadence
    pub fn new(dom: D, clock: C) -> Self {
        Self::with_timings(dom, clock, SweepTimings::default())
    }

    /// Engine with explicit cadence and caps
    pub fn with_timings(dom: D, clock: C, timings: SweepTimings) -> Self {
        Self {
            dom,
            clock,
            timings,
            watcher: MutationWatcher::new(timings.descendant_cap),
            tracked: TrackedSet::new(),
            scheduler: Scheduler::new(),
            stats: SweepStats::default(),
            started: false,
            initial_scan_done: false,
        }
    }

    /// Host document
    pub const fn dom(&self) -> &D {
        &self.dom
    }

    /// Elements neutralized so far
    pub const fn tracked(&self) -> &TrackedSet<D::Node> {
        &self.tracked
    }

    /// Pending deferred work
    pub const fn scheduler(&self) -> &Scheduler<D::Node> {
        &self.scheduler
    }

    /// Running counters
    pub const fn stats(&self) -> &SweepStats {
        &self.stats
    }

    /// Cadence and caps in use
    pub const fn timings(&self) -> &SweepTimings {
        &self.timings
    }

    /// Earliest time [`Engine::run_due`] has work, in clock milliseconds
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    /// Insert or replace the style override sheet; `false` if the host
    /// refused it
    pub fn inject_styles(&mut self) -> bool {
        match inject_style_overrides(&self.dom) {
            Ok(()) => {
                self.stats.style_injections += 1;
                true
            }
            Err(err) => {
                tracing::trace!(%err, "style injection failed");
                false
            }
        }
    }

    /// Activate: inject styles, arm the periodic scan and run the initial
    /// scan now if the document is already parsed. Later calls do nothing.
    pub fn start(&mut self, ready: bool) {
        if self.started {
            return;
        }
        self.started = true;
        self.inject_styles();
        let now = self.clock.now_ms();
        self.scheduler
            .schedule_repeating(TaskKey::PeriodicScan, now, self.timings.periodic_ms);
        tracing::debug!(ready, periodic_ms = self.timings.periodic_ms, "engine started");
        if ready {
            self.on_ready();
        }
    }

    /// Structural-ready signal; runs the initial scan at most once
    pub fn on_ready(&mut self) -> Option<ScanReport> {
        if self.initial_scan_done {
            return None;
        }
        self.initial_scan_done = true;
        Some(self.full_scan())
    }

    /// Scroll or resize; (re)starts the debounce for a reactive scan
    pub fn on_viewport_change(&mut self) {
        let now = self.clock.now_ms();
        self.scheduler
            .reset(TaskKey::ReactiveScan, now, self.timings.debounce_ms);
    }

    /// Click, keydown or touchstart; re-applies the unlock only
    pub fn on_interaction(&mut self) -> UnlockReport {
        self.stats.interaction_unlocks += 1;
        self.unlock()
    }

    /// One batch from the host mutation observer
    pub fn on_mutations(&mut self, records: &[Mutation<D::Node>]) -> BatchOutcome {
        let now = self.clock.now_ms();
        let mut ctx = SweepContext {
            dom: &self.dom,
            tracked: &mut self.tracked,
            scheduler: &mut self.scheduler,
            now_ms: now,
            timings: &self.timings,
        };
        let outcome = self.watcher.process(&mut ctx, records);

        self.stats.mutation_batches += 1;
        self.stats.mutation_records += outcome.records as u64;
        self.stats.classified += outcome.classified as u64;
        self.stats.removed += outcome.removed as u64;
        self.stats.overridden += outcome.overridden as u64;
        if outcome.unlock.is_some() {
            self.stats.unlocks += 1;
        }
        outcome
    }

    /// Fire every task due on the clock. Due reactive and periodic scans
    /// collapse into one full scan. Returns the number of tasks fired.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now_ms();
        let due = self.scheduler.take_due(now);
        let mut scan = false;

        for key in &due {
            match key {
                TaskKey::DeferredRemoval(node) => {
                    if complete_deferred_removal(&self.dom, node) {
                        self.stats.deferred_removals += 1;
                    }
                }
                TaskKey::ReactiveScan | TaskKey::PeriodicScan => scan = true,
            }
        }
        if scan {
            self.full_scan();
        }
        due.len()
    }

    /// Unlock, then classify and neutralize up to `scan_cap` elements in
    /// document order
    pub fn full_scan(&mut self) -> ScanReport {
        let mut report = ScanReport {
            unlock: self.unlock(),
            ..ScanReport::default()
        };

        let elements = match self.dom.elements(self.timings.scan_cap) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::trace!(%err, "element enumeration failed");
                Vec::new()
            }
        };

        let now = self.clock.now_ms();
        let mut ctx = SweepContext {
            dom: &self.dom,
            tracked: &mut self.tracked,
            scheduler: &mut self.scheduler,
            now_ms: now,
            timings: &self.timings,
        };
        for node in elements.iter().take(self.timings.scan_cap) {
            let action = sweep_node(&mut ctx, node).map(|(_, action)| action);
            report.classified += 1;
            match action {
                Some(Neutralization::Removed) => report.removed += 1,
                Some(Neutralization::Overridden) => report.overridden += 1,
                Some(Neutralization::AlreadyTracked) | None => {}
            }
            self.stats.count(action);
        }

        self.stats.scans += 1;
        tracing::debug!(
            classified = report.classified,
            removed = report.removed,
            overridden = report.overridden,
            "full scan complete"
        );
        report
    }

    fn unlock(&mut self) -> UnlockReport {
        self.stats.unlocks += 1;
        unlock_scroll(&self.dom)
    }
}
