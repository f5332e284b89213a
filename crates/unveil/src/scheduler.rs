//! Keyed, cancellable timers
//!
//! The engine never hands closures to the host's timer API. It keeps every
//! pending piece of deferred work here, keyed by what it is for, and the host
//! runs a single timer aimed at [`Scheduler::next_deadline`]. That keeps
//! debounce resets and deferred removals inspectable from tests and
//! independent of any particular event loop.
//!
//! Times are milliseconds on the engine's [`crate::clock::Clock`].

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// What a pending task is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey<N> {
    /// Fallback removal of an element neutralized by style override
    DeferredRemoval(N),
    /// Debounced scan after scroll/resize goes quiet
    ReactiveScan,
    /// Unconditional periodic scan
    PeriodicScan,
}

/// One-shot or repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fires once, then is dropped
    Once,
    /// Fires, then re-arms this many milliseconds after it fired
    Every(u64),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: u64,
    cadence: Cadence,
    seq: u64,
}

/// Pending tasks by key; scheduling an existing key replaces it
pub struct Scheduler<N> {
    tasks: HashMap<TaskKey<N>, Entry>,
    seq: u64,
}

impl<N> Default for Scheduler<N> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
            seq: 0,
        }
    }
}

impl<N> fmt::Debug for Scheduler<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl<N: Clone + Eq + Hash> Scheduler<N> {
    /// Empty scheduler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, key: TaskKey<N>, deadline: u64, cadence: Cadence) {
        self.seq += 1;
        self.tasks.insert(
            key,
            Entry {
                deadline,
                cadence,
                seq: self.seq,
            },
        );
    }

    /// Run `key` once, `delay_ms` after `now`
    pub fn schedule_once(&mut self, key: TaskKey<N>, now: u64, delay_ms: u64) {
        self.insert(key, now.saturating_add(delay_ms), Cadence::Once);
    }

    /// Run `key` every `interval_ms`, first `interval_ms` after `now`
    pub fn schedule_repeating(&mut self, key: TaskKey<N>, now: u64, interval_ms: u64) {
        let interval = interval_ms.max(1);
        self.insert(key, now.saturating_add(interval), Cadence::Every(interval));
    }

    /// Cancel any pending `key` and schedule it again `delay_ms` after `now`
    pub fn reset(&mut self, key: TaskKey<N>, now: u64, delay_ms: u64) {
        self.cancel(&key);
        self.schedule_once(key, now, delay_ms);
    }

    /// Drop a pending task; returns whether one was pending
    pub fn cancel(&mut self, key: &TaskKey<N>) -> bool {
        self.tasks.remove(key).is_some()
    }

    /// Whether `key` is pending
    #[must_use]
    pub fn is_pending(&self, key: &TaskKey<N>) -> bool {
        self.tasks.contains_key(key)
    }

    /// Deadline of a pending task
    #[must_use]
    pub fn deadline(&self, key: &TaskKey<N>) -> Option<u64> {
        self.tasks.get(key).map(|e| e.deadline)
    }

    /// Number of pending tasks
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Earliest pending deadline
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.values().map(|e| e.deadline).min()
    }

    /// Remove and return every task due at `now`, earliest first (ties in
    /// scheduling order). Repeating tasks are re-armed relative to `now`, so
    /// a host that slept through several intervals gets one firing, not a
    /// burst.
    pub fn take_due(&mut self, now: u64) -> Vec<TaskKey<N>> {
        let mut due: Vec<(u64, u64, TaskKey<N>)> = self
            .tasks
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(k, e)| (e.deadline, e.seq, k.clone()))
            .collect();
        due.sort_by_key(|(deadline, seq, _)| (*deadline, *seq));

        for (_, _, key) in &due {
            let cadence = self.tasks.get(key).map(|e| e.cadence);
            match cadence {
                Some(Cadence::Every(interval)) => {
                    self.insert(key.clone(), now.saturating_add(interval), Cadence::Every(interval));
                }
                Some(Cadence::Once) => {
                    self.tasks.remove(key);
                }
                None => {}
            }
        }

        due.into_iter().map(|(_, _, key)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Key = TaskKey<u32>;

    #[test]
    fn test_once_fires_once() {
        let mut s = Scheduler::new();
        s.schedule_once(Key::DeferredRemoval(1), 0, 100);
        assert!(s.take_due(99).is_empty());
        assert_eq!(s.take_due(100), vec![Key::DeferredRemoval(1)]);
        assert!(s.take_due(1_000).is_empty());
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn test_reset_pushes_deadline_back() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.reset(Key::ReactiveScan, 0, 2_000);
        s.reset(Key::ReactiveScan, 1_500, 2_000);
        s.reset(Key::ReactiveScan, 3_000, 2_000);
        assert_eq!(s.pending_count(), 1);
        assert!(s.take_due(4_999).is_empty());
        assert_eq!(s.take_due(5_000), vec![Key::ReactiveScan]);
    }

    #[test]
    fn test_repeating_rearms_from_now() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.schedule_repeating(Key::PeriodicScan, 0, 5_000);
        assert_eq!(s.deadline(&Key::PeriodicScan), Some(5_000));
        assert_eq!(s.take_due(5_000), vec![Key::PeriodicScan]);
        assert_eq!(s.deadline(&Key::PeriodicScan), Some(10_000));

        // Slept through three intervals: one firing, re-armed from now.
        assert_eq!(s.take_due(26_000), vec![Key::PeriodicScan]);
        assert_eq!(s.deadline(&Key::PeriodicScan), Some(31_000));
    }

    #[test]
    fn test_due_order_is_deadline_then_schedule_order() {
        let mut s = Scheduler::new();
        s.schedule_once(Key::DeferredRemoval(2), 0, 100);
        s.schedule_once(Key::DeferredRemoval(1), 0, 100);
        s.schedule_once(Key::ReactiveScan, 0, 50);
        assert_eq!(
            s.take_due(100),
            vec![
                Key::ReactiveScan,
                Key::DeferredRemoval(2),
                Key::DeferredRemoval(1)
            ]
        );
    }

    #[test]
    fn test_cancel_and_next_deadline() {
        let mut s = Scheduler::new();
        assert_eq!(s.next_deadline(), None);
        s.schedule_once(Key::DeferredRemoval(1), 10, 100);
        s.schedule_repeating(Key::PeriodicScan, 0, 5_000);
        assert_eq!(s.next_deadline(), Some(110));
        assert!(s.cancel(&Key::DeferredRemoval(1)));
        assert!(!s.cancel(&Key::DeferredRemoval(1)));
        assert!(!s.is_pending(&Key::DeferredRemoval(1)));
        assert_eq!(s.next_deadline(), Some(5_000));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.schedule_repeating(Key::PeriodicScan, 0, 0);
        assert_eq!(s.deadline(&Key::PeriodicScan), Some(1));
    }
}
