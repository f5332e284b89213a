//! Mutation Watcher
//!
//! Feeds mutation batches from the host observer through the classifier and
//! neutralizer. This is what catches overlays injected after load (deferred
//! paywall scripts, SPA route changes) and elements that become blocking by
//! having their `class`, `id` or `style` rewritten.
//!
//! ## Feedback
//!
//! Every forced style write the neutralizer and unlocker make shows up in the
//! next batch as a `style` attribute change. Those targets are either tracked
//! (skipped before any read) or the document root/body (never candidates),
//! so the loop settles after one extra, empty batch.

use crate::dom::{Dom, Mutation};
use crate::neutralizer::{sweep_node, Neutralization, SweepContext};
use crate::unlock::{unlock_scroll, UnlockReport};
use serde::{Deserialize, Serialize};

/// Attribute names whose change can turn an element into an overlay
pub const WATCHED_ATTRIBUTES: &[&str] = &["style", "class", "id"];

/// What one mutation batch produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Records in the batch
    pub records: usize,
    /// Classifier invocations
    pub classified: usize,
    /// Elements removed outright
    pub removed: usize,
    /// Elements hidden by style override
    pub overridden: usize,
    /// Unlock pass, if anything was neutralized
    pub unlock: Option<UnlockReport>,
}

impl BatchOutcome {
    /// Elements neutralized by this batch
    #[must_use]
    pub const fn neutralized(&self) -> usize {
        self.removed + self.overridden
    }

    fn record(&mut self, action: Option<Neutralization>) -> Option<Neutralization> {
        self.classified += 1;
        match action {
            Some(Neutralization::Removed) => self.removed += 1,
            Some(Neutralization::Overridden) => self.overridden += 1,
            Some(Neutralization::AlreadyTracked) | None => {}
        }
        action
    }
}

/// Mutation batch processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationWatcher {
    descendant_cap: usize,
}

impl MutationWatcher {
    /// Watcher classifying at most `descendant_cap` descendants per inserted
    /// element
    #[must_use]
    pub const fn new(descendant_cap: usize) -> Self {
        Self { descendant_cap }
    }

    /// Process one batch, in the order the records were supplied
    pub fn process<D: Dom>(
        &self,
        ctx: &mut SweepContext<'_, D>,
        records: &[Mutation<D::Node>],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            records: records.len(),
            ..BatchOutcome::default()
        };

        for record in records {
            match record {
                Mutation::ChildAdded { node } => self.process_added(ctx, node, &mut outcome),
                Mutation::AttributeChanged { target, attribute } => {
                    if WATCHED_ATTRIBUTES.contains(&attribute.as_str()) {
                        outcome.record(sweep_node(ctx, target).map(|(_, action)| action));
                    }
                }
            }
        }

        if outcome.neutralized() > 0 {
            outcome.unlock = Some(unlock_scroll(ctx.dom));
        }
        if outcome.classified > 0 {
            tracing::trace!(
                records = outcome.records,
                classified = outcome.classified,
                removed = outcome.removed,
                overridden = outcome.overridden,
                "mutation batch processed"
            );
        }
        outcome
    }

    fn process_added<D: Dom>(
        &self,
        ctx: &mut SweepContext<'_, D>,
        node: &D::Node,
        outcome: &mut BatchOutcome,
    ) {
        // Inserted and taken out again before the batch was delivered.
        if !ctx.dom.is_connected(node) {
            return;
        }

        let action = outcome.record(sweep_node(ctx, node).map(|(_, action)| action));
        if action == Some(Neutralization::Removed) {
            return;
        }

        let descendants = match ctx.dom.descendants(node, self.descendant_cap) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::trace!(?node, %err, "descendants unreadable");
                return;
            }
        };
        for child in descendants.iter().take(self.descendant_cap) {
            outcome.record(sweep_node(ctx, child).map(|(_, action)| action));
        }
    }
}

impl Default for MutationWatcher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DESCENDANT_CAP)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SweepTimings;
    use crate::dom::Rect;
    use crate::mock::{MockDom, MockElement, MockNode};
    use crate::scheduler::{Scheduler, TaskKey};
    use crate::tracked::TrackedSet;

    struct Fixture {
        dom: MockDom,
        tracked: TrackedSet<MockNode>,
        scheduler: Scheduler<MockNode>,
        timings: SweepTimings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dom: MockDom::new(1000.0, 1000.0),
                tracked: TrackedSet::new(),
                scheduler: Scheduler::new(),
                timings: SweepTimings::default(),
            }
        }

        fn drain(&mut self, watcher: MutationWatcher) -> BatchOutcome {
            let records = self.dom.take_mutations();
            let mut ctx = SweepContext {
                dom: &self.dom,
                tracked: &mut self.tracked,
                scheduler: &mut self.scheduler,
                now_ms: 0,
                timings: &self.timings,
            };
            watcher.process(&mut ctx, &records)
        }
    }

    fn overlay() -> MockElement {
        MockElement::new("div")
            .position("fixed")
            .z_index(5000)
            .rect(Rect::new(0.0, 0.0, 1000.0, 1000.0))
    }

    #[test]
    fn test_inserted_overlay_is_neutralized_and_page_unlocked() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(overlay());

        let outcome = fx.drain(MutationWatcher::default());

        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.overridden, 1);
        assert!(outcome.unlock.is_some());
        assert!(fx.tracked.contains(&node));
        assert!(fx.scheduler.is_pending(&TaskKey::DeferredRemoval(node)));
        let body = fx.dom.body().unwrap();
        assert_eq!(fx.dom.style_value(&body, "overflow").as_deref(), Some("auto"));
    }

    #[test]
    fn test_overlay_nested_in_inserted_wrapper() {
        let mut fx = Fixture::new();
        let wrapper = fx.dom.create(MockElement::new("section"));
        let inner = fx.dom.append_child(&wrapper, overlay());
        fx.dom.append(&fx.dom.body().unwrap(), &wrapper).unwrap();

        let outcome = fx.drain(MutationWatcher::default());

        assert_eq!(outcome.classified, 2);
        assert_eq!(outcome.neutralized(), 1);
        assert!(fx.tracked.contains(&inner));
        assert!(!fx.tracked.contains(&wrapper));
    }

    #[test]
    fn test_descendants_of_removed_element_are_skipped() {
        let mut fx = Fixture::new();
        let wall = fx.dom.create(overlay().class("paywall"));
        let child = fx.dom.append_child(&wall, overlay());
        fx.dom.append(&fx.dom.body().unwrap(), &wall).unwrap();

        let outcome = fx.drain(MutationWatcher::default());

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.classified, 1);
        assert!(!fx.tracked.contains(&child));
    }

    #[test]
    fn test_descendant_cap() {
        let mut fx = Fixture::new();
        let list = fx.dom.create(MockElement::new("ul"));
        for _ in 0..10 {
            fx.dom.append_child(&list, MockElement::new("li"));
        }
        let late = fx.dom.append_child(&list, overlay());
        fx.dom.append(&fx.dom.body().unwrap(), &list).unwrap();

        let outcome = fx.drain(MutationWatcher::new(10));

        assert_eq!(outcome.classified, 11);
        assert!(!fx.tracked.contains(&late));
        assert_eq!(outcome.unlock, None);
    }

    #[test]
    fn test_attribute_change_reclassifies() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(MockElement::new("div").rect(Rect::new(0.0, 0.0, 1000.0, 600.0)));
        fx.dom.take_mutations();

        fx.dom.set_attribute(&node, "data-state", "open");
        assert_eq!(fx.drain(MutationWatcher::default()).classified, 0);

        fx.dom.set_style(&node, "z-index", "200");
        fx.dom.set_attribute(&node, "class", "modal-overlay");
        let outcome = fx.drain(MutationWatcher::default());

        assert_eq!(outcome.classified, 2);
        assert_eq!(outcome.removed, 1);
        assert!(!fx.dom.is_connected(&node));
    }

    #[test]
    fn test_own_writes_settle() {
        let mut fx = Fixture::new();
        fx.dom.append_to_body(overlay());

        let first = fx.drain(MutationWatcher::default());
        assert_eq!(first.neutralized(), 1);

        // The override and unlock writes come back as style changes.
        let echo = fx.drain(MutationWatcher::default());
        assert!(echo.records > 0);
        assert_eq!(echo.neutralized(), 0);
        assert_eq!(echo.unlock, None);

        assert!(fx.dom.take_mutations().is_empty());
    }

    #[test]
    fn test_detached_insertion_is_ignored() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(overlay());
        fx.dom.detach(&node);

        let outcome = fx.drain(MutationWatcher::default());
        assert_eq!(outcome.classified, 0);
        assert!(!fx.tracked.contains(&node));
    }
}
