//! Neutralizer
//!
//! Takes an element the classifier flagged and makes it stop blocking, at
//! most once per element. Elements with a blocking signature are removed
//! outright. Everything else gets a forced invisible, click-through override
//! and a deferred removal in case page script re-shows it.
//!
//! Every host write is best-effort. A failure (the page removed the element
//! first, the host refused the write) is logged at trace level and counted
//! as done.

use crate::analyzer::has_blocking_signature;
use crate::classifier::{classify, BlockingRule, Verdict};
use crate::config::SweepTimings;
use crate::dom::Dom;
use crate::scheduler::{Scheduler, TaskKey};
use crate::tracked::TrackedSet;
use serde::{Deserialize, Serialize};

/// Forced declarations applied on the override path
pub const OVERRIDE_DECLARATIONS: &[(&str, &str)] = &[
    ("display", "none"),
    ("visibility", "hidden"),
    ("opacity", "0"),
    ("pointer-events", "none"),
    ("z-index", "-2147483647"),
];

/// What the neutralizer did to an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neutralization {
    /// Already handled earlier; nothing done
    AlreadyTracked,
    /// Detached from the document
    Removed,
    /// Hidden by forced styles, removal scheduled
    Overridden,
}

/// Mutable engine state one sweep step works against
#[derive(Debug)]
pub struct SweepContext<'a, D: Dom> {
    /// Host document
    pub dom: &'a D,
    /// Elements already handled
    pub tracked: &'a mut TrackedSet<D::Node>,
    /// Pending deferred work
    pub scheduler: &'a mut Scheduler<D::Node>,
    /// Current engine time
    pub now_ms: u64,
    /// Cadence and caps
    pub timings: &'a SweepTimings,
}

/// Neutralize `node` unless it is already tracked
pub fn neutralize<D: Dom>(ctx: &mut SweepContext<'_, D>, node: &D::Node) -> Neutralization {
    // Tracked before any write: a reentrant call on the same node is a no-op.
    if !ctx.tracked.insert(node.clone()) {
        return Neutralization::AlreadyTracked;
    }

    if has_blocking_signature(ctx.dom, node) {
        if let Err(err) = ctx.dom.remove(node) {
            tracing::trace!(?node, %err, "removal failed, treating as removed");
        }
        return Neutralization::Removed;
    }

    for (property, value) in OVERRIDE_DECLARATIONS {
        if let Err(err) = ctx.dom.set_important(node, property, value) {
            tracing::trace!(?node, property, %err, "override write rejected");
        }
    }
    ctx.scheduler.schedule_once(
        TaskKey::DeferredRemoval(node.clone()),
        ctx.now_ms,
        ctx.timings.deferred_removal_ms,
    );
    Neutralization::Overridden
}

/// Classify `node` and neutralize it if blocking. Returns the rule and the
/// action taken, or `None` when the element was left alone.
pub fn sweep_node<D: Dom>(
    ctx: &mut SweepContext<'_, D>,
    node: &D::Node,
) -> Option<(BlockingRule, Neutralization)> {
    match classify(ctx.dom, ctx.tracked, node) {
        Verdict::Blocking(rule) => {
            let action = neutralize(ctx, node);
            tracing::debug!(?node, %rule, ?action, "blocking overlay neutralized");
            Some((rule, action))
        }
        Verdict::Clear(_) => None,
    }
}

/// Fallback removal for an overridden element; `true` if it was still
/// attached and got removed
pub fn complete_deferred_removal<D: Dom>(dom: &D, node: &D::Node) -> bool {
    if !dom.is_connected(node) {
        return false;
    }
    match dom.remove(node) {
        Ok(()) => true,
        Err(err) => {
            tracing::trace!(?node, %err, "deferred removal failed");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Rect;
    use crate::mock::{MockDom, MockElement};

    struct Fixture {
        dom: MockDom,
        tracked: TrackedSet<crate::mock::MockNode>,
        scheduler: Scheduler<crate::mock::MockNode>,
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

        fn ctx(&mut self) -> SweepContext<'_, MockDom> {
            SweepContext {
                dom: &self.dom,
                tracked: &mut self.tracked,
                scheduler: &mut self.scheduler,
                now_ms: 0,
                timings: &self.timings,
            }
        }
    }

    fn full() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 1000.0)
    }

    #[test]
    fn test_keyword_element_is_removed() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(MockElement::new("div").class("paywall"));

        assert_eq!(neutralize(&mut fx.ctx(), &node), Neutralization::Removed);
        assert!(!fx.dom.is_connected(&node));
        assert!(fx.tracked.contains(&node));
        assert_eq!(fx.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_plain_element_is_overridden_and_scheduled() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(MockElement::new("div").role("dialog"));

        assert_eq!(neutralize(&mut fx.ctx(), &node), Neutralization::Overridden);
        assert!(fx.dom.is_connected(&node));
        for (property, value) in OVERRIDE_DECLARATIONS {
            assert_eq!(fx.dom.style_value(&node, property).as_deref(), Some(*value));
        }
        let key = TaskKey::DeferredRemoval(node);
        assert_eq!(fx.scheduler.deadline(&key), Some(100));
    }

    #[test]
    fn test_second_call_is_noop() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(MockElement::new("div"));
        neutralize(&mut fx.ctx(), &node);
        let writes = fx.dom.forced_write_count(&node);

        assert_eq!(
            neutralize(&mut fx.ctx(), &node),
            Neutralization::AlreadyTracked
        );
        assert_eq!(fx.dom.forced_write_count(&node), writes);
    }

    #[test]
    fn test_removal_of_detached_element_is_swallowed() {
        let mut fx = Fixture::new();
        let node = fx.dom.append_to_body(MockElement::new("div").class("login-overlay"));
        fx.dom.detach(&node);

        assert_eq!(neutralize(&mut fx.ctx(), &node), Neutralization::Removed);
        assert_eq!(fx.dom.removal_count(&node), 0);
    }

    #[test]
    fn test_deferred_removal() {
        let fx = Fixture::new();
        let node = fx.dom.append_to_body(MockElement::new("div"));
        assert!(complete_deferred_removal(&fx.dom, &node));
        assert!(!complete_deferred_removal(&fx.dom, &node));
        assert_eq!(fx.dom.removal_count(&node), 1);
    }

    #[test]
    fn test_sweep_node_leaves_clear_elements() {
        let mut fx = Fixture::new();
        let banner = fx.dom.append_to_body(
            MockElement::new("div")
                .class("cookie-consent")
                .position("fixed")
                .z_index(5000)
                .rect(Rect::new(0.0, 900.0, 1000.0, 100.0)),
        );
        let wall = fx.dom.append_to_body(
            MockElement::new("div")
                .position("fixed")
                .z_index(5000)
                .rect(full()),
        );

        assert_eq!(sweep_node(&mut fx.ctx(), &banner), None);
        assert_eq!(
            sweep_node(&mut fx.ctx(), &wall),
            Some((BlockingRule::StackedOverlay, Neutralization::Overridden))
        );
        assert!(!fx.tracked.contains(&banner));
        assert_eq!(sweep_node(&mut fx.ctx(), &wall), None);
    }
}
