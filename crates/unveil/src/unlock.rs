//! Scroll Unlocker
//!
//! Overlays usually come with a scroll lock (`overflow:hidden` on `<body>`)
//! and a blur on the content behind them. Removing the overlay leaves both
//! in place, so every scan, every neutralizing mutation batch and every user
//! interaction ends here. All writes are forced (`!important`) and
//! idempotent.

use crate::dom::Dom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Likely main-content containers that get their blur stripped
pub const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".content",
    "#content",
    ".main-content",
    "#main-content",
    ".article-body",
    ".post-content",
];

const SCROLL_OVERRIDES: &[(&str, &str)] = &[
    ("overflow", "auto"),
    ("overflow-x", "auto"),
    ("overflow-y", "auto"),
    ("height", "auto"),
    ("max-height", "none"),
];

const UNBLUR_OVERRIDES: &[(&str, &str)] = &[
    ("filter", "none"),
    ("backdrop-filter", "none"),
    ("-webkit-backdrop-filter", "none"),
];

/// What one unlock pass touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockReport {
    /// `<html>` and `<body>` elements unlocked
    pub roots: usize,
    /// Content containers unblurred
    pub containers: usize,
    /// Property writes the host rejected
    pub failed_writes: usize,
}

fn force_all<D: Dom>(dom: &D, node: &D::Node, overrides: &[(&str, &str)]) -> usize {
    let mut failed = 0;
    for (property, value) in overrides {
        if let Err(err) = dom.set_important(node, property, value) {
            tracing::trace!(?node, property, %err, "forced write rejected");
            failed += 1;
        }
    }
    failed
}

/// Force root and body scrollable and strip blur from root, body and
/// content containers
pub fn unlock_scroll<D: Dom>(dom: &D) -> UnlockReport {
    let mut report = UnlockReport::default();

    for root in [dom.document_element(), dom.body()].into_iter().flatten() {
        report.failed_writes += force_all(dom, &root, SCROLL_OVERRIDES);
        report.failed_writes += force_all(dom, &root, UNBLUR_OVERRIDES);
        report.roots += 1;
    }

    let mut seen: HashSet<D::Node> = HashSet::new();
    for selector in CONTENT_SELECTORS {
        let matches = match dom.query_all(selector) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::trace!(selector, %err, "content query failed");
                continue;
            }
        };
        for node in matches {
            if seen.contains(&node) {
                continue;
            }
            report.failed_writes += force_all(dom, &node, UNBLUR_OVERRIDES);
            seen.insert(node);
        }
    }
    report.containers = seen.len();

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDom, MockElement};

    #[test]
    fn test_body_lock_and_blur_are_cleared() {
        let dom = MockDom::new(800.0, 600.0);
        let body = dom.body().unwrap();
        dom.set_style(&body, "overflow", "hidden");
        dom.set_style(&body, "filter", "blur(8px)");

        let report = unlock_scroll(&dom);

        for axis in ["overflow", "overflow-x", "overflow-y"] {
            assert_eq!(dom.style_value(&body, axis).as_deref(), Some("auto"));
        }
        assert_eq!(dom.style_value(&body, "filter").as_deref(), Some("none"));
        assert_eq!(dom.style_value(&body, "max-height").as_deref(), Some("none"));
        assert_eq!(report.roots, 2);
        assert_eq!(report.failed_writes, 0);
    }

    #[test]
    fn test_content_containers_are_unblurred_once() {
        let dom = MockDom::new(800.0, 600.0);
        let main = dom.append_to_body(
            MockElement::new("main")
                .id("content")
                .style("filter", "blur(4px)"),
        );
        let article = dom.append_child(
            &main,
            MockElement::new("article").style("backdrop-filter", "blur(2px)"),
        );
        let aside = dom.append_to_body(MockElement::new("aside").style("filter", "blur(1px)"));

        let report = unlock_scroll(&dom);

        assert_eq!(report.containers, 2);
        assert_eq!(dom.style_value(&main, "filter").as_deref(), Some("none"));
        assert_eq!(
            dom.style_value(&article, "backdrop-filter").as_deref(),
            Some("none")
        );
        assert_eq!(dom.style_value(&aside, "filter").as_deref(), Some("blur(1px)"));
        // Matched by both `main` and `#content`, written once.
        assert_eq!(dom.forced_write_count(&main), UNBLUR_OVERRIDES.len());
    }

    #[test]
    fn test_container_matching_every_selector_is_written_once() {
        let dom = MockDom::new(800.0, 600.0);
        let everything = dom.append_to_body(
            MockElement::new("main")
                .id("content")
                .role("main")
                .class("content main-content article-body post-content"),
        );
        let others: Vec<_> = (0..50)
            .map(|_| dom.append_to_body(MockElement::new("article").class("content")))
            .collect();

        let report = unlock_scroll(&dom);

        assert_eq!(report.containers, others.len() + 1);
        assert_eq!(dom.forced_write_count(&everything), UNBLUR_OVERRIDES.len());
        for node in &others {
            assert_eq!(dom.forced_write_count(node), UNBLUR_OVERRIDES.len());
        }
    }

    #[test]
    fn test_query_failures_contribute_nothing() {
        let dom = MockDom::new(800.0, 600.0);
        dom.append_to_body(MockElement::new("main"));
        dom.fail_queries(true);

        let report = unlock_scroll(&dom);
        assert_eq!(report.containers, 0);
        assert_eq!(report.roots, 2);
    }

    #[test]
    fn test_repeated_unlock_is_stable() {
        let dom = MockDom::new(800.0, 600.0);
        let body = dom.body().unwrap();
        dom.set_style(&body, "overflow", "hidden");
        unlock_scroll(&dom);
        let first = dom.snapshot();
        unlock_scroll(&dom);
        assert_eq!(dom.snapshot(), first);
    }
}
