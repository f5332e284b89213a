//! Coverage & Keyword Analyzer
//!
//! The two primitives the classifier composes: how much of the viewport an
//! element occludes, and whether its identifying attributes read like a
//! blocking overlay. The `read_*` forms surface host failures so the
//! classifier can fail closed; the plain forms degrade to the "not blocking"
//! answer.

use crate::dom::{Dom, Rect, Viewport};
use crate::result::DomResult;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Substrings that mark an element as a blocking layer
pub const BLOCKING_KEYWORDS: &[&str] = &[
    "modal",
    "overlay",
    "popup",
    "pop-up",
    "paywall",
    "regwall",
    "loginwall",
    "login-wall",
    "login",
    "signin",
    "sign-in",
    "signup",
    "sign-up",
    "register",
    "subscribe",
    "subscription",
    "backdrop",
    "lightbox",
    "interstitial",
    "content-gate",
    "blocker",
];

/// Substrings that mark an element as legitimate UI; they veto any keyword
/// match
pub const SAFE_PATTERNS: &[&str] = &[
    "cookie",
    "consent",
    "gdpr",
    "tooltip",
    "dropdown",
    "navigation",
    "navbar",
    "menu",
    "toast",
    "snackbar",
    "notification",
    "datepicker",
    "autocomplete",
    "carousel",
];

/// Attributes whose values make up an element's signature
pub const SIGNATURE_ATTRIBUTES: &[&str] = &[
    "class",
    "id",
    "aria-label",
    "aria-labelledby",
    "aria-describedby",
];

// =============================================================================
// COVERAGE
// =============================================================================

/// Percentage `[0, 100]` of the viewport covered by `rect`
#[must_use]
pub fn coverage_percent(rect: &Rect, viewport: &Viewport) -> f64 {
    let viewport_rect = viewport.rect();
    let viewport_area = viewport_rect.area();
    if viewport_area <= 0.0 || !viewport_area.is_finite() {
        return 0.0;
    }
    let covered = rect.intersection(&viewport_rect).area();
    if !covered.is_finite() {
        return 0.0;
    }
    (covered / viewport_area * 100.0).clamp(0.0, 100.0)
}

/// Percentage of the viewport `node` occludes
pub fn read_coverage<D: Dom>(dom: &D, node: &D::Node) -> DomResult<f64> {
    let viewport = dom.viewport()?;
    let rect = dom.bounding_rect(node)?;
    Ok(coverage_percent(&rect, &viewport))
}

/// Percentage of the viewport `node` occludes, 0 when geometry is unreadable
pub fn viewport_coverage<D: Dom>(dom: &D, node: &D::Node) -> f64 {
    read_coverage(dom, node).unwrap_or_else(|err| {
        tracing::trace!(?node, %err, "geometry unreadable");
        0.0
    })
}

// =============================================================================
// KEYWORDS
// =============================================================================

/// Keyword check on an already-assembled signature; safe patterns win
#[must_use]
pub fn signature_matches(signature: &str) -> bool {
    let text = signature.to_lowercase();
    if SAFE_PATTERNS.iter().any(|safe| text.contains(safe)) {
        return false;
    }
    BLOCKING_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// Space-joined, lowercase signature attribute values of `node`. Absent
/// attributes are skipped; a failed read fails the whole signature.
pub fn element_signature<D: Dom>(dom: &D, node: &D::Node) -> DomResult<String> {
    let mut values = Vec::with_capacity(SIGNATURE_ATTRIBUTES.len());
    for name in SIGNATURE_ATTRIBUTES {
        if let Some(value) = dom.attribute(node, name)? {
            values.push(value);
        }
    }
    Ok(values.join(" ").to_lowercase())
}

/// Whether `node` carries a blocking keyword and no safe pattern
pub fn read_blocking_signature<D: Dom>(dom: &D, node: &D::Node) -> DomResult<bool> {
    element_signature(dom, node).map(|signature| signature_matches(&signature))
}

/// [`read_blocking_signature`], with unreadable attributes counting as no
/// match
pub fn has_blocking_signature<D: Dom>(dom: &D, node: &D::Node) -> bool {
    read_blocking_signature(dom, node).unwrap_or_else(|err| {
        tracing::trace!(?node, %err, "signature unreadable");
        false
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDom, MockElement};

    const VIEWPORT: Viewport = Viewport::new(1000.0, 800.0);

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // =========================================================================
    // Coverage math
    // =========================================================================

    #[test]
    fn test_exact_viewport_is_full_coverage() {
        let rect = Rect::new(0.0, 0.0, 1000.0, 800.0);
        assert!(approx(coverage_percent(&rect, &VIEWPORT), 100.0));
    }

    #[test]
    fn test_offscreen_is_zero_coverage() {
        let rect = Rect::new(1200.0, 0.0, 300.0, 300.0);
        assert!(approx(coverage_percent(&rect, &VIEWPORT), 0.0));
        let above = Rect::new(0.0, -900.0, 1000.0, 800.0);
        assert!(approx(coverage_percent(&above, &VIEWPORT), 0.0));
    }

    #[test]
    fn test_half_onscreen_is_half_coverage() {
        let rect = Rect::new(500.0, 0.0, 1000.0, 800.0);
        assert!(approx(coverage_percent(&rect, &VIEWPORT), 50.0));
    }

    #[test]
    fn test_oversized_rect_clamps_to_hundred() {
        let rect = Rect::new(-100.0, -100.0, 5000.0, 5000.0);
        assert!(approx(coverage_percent(&rect, &VIEWPORT), 100.0));
    }

    #[test]
    fn test_zero_viewport_is_zero_coverage() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(approx(coverage_percent(&rect, &Viewport::new(0.0, 0.0)), 0.0));
    }

    #[test]
    fn test_non_finite_geometry_is_zero_coverage() {
        let rect = Rect::new(0.0, 0.0, f64::NAN, 10.0);
        assert!(approx(coverage_percent(&rect, &VIEWPORT), 0.0));
    }

    #[test]
    fn test_viewport_coverage_on_detached_node_is_zero() {
        let dom = MockDom::new(1000.0, 800.0);
        let node = dom.append_to_body(
            MockElement::new("div").rect(Rect::new(0.0, 0.0, 1000.0, 800.0)),
        );
        assert!(approx(viewport_coverage(&dom, &node), 100.0));
        dom.detach(&node);
        assert!(approx(viewport_coverage(&dom, &node), 0.0));
    }

    // =========================================================================
    // Keyword signature
    // =========================================================================

    #[test]
    fn test_blocking_keyword_matches() {
        assert!(signature_matches("login-overlay"));
        assert!(signature_matches("Paywall-Container"));
        assert!(signature_matches("tp-modal tp-active"));
        assert!(signature_matches("content-gate"));
    }

    #[test]
    fn test_safe_pattern_vetoes_keyword() {
        assert!(!signature_matches("cookie-modal"));
        assert!(!signature_matches("nav-dropdown overlay"));
        assert!(!signature_matches("gdpr-consent-popup"));
    }

    #[test]
    fn test_plain_names_do_not_match() {
        assert!(!signature_matches(""));
        assert!(!signature_matches("article-body hero"));
        assert!(!signature_matches("navigate-back"));
    }

    #[test]
    fn test_signature_reads_class_id_and_aria() {
        let dom = MockDom::new(1000.0, 800.0);
        let by_class = dom.append_to_body(MockElement::new("div").class("Subscribe-Box"));
        let by_id = dom.append_to_body(MockElement::new("div").id("paywall"));
        let by_label =
            dom.append_to_body(MockElement::new("div").attr("aria-label", "Subscribe to keep reading"));
        let plain = dom.append_to_body(MockElement::new("div").class("story"));

        assert!(has_blocking_signature(&dom, &by_class));
        assert!(has_blocking_signature(&dom, &by_id));
        assert!(has_blocking_signature(&dom, &by_label));
        assert!(!has_blocking_signature(&dom, &plain));
        assert_eq!(element_signature(&dom, &by_class).unwrap(), "subscribe-box");
    }

    #[test]
    fn test_failed_reads_surface_as_errors() {
        let dom = MockDom::new(1000.0, 800.0);
        let node = dom.append_to_body(
            MockElement::new("div")
                .class("paywall")
                .rect(Rect::new(0.0, 0.0, 1000.0, 800.0))
                .failing_attributes()
                .failing_geometry(),
        );

        assert!(element_signature(&dom, &node).is_err());
        assert!(read_blocking_signature(&dom, &node).is_err());
        assert!(!has_blocking_signature(&dom, &node));
        assert!(read_coverage(&dom, &node).is_err());
        assert!(approx(viewport_coverage(&dom, &node), 0.0));
    }

    #[test]
    fn test_viewport_failure_is_zero_coverage() {
        let dom = MockDom::new(1000.0, 800.0);
        let node = dom.append_to_body(
            MockElement::new("div").rect(Rect::new(0.0, 0.0, 1000.0, 800.0)),
        );
        dom.fail_viewport(true);
        assert!(read_coverage(&dom, &node).is_err());
        assert!(approx(viewport_coverage(&dom, &node), 0.0));
        dom.fail_viewport(false);
        assert!(approx(viewport_coverage(&dom, &node), 100.0));
    }
}
