//! Overlay Classifier
//!
//! Decides whether an element is a blocking overlay. Reads live style and
//! geometry, never mutates anything, never caches. Any read failure ends in
//! a non-blocking verdict: a missed overlay is recoverable on the next scan,
//! a removed article is not.
//!
//! Three independent rules, any one sufficient:
//!
//! | Rule | Position | z-index | Coverage | Other |
//! |------|----------|---------|----------|-------|
//! | [`BlockingRule::StackedOverlay`] | fixed/absolute | ≥ 1000 | > 70% | *or* keyword signature |
//! | [`BlockingRule::ModalDialog`] | any | ≥ 100 | > 50% | dialog role or `aria-modal` |
//! | [`BlockingRule::KeywordOverlay`] | any | ≥ 100 | > 40% | keyword signature |

use crate::analyzer::{read_blocking_signature, read_coverage};
use crate::dom::{ComputedStyle, Dom, Position};
use crate::result::DomResult;
use crate::tracked::TrackedSet;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Minimum z-index for the stacked-overlay rule
pub const STACKED_MIN_Z: i64 = 1000;

/// Coverage (percent, exclusive) for the stacked-overlay rule
pub const STACKED_MIN_COVERAGE: f64 = 70.0;

/// Minimum z-index for the modal-dialog rule
pub const DIALOG_MIN_Z: i64 = 100;

/// Coverage (percent, exclusive) for the modal-dialog rule
pub const DIALOG_MIN_COVERAGE: f64 = 50.0;

/// Minimum z-index for the keyword-overlay rule
pub const KEYWORD_MIN_Z: i64 = 100;

/// Coverage (percent, exclusive) for the keyword-overlay rule
pub const KEYWORD_MIN_COVERAGE: f64 = 40.0;

/// Tags that never paint a box
pub const NON_RENDERABLE_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "link", "meta", "head", "title", "base",
];

/// `role` values treated as dialog-like
pub const DIALOG_ROLES: &[&str] = &["dialog", "alertdialog"];

// =============================================================================
// VERDICT
// =============================================================================

/// Which rule classified an element as blocking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockingRule {
    /// Out-of-flow, very high stacking order, covers most of the viewport or
    /// carries a blocking signature
    StackedOverlay,
    /// Dialog-like role over half the viewport
    ModalDialog,
    /// Blocking signature over a large share of the viewport
    KeywordOverlay,
}

impl fmt::Display for BlockingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackedOverlay => write!(f, "stacked-overlay"),
            Self::ModalDialog => write!(f, "modal-dialog"),
            Self::KeywordOverlay => write!(f, "keyword-overlay"),
        }
    }
}

/// Why an element was not classified as blocking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clearance {
    /// Already neutralized
    AlreadyTracked,
    /// `script`, `style` and other boxless tags
    NonRenderable,
    /// `<html>` or `<body>`; those get unlocked, not removed
    DocumentRoot,
    /// `display:none` or `visibility:hidden`
    Hidden,
    /// Tag, style, geometry or a signature attribute could not be read
    Unreadable,
    /// Visible and readable, but no rule matched
    NoRuleMatched,
}

/// Classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Element blocks the page
    Blocking(BlockingRule),
    /// Element is left alone
    Clear(Clearance),
}

impl Verdict {
    /// Whether the element should be neutralized
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking(_))
    }
}

/// Raw signals of one element, as read during a single classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Computed `position`
    pub position: Position,
    /// Numeric stacking order (`auto` is 0)
    pub z_index: i64,
    /// Percent of the viewport covered
    pub coverage: f64,
    /// Blocking keyword present and no safe pattern
    pub keyword: bool,
    /// Dialog role or `aria-modal="true"`
    pub dialog: bool,
}

impl Signals {
    /// First matching rule. The rules are independent; the order only
    /// matters for which one gets reported.
    #[must_use]
    pub fn evaluate(&self) -> Option<BlockingRule> {
        if self.position.is_out_of_flow()
            && self.z_index >= STACKED_MIN_Z
            && (self.coverage > STACKED_MIN_COVERAGE || self.keyword)
        {
            return Some(BlockingRule::StackedOverlay);
        }
        if self.dialog && self.z_index >= DIALOG_MIN_Z && self.coverage > DIALOG_MIN_COVERAGE {
            return Some(BlockingRule::ModalDialog);
        }
        if self.keyword && self.z_index >= KEYWORD_MIN_Z && self.coverage > KEYWORD_MIN_COVERAGE {
            return Some(BlockingRule::KeywordOverlay);
        }
        None
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Dialog role or `aria-modal="true"`
pub fn is_dialog_like<D: Dom>(dom: &D, node: &D::Node) -> DomResult<bool> {
    let role = dom.attribute(node, "role")?.unwrap_or_default();
    let role = role.trim().to_ascii_lowercase();
    if DIALOG_ROLES.contains(&role.as_str()) {
        return Ok(true);
    }
    Ok(dom
        .attribute(node, "aria-modal")?
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
}

fn read_signals<D: Dom>(dom: &D, node: &D::Node, style: &ComputedStyle) -> DomResult<Signals> {
    Ok(Signals {
        position: style.position,
        z_index: style.stacking_order(),
        coverage: read_coverage(dom, node)?,
        keyword: read_blocking_signature(dom, node)?,
        dialog: is_dialog_like(dom, node)?,
    })
}

/// Full verdict for `node`
pub fn classify<D: Dom>(dom: &D, tracked: &TrackedSet<D::Node>, node: &D::Node) -> Verdict {
    if tracked.contains(node) {
        return Verdict::Clear(Clearance::AlreadyTracked);
    }

    let tag = match dom.tag_name(node) {
        Ok(tag) => tag,
        Err(err) => {
            tracing::trace!(?node, %err, "tag unreadable");
            return Verdict::Clear(Clearance::Unreadable);
        }
    };
    if NON_RENDERABLE_TAGS.contains(&tag.as_str()) {
        return Verdict::Clear(Clearance::NonRenderable);
    }
    if dom.document_element().as_ref() == Some(node) || dom.body().as_ref() == Some(node) {
        return Verdict::Clear(Clearance::DocumentRoot);
    }

    let style = match dom.computed_style(node) {
        Ok(style) => style,
        Err(err) => {
            tracing::trace!(?node, %err, "style unreadable");
            return Verdict::Clear(Clearance::Unreadable);
        }
    };
    if style.is_hidden() {
        return Verdict::Clear(Clearance::Hidden);
    }

    // Every rule needs at least z-index 100; skip geometry and attribute reads
    // for the common case.
    if style.stacking_order() < DIALOG_MIN_Z.min(KEYWORD_MIN_Z) {
        return Verdict::Clear(Clearance::NoRuleMatched);
    }

    let signals = match read_signals(dom, node, &style) {
        Ok(signals) => signals,
        Err(err) => {
            tracing::trace!(?node, %err, "signals unreadable");
            return Verdict::Clear(Clearance::Unreadable);
        }
    };

    match signals.evaluate() {
        Some(rule) => Verdict::Blocking(rule),
        None => Verdict::Clear(Clearance::NoRuleMatched),
    }
}

/// Whether `node` is a blocking overlay
pub fn is_blocking_element<D: Dom>(dom: &D, tracked: &TrackedSet<D::Node>, node: &D::Node) -> bool {
    classify(dom, tracked, node).is_blocking()
}
