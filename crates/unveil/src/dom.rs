//! Host DOM seam
//!
//! The engine never talks to a browser directly. Everything it reads (style,
//! geometry, attributes) and everything it writes (forced style properties,
//! node removal, stylesheet insertion) goes through [`Dom`]. The browser
//! backend lives in `web`, the in-memory fixture in `mock`.
//!
//! All methods take `&self`: host DOM handles are shared references into a
//! tree the page also mutates, so implementations use interior mutability.

use crate::result::DomResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

// =============================================================================
// GEOMETRY
// =============================================================================

/// Axis-aligned rectangle in CSS pixels, viewport-relative
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Area, zero for degenerate or negative sizes
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlap with another rectangle; width and height clamp to zero when
    /// the two do not intersect
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }
}

/// Visible viewport size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: f64,
    /// Height in CSS pixels
    pub height: f64,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The viewport as a rectangle anchored at the origin
    #[must_use]
    pub const fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

// =============================================================================
// COMPUTED STYLE
// =============================================================================

/// CSS `position` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    /// `static` (also used for unknown values)
    #[default]
    Static,
    /// `relative`
    Relative,
    /// `absolute`
    Absolute,
    /// `fixed`
    Fixed,
    /// `sticky`
    Sticky,
}

impl Position {
    /// Parse a computed `position` value
    #[must_use]
    pub fn from_css(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "relative" => Self::Relative,
            "absolute" => Self::Absolute,
            "fixed" => Self::Fixed,
            "sticky" | "-webkit-sticky" => Self::Sticky,
            _ => Self::Static,
        }
    }

    /// Whether the element is taken out of flow and can float over content
    #[must_use]
    pub const fn is_out_of_flow(self) -> bool {
        matches!(self, Self::Fixed | Self::Absolute)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Relative => write!(f, "relative"),
            Self::Absolute => write!(f, "absolute"),
            Self::Fixed => write!(f, "fixed"),
            Self::Sticky => write!(f, "sticky"),
        }
    }
}

/// Parse a computed `z-index`. `auto`, empty and non-numeric values yield
/// `None`.
#[must_use]
pub fn parse_z_index(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// The subset of computed style the classifier reads
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComputedStyle {
    /// `display`
    pub display: String,
    /// `visibility`
    pub visibility: String,
    /// `position`
    pub position: Position,
    /// `z-index`, `None` for `auto`
    pub z_index: Option<i64>,
}

impl ComputedStyle {
    /// Build from raw computed values
    #[must_use]
    pub fn from_css(display: &str, visibility: &str, position: &str, z_index: &str) -> Self {
        Self {
            display: display.trim().to_ascii_lowercase(),
            visibility: visibility.trim().to_ascii_lowercase(),
            position: Position::from_css(position),
            z_index: parse_z_index(z_index),
        }
    }

    /// Numeric stacking order; `auto` counts as 0
    #[must_use]
    pub fn stacking_order(&self) -> i64 {
        self.z_index.unwrap_or(0)
    }

    /// `display:none` or `visibility:hidden`
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.display == "none" || self.visibility == "hidden"
    }
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// One observed change to the document, in the order the host reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<N> {
    /// An element node was inserted
    ChildAdded {
        /// The inserted element
        node: N,
    },
    /// An attribute changed on an element
    AttributeChanged {
        /// Element whose attribute changed
        target: N,
        /// Attribute name, lowercase
        attribute: String,
    },
}

impl<N> Mutation<N> {
    /// Insertion record
    #[must_use]
    pub const fn added(node: N) -> Self {
        Self::ChildAdded { node }
    }

    /// Attribute record
    #[must_use]
    pub fn attribute(target: N, attribute: &str) -> Self {
        Self::AttributeChanged {
            target,
            attribute: attribute.to_ascii_lowercase(),
        }
    }
}

// =============================================================================
// HOST TRAIT
// =============================================================================

/// Read/write access to the live document
///
/// `Node` is an element handle whose `Eq`/`Hash` follow element identity:
/// two handles to the same element compare equal.
pub trait Dom {
    /// Element handle
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// Current viewport size
    fn viewport(&self) -> DomResult<Viewport>;

    /// `<html>`
    fn document_element(&self) -> Option<Self::Node>;

    /// `<body>`
    fn body(&self) -> Option<Self::Node>;

    /// Lowercase tag name
    fn tag_name(&self, node: &Self::Node) -> DomResult<String>;

    /// Attribute value, `None` when absent
    fn attribute(&self, node: &Self::Node, name: &str) -> DomResult<Option<String>>;

    /// Live computed style
    fn computed_style(&self, node: &Self::Node) -> DomResult<ComputedStyle>;

    /// Border box relative to the viewport
    fn bounding_rect(&self, node: &Self::Node) -> DomResult<Rect>;

    /// Whether the node is still attached to the document
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Up to `limit` elements of the document in document order
    fn elements(&self, limit: usize) -> DomResult<Vec<Self::Node>>;

    /// Up to `limit` descendant elements of `node` in document order
    fn descendants(&self, node: &Self::Node, limit: usize) -> DomResult<Vec<Self::Node>>;

    /// All elements matching a CSS selector
    fn query_all(&self, selector: &str) -> DomResult<Vec<Self::Node>>;

    /// Set an inline style property with `!important` priority
    fn set_important(&self, node: &Self::Node, property: &str, value: &str) -> DomResult<()>;

    /// Detach the node from its parent
    fn remove(&self, node: &Self::Node) -> DomResult<()>;

    /// Insert a `<style>` element with id `marker`, replacing the contents of
    /// an existing one
    fn upsert_stylesheet(&self, marker: &str, css: &str) -> DomResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection_overlapping() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        let i = a.intersection(&b);
        assert_eq!(i, Rect::new(50.0, 50.0, 50.0, 50.0));
        assert_eq!(i.area(), 2500.0);
    }

    #[test]
    fn test_rect_intersection_disjoint_clamps_to_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(500.0, -300.0, 10.0, 10.0);
        let i = a.intersection(&b);
        assert_eq!(i.width, 0.0);
        assert_eq!(i.height, 0.0);
        assert_eq!(i.area(), 0.0);
    }

    #[test]
    fn test_negative_size_has_zero_area() {
        assert_eq!(Rect::new(0.0, 0.0, -5.0, 10.0).area(), 0.0);
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!(Position::from_css("fixed"), Position::Fixed);
        assert_eq!(Position::from_css(" ABSOLUTE "), Position::Absolute);
        assert_eq!(Position::from_css("-webkit-sticky"), Position::Sticky);
        assert_eq!(Position::from_css("inherit"), Position::Static);
        assert!(Position::Fixed.is_out_of_flow());
        assert!(!Position::Sticky.is_out_of_flow());
        assert_eq!(Position::Fixed.to_string(), "fixed");
    }

    #[test]
    fn test_z_index_parsing() {
        assert_eq!(parse_z_index("2000"), Some(2000));
        assert_eq!(parse_z_index("-1"), Some(-1));
        assert_eq!(parse_z_index("auto"), None);
        assert_eq!(parse_z_index(""), None);
        assert_eq!(parse_z_index("12px"), None);
    }

    #[test]
    fn test_computed_style_hidden() {
        let shown = ComputedStyle::from_css("block", "visible", "fixed", "auto");
        assert!(!shown.is_hidden());
        assert_eq!(shown.stacking_order(), 0);

        assert!(ComputedStyle::from_css("none", "visible", "static", "1").is_hidden());
        assert!(ComputedStyle::from_css("block", "HIDDEN", "static", "1").is_hidden());
    }

    #[test]
    fn test_mutation_attribute_lowercases() {
        let m = Mutation::attribute(1_u32, "CLASS");
        assert_eq!(
            m,
            Mutation::AttributeChanged {
                target: 1,
                attribute: "class".to_string()
            }
        );
    }
}
