//! Mock host for testing the engine without browser APIs
//!
//! [`MockDom`] stands in for the live page: the same classifier, neutralizer
//! and scheduler code paths run against it as against the browser backend,
//! so tests exercise the actual engine rather than a model of it.
//!
//! ## Example
//!
//! ```rust
//! use unveil::dom::Rect;
//! use unveil::mock::{MockDom, MockElement};
//!
//! let dom = MockDom::new(1280.0, 800.0);
//! let wall = dom.append_to_body(
//!     MockElement::new("div")
//!         .class("login-overlay")
//!         .position("fixed")
//!         .z_index(2000)
//!         .rect(Rect::new(0.0, 0.0, 1280.0, 720.0)),
//! );
//! assert_eq!(dom.take_mutations().len(), 1);
//! # let _ = wall;
//! ```

pub mod dom;

pub use dom::{MockDom, MockElement, MockNode};
