//! Unveil: blocking-overlay detection and neutralization
//!
//! Finds the elements a page stacks over its own content (login walls,
//! paywall gates, subscription modals, dimming backdrops), takes them out of
//! the way, and undoes the scroll lock and blur they leave behind. It keeps
//! doing so for the life of the document: overlays injected later, by script
//! or by attribute change, are caught as they appear.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    UNVEIL Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  host events          Engine                    Dom (trait)     │
//! │  ┌──────────┐   ┌──────────────────┐   ┌───────────────────┐    │
//! │  │ ready    │──►│ Scheduler        │   │ WebDom (web-sys)  │    │
//! │  │ mutation │──►│ MutationWatcher  │──►│ MockDom (tests)   │    │
//! │  │ scroll   │──►│ Classifier ◄─ Analyzer                   │    │
//! │  │ input    │──►│ Neutralizer ─► TrackedSet                │    │
//! │  │ timer    │──►│ Scroll Unlocker  │   └───────────────────┘    │
//! │  └──────────┘   └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use unveil::clock::ManualClock;
//! use unveil::dom::{Dom, Rect};
//! use unveil::mock::{MockDom, MockElement};
//! use unveil::Engine;
//!
//! let dom = MockDom::new(1280.0, 800.0);
//! let wall = dom.append_to_body(
//!     MockElement::new("div")
//!         .class("paywall-overlay")
//!         .position("fixed")
//!         .z_index(9999)
//!         .rect(Rect::new(0.0, 0.0, 1280.0, 800.0)),
//! );
//!
//! let mut engine = Engine::new(dom.clone(), ManualClock::new(0));
//! engine.start(true);
//!
//! assert!(!dom.is_connected(&wall));
//! assert_eq!(engine.stats().removed, 1);
//! ```

#![warn(missing_docs)]

pub mod analyzer;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod dom;
pub mod engine;
pub mod mock;
pub mod neutralizer;
pub mod result;
pub mod scheduler;
pub mod style;
pub mod tracked;
pub mod unlock;
pub mod watcher;

/// Browser backend (`web` feature, wasm32 only)
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

pub use classifier::{classify, is_blocking_element, BlockingRule, Clearance, Verdict};
pub use clock::{Clock, ManualClock};
pub use config::SweepTimings;
pub use dom::{ComputedStyle, Dom, Mutation, Position, Rect, Viewport};
pub use engine::{Engine, ScanReport, SweepStats};
pub use neutralizer::Neutralization;
pub use result::{DomError, DomResult, UnveilError, UnveilResult};
pub use scheduler::{Scheduler, TaskKey};
pub use tracked::TrackedSet;
pub use unlock::{unlock_scroll, UnlockReport};
pub use watcher::{BatchOutcome, MutationWatcher};

#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub use web::{launch, WebDom, WebNode};
