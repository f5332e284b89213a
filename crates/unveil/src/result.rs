//! Result and error types for Unveil.
//!
//! Nothing in the engine lets an error escape into the host page. These types
//! exist so that every host access reports *why* it failed, and the engine
//! boundary can decide how to degrade (not blocking, coverage 0, no-op).

use thiserror::Error;

/// Result type for host DOM access
pub type DomResult<T> = Result<T, DomError>;

/// Result type for backend bootstrap
pub type UnveilResult<T> = Result<T, UnveilError>;

/// Failures reported by a [`crate::dom::Dom`] implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// Node is no longer attached to the document
    #[error("node is detached from the document")]
    Detached,

    /// Computed style could not be read (cross-origin frame, host exception)
    #[error("computed style unavailable: {message}")]
    StyleUnavailable {
        /// Error message
        message: String,
    },

    /// Geometry (bounding rect, viewport size) could not be read
    #[error("geometry unavailable: {message}")]
    Geometry {
        /// Error message
        message: String,
    },

    /// Selector query failed
    #[error("query '{selector}' failed: {message}")]
    Query {
        /// Selector that failed
        selector: String,
        /// Error message
        message: String,
    },

    /// Writing to the tree (style property, removal, stylesheet) failed
    #[error("mutation failed: {message}")]
    Mutation {
        /// Error message
        message: String,
    },

    /// The host cannot apply this operation to this node kind
    #[error("unsupported on <{tag}>")]
    Unsupported {
        /// Tag name of the node
        tag: String,
    },

    /// Opaque exception raised by the host environment
    #[error("host error: {0}")]
    Host(String),
}

impl DomError {
    /// Create a style error
    #[must_use]
    pub fn style(message: impl Into<String>) -> Self {
        Self::StyleUnavailable {
            message: message.into(),
        }
    }

    /// Create a geometry error
    #[must_use]
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry {
            message: message.into(),
        }
    }

    /// Create a mutation error
    #[must_use]
    pub fn mutation(message: impl Into<String>) -> Self {
        Self::Mutation {
            message: message.into(),
        }
    }

    /// Create a query error
    #[must_use]
    pub fn query(selector: &str, message: impl Into<String>) -> Self {
        Self::Query {
            selector: selector.to_string(),
            message: message.into(),
        }
    }
}

/// Errors from bringing the engine up inside a host
#[derive(Debug, Error)]
pub enum UnveilError {
    /// No global `window` (worker or non-browser context)
    #[error("no window available")]
    NoWindow,

    /// Window without a document
    #[error("no document available")]
    NoDocument,

    /// Host wiring (observer, listener, timer) failed
    #[error("failed to wire {what}: {message}")]
    Wiring {
        /// What was being wired
        what: &'static str,
        /// Error message
        message: String,
    },
}
