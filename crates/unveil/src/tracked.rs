//! Tracked Element Set
//!
//! Elements the neutralizer has already handled. Membership is checked before
//! classification and before neutralization, which is what keeps the
//! mutation observer from feeding on its own style writes.
//!
//! Entries are never removed. Handles are retained strongly for the life of
//! the document: a detached element can no longer block anything, and the
//! set dies with the engine when the document unloads. This is a bounded
//! leak (at most one entry per neutralized element, per document).

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// Identity-keyed set of neutralized elements
pub struct TrackedSet<N> {
    nodes: HashSet<N>,
}

impl<N> Default for TrackedSet<N> {
    fn default() -> Self {
        Self {
            nodes: HashSet::new(),
        }
    }
}

impl<N> fmt::Debug for TrackedSet<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedSet")
            .field("len", &self.nodes.len())
            .finish()
    }
}

impl<N: Eq + Hash> TrackedSet<N> {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `node` was already neutralized
    #[must_use]
    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains(node)
    }

    /// Record `node`; returns `false` if it was already present
    pub fn insert(&mut self, node: N) -> bool {
        self.nodes.insert(node)
    }

    /// Number of tracked elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing has been neutralized yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
