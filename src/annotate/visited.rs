//! NodeSet - visited-fragment set for the in-memory `Document`
//!
//! Holds `NodeId`s, which are generation-checked handles and never own the
//! node they name. Once a fragment is removed from the document its id can
//! no longer resolve, and `prune` drops it.

use crate::dom::{Document, NodeId, VisitedSet};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    ids: HashSet<NodeId>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget ids of nodes that no longer exist. Returns how many were dropped.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| doc.contains(*id));
        before - self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.ids.iter()
    }
}

impl VisitedSet<NodeId> for NodeSet {
    fn contains(&self, node: &NodeId) -> bool {
        self.ids.contains(node)
    }

    fn insert(&mut self, node: &NodeId) {
        self.ids.insert(*node);
    }
}
