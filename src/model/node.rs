//! Node module for phylogenetic network representation.

use crate::model::edge::EdgeId;
use std::fmt;

// =#========================================================================#=
// NODE ID
// =#========================================================================#=
/// Index of a node in the network arena.
///
/// Slots are never reused, so an id stays meaningful (e.g. in the undo
/// journal) after its node has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Returns the arena slot of this id.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// =#========================================================================#=
// NODE KIND
// =#========================================================================#=
/// Whether a node is a labelled leaf or an internal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Labelled taxon; exactly one incident edge
    Leaf(String),
    /// Unlabelled internal node (root, tree node or hybrid node)
    Internal,
}

// =#========================================================================#=
// NODE
// =#========================================================================#=
/// Represents a node of a phylogenetic network.
///
/// A node does not own its edges; it only keeps the ids of incident edges so
/// that neighbourhood queries are O(degree). Direction and edge type are
/// stored on the [Edge](crate::model::Edge).
///
/// # Derived state
/// `in_cycle`, `used_for_root` and `cycle_size` are markers maintained by
/// [crate::invariants]. They are never authoritative: the updater can always
/// rebuild them from the edge set.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) hybrid: bool,
    pub(crate) edges: Vec<EdgeId>,
    pub(crate) in_cycle: Option<NodeId>,
    pub(crate) used_for_root: bool,
    pub(crate) cycle_size: usize,
}

impl Node {
    pub(crate) fn new_leaf(id: NodeId, label: String) -> Self {
        Node {
            id,
            kind: NodeKind::Leaf(label),
            hybrid: false,
            edges: Vec::with_capacity(1),
            in_cycle: None,
            used_for_root: true,
            cycle_size: 0,
        }
    }

    pub(crate) fn new_internal(id: NodeId) -> Self {
        Node {
            id,
            kind: NodeKind::Internal,
            hybrid: false,
            edges: Vec::with_capacity(3),
            in_cycle: None,
            used_for_root: true,
            cycle_size: 0,
        }
    }

    /// Returns the id of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the kind of this node.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the label if this is a leaf, else `None`.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Leaf(label) => Some(label),
            NodeKind::Internal => None,
        }
    }

    /// Returns `true` if this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Returns `true` if this node has two incoming (hybrid) edges.
    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    /// Ids of all incident edges, in insertion order.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Number of incident edges.
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// Id of the hybrid whose reticulation cycle passes through this node.
    pub fn in_cycle(&self) -> Option<NodeId> {
        self.in_cycle
    }

    /// Returns `true` if the node lies on a reticulation cycle.
    pub fn is_in_cycle(&self) -> bool {
        self.in_cycle.is_some()
    }

    /// Whether the current root placement is compatible with this node,
    /// i.e. the node is neither a hybrid nor below one.
    pub fn is_used_for_root(&self) -> bool {
        self.used_for_root
    }

    /// For hybrid nodes, the number of nodes on its cycle; `0` otherwise.
    pub fn cycle_size(&self) -> usize {
        self.cycle_size
    }
}
