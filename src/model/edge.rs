//! Edge module for phylogenetic network representation.

use crate::error::NetworkError;
use crate::model::node::NodeId;
use std::fmt;
use std::ops::Deref;

// =#========================================================================#=
// EDGE ID
// =#========================================================================#=
/// Index of an edge in the network arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl EdgeId {
    /// Returns the arena slot of this id.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

// =#========================================================================#=
// EDGE
// =#========================================================================#=
/// Directed edge `parent -> child` of a phylogenetic network.
///
/// # Invariants
/// - Tree edges have `gamma == 1.0` and `is_major == true`.
/// - The two hybrid edges entering a hybrid node have γ summing to 1, and
///   exactly one of them is major.
/// - `in_cycle`, `contains_root` and `identifiable` are derived markers,
///   written only by [crate::invariants].
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub(crate) parent: NodeId,
    pub(crate) child: NodeId,
    pub(crate) length: Option<BranchLength>,
    pub(crate) hybrid: bool,
    pub(crate) gamma: f64,
    pub(crate) is_major: bool,
    pub(crate) in_cycle: Option<NodeId>,
    pub(crate) contains_root: bool,
    pub(crate) identifiable: bool,
}

impl Edge {
    pub(crate) fn new_tree(
        id: EdgeId,
        parent: NodeId,
        child: NodeId,
        length: Option<BranchLength>,
    ) -> Self {
        Edge {
            id,
            parent,
            child,
            length,
            hybrid: false,
            gamma: 1.0,
            is_major: true,
            in_cycle: None,
            contains_root: true,
            identifiable: true,
        }
    }

    pub(crate) fn new_hybrid(
        id: EdgeId,
        parent: NodeId,
        child: NodeId,
        length: Option<BranchLength>,
        gamma: f64,
        is_major: bool,
    ) -> Self {
        Edge {
            hybrid: true,
            gamma,
            is_major,
            contains_root: false,
            ..Edge::new_tree(id, parent, child, length)
        }
    }

    /// Returns the id of this edge.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Parent (tail) node.
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Child (head) node.
    pub fn child(&self) -> NodeId {
        self.child
    }

    /// Returns the endpoint that is not `node`.
    ///
    /// # Panics
    /// Panics (debug) if `node` is not an endpoint of this edge.
    pub fn other(&self, node: NodeId) -> NodeId {
        debug_assert!(node == self.parent || node == self.child);
        if node == self.parent {
            self.child
        } else {
            self.parent
        }
    }

    /// Returns whether `node` is one of the two endpoints.
    pub fn touches(&self, node: NodeId) -> bool {
        self.parent == node || self.child == node
    }

    /// Branch length, if known.
    pub fn length(&self) -> Option<BranchLength> {
        self.length
    }

    /// Returns `true` if this edge enters a hybrid node.
    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    /// Inheritance proportion; `1.0` for tree edges.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Returns `true` for tree edges and for the major hybrid edge.
    pub fn is_major(&self) -> bool {
        self.is_major
    }

    /// Id of the hybrid whose cycle contains this edge.
    pub fn in_cycle(&self) -> Option<NodeId> {
        self.in_cycle
    }

    /// Returns `true` if the edge lies on a reticulation cycle.
    pub fn is_in_cycle(&self) -> bool {
        self.in_cycle.is_some()
    }

    /// Whether the root may legally be placed on this edge.
    pub fn contains_root(&self) -> bool {
        self.contains_root
    }

    /// Whether this edge's length (and γ, for hybrid edges) can be estimated
    /// from quartet concordance factors.
    pub fn is_identifiable(&self) -> bool {
        self.identifiable
    }
}

// =#========================================================================#=
// BRANCH LENGTH
// =#========================================================================#=
/// Branch length in coalescent units, enforced non-negative.
///
/// The value is guaranteed to be non-negative and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BranchLength(f64);

impl BranchLength {
    /// Creates a new branch length.
    ///
    /// # Arguments
    /// * `length` - The branch length value (must be non-negative)
    ///
    /// # Panics
    /// Panics if `length` is negative or not finite.
    pub fn new(length: f64) -> Self {
        assert!(length >= 0.0, "Branch length must be non-negative, got {}", length);
        assert!(length.is_finite(), "Branch length must be finite, got {}", length);
        BranchLength(length)
    }

    /// Fallible version of [BranchLength::new].
    pub fn try_new(length: f64) -> Result<Self, NetworkError> {
        if length >= 0.0 && length.is_finite() {
            Ok(BranchLength(length))
        } else {
            Err(NetworkError::invalid_topology(format!(
                "branch length must be finite and non-negative, got {length}"
            )))
        }
    }

    /// Returns the inner value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Deref for BranchLength {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl fmt::Display for BranchLength {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
