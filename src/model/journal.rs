//! Undo journal for reversible in-place network edits.
//!
//! A [Journal] records, while a scope is open, the previous value of every
//! attribute the network writes, plus snapshots of created and removed
//! nodes/edges. Replaying the record in reverse restores the pre-edit state
//! exactly, so a speculative move costs time proportional to the size of the
//! edit rather than the size of the network.
//!
//! Only the first write to each (entity, attribute) pair is recorded within a
//! scope; replaying that single entry already restores the original value.

use crate::error::NetworkError;
use crate::model::edge::{BranchLength, Edge, EdgeId};
use crate::model::network::Network;
use crate::model::node::{Node, NodeId};
use std::collections::HashSet;
use std::mem::{Discriminant, discriminant};

// =#========================================================================#=
// CHANGE RECORDS
// =#========================================================================#=
/// Previous value of a single node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAttr {
    Hybrid(bool),
    InCycle(Option<NodeId>),
    UsedForRoot(bool),
    CycleSize(usize),
}

/// Previous value of a single edge attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeAttr {
    Parent(NodeId),
    Child(NodeId),
    Length(Option<BranchLength>),
    Hybrid(bool),
    Gamma(f64),
    Major(bool),
    InCycle(Option<NodeId>),
    ContainsRoot(bool),
    Identifiable(bool),
}

/// One (entity, attribute, previous value) entry of the journal.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Node slot before the write: `None` if the node was created,
    /// `Some` snapshot if it was removed.
    NodeSlot { id: NodeId, previous: Option<Node> },
    /// Edge slot before the write, as for nodes.
    EdgeSlot { id: EdgeId, previous: Option<Edge> },
    /// Node attribute before the write.
    Node { id: NodeId, previous: NodeAttr },
    /// Edge attribute before the write.
    Edge { id: EdgeId, previous: EdgeAttr },
    /// Incident edge list of a node before the write.
    Incidence { node: NodeId, previous: Vec<EdgeId> },
    /// Root before the write.
    Root { previous: Option<NodeId> },
}

/// Deduplication key: which attribute of which entity was already recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ChangeKey {
    Node(NodeId, Discriminant<NodeAttr>),
    Edge(EdgeId, Discriminant<EdgeAttr>),
    Incidence(NodeId),
    Root,
}

impl ChangeKey {
    pub(crate) fn node(id: NodeId, attr: &NodeAttr) -> Self {
        ChangeKey::Node(id, discriminant(attr))
    }

    pub(crate) fn edge(id: EdgeId, attr: &EdgeAttr) -> Self {
        ChangeKey::Edge(id, discriminant(attr))
    }
}

// =#========================================================================#=
// JOURNAL
// =#========================================================================#=
/// Recording scope for network edits. Scopes do not nest.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    open: bool,
    changes: Vec<Change>,
    touched: HashSet<ChangeKey>,
}

impl Journal {
    /// Returns whether a recording scope is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of entries recorded in the open scope.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Entries recorded so far, oldest first.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub(crate) fn begin(&mut self) -> Result<(), NetworkError> {
        if self.open {
            return Err(NetworkError::JournalState("a move is already in flight"));
        }
        self.open = true;
        self.changes.clear();
        self.touched.clear();
        Ok(())
    }

    /// Closes the scope and returns how many entries were discarded.
    pub(crate) fn commit(&mut self) -> Result<usize, NetworkError> {
        if !self.open {
            return Err(NetworkError::JournalState("commit without an open scope"));
        }
        let discarded = self.changes.len();
        self.open = false;
        self.changes.clear();
        self.touched.clear();
        Ok(discarded)
    }

    /// Closes the scope and hands the record over for replay.
    pub(crate) fn take(&mut self) -> Result<Vec<Change>, NetworkError> {
        if !self.open {
            return Err(NetworkError::JournalState("rollback without an open scope"));
        }
        self.open = false;
        self.touched.clear();
        Ok(std::mem::take(&mut self.changes))
    }

    /// Records a slot change (never deduplicated).
    pub(crate) fn record_slot(&mut self, change: impl FnOnce() -> Change) {
        if self.open {
            self.changes.push(change());
        }
    }

    /// Records an attribute change unless that attribute was already
    /// recorded in this scope.
    pub(crate) fn record(&mut self, key: ChangeKey, change: impl FnOnce() -> Change) {
        if self.open && self.touched.insert(key) {
            self.changes.push(change());
        }
    }
}

// ============================================================================
// Replay (crate)
// ============================================================================
impl Network {
    /// Restores the single entry `change`. Must be applied newest first.
    pub(super) fn revert(&mut self, change: Change) {
        match change {
            Change::NodeSlot { id, previous } => match previous {
                None => {
                    if id.index() + 1 == self.nodes.len() {
                        self.nodes.pop();
                    } else {
                        self.nodes[id.index()] = None;
                    }
                }
                Some(node) => self.nodes[id.index()] = Some(node),
            },
            Change::EdgeSlot { id, previous } => match previous {
                None => {
                    if id.index() + 1 == self.edges.len() {
                        self.edges.pop();
                    } else {
                        self.edges[id.index()] = None;
                    }
                }
                Some(edge) => self.edges[id.index()] = Some(edge),
            },
            Change::Node { id, previous } => {
                if let Some(node) = self.nodes[id.index()].as_mut() {
                    match previous {
                        NodeAttr::Hybrid(v) => node.hybrid = v,
                        NodeAttr::InCycle(v) => node.in_cycle = v,
                        NodeAttr::UsedForRoot(v) => node.used_for_root = v,
                        NodeAttr::CycleSize(v) => node.cycle_size = v,
                    }
                }
            }
            Change::Edge { id, previous } => {
                if let Some(edge) = self.edges[id.index()].as_mut() {
                    match previous {
                        EdgeAttr::Parent(v) => edge.parent = v,
                        EdgeAttr::Child(v) => edge.child = v,
                        EdgeAttr::Length(v) => edge.length = v,
                        EdgeAttr::Hybrid(v) => edge.hybrid = v,
                        EdgeAttr::Gamma(v) => edge.gamma = v,
                        EdgeAttr::Major(v) => edge.is_major = v,
                        EdgeAttr::InCycle(v) => edge.in_cycle = v,
                        EdgeAttr::ContainsRoot(v) => edge.contains_root = v,
                        EdgeAttr::Identifiable(v) => edge.identifiable = v,
                    }
                }
            }
            Change::Incidence { node, previous } => {
                if let Some(node) = self.nodes[node.index()].as_mut() {
                    node.edges = previous;
                }
            }
            Change::Root { previous } => self.root = previous,
        }
    }
}
