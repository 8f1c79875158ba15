//! Arena-based phylogenetic network model with an undo journal.
//!
//! A [Network] owns all [Node]s and [Edge]s; they reference each other by
//! [NodeId] and [EdgeId] only. Derived markers (in-cycle, contains-root,
//! identifiable) live on nodes and edges but are written exclusively by
//! [crate::invariants]. Every write is journaled while a scope is open, see
//! [journal].

/// Edges, edge ids and branch lengths
pub mod edge;
/// Undo journal for reversible edits
pub mod journal;
/// The network itself
pub mod network;
/// Nodes and node ids
pub mod node;

pub use edge::{BranchLength, Edge, EdgeId};
pub use journal::{Change, EdgeAttr, Journal, NodeAttr};
pub use network::{GAMMA_TOLERANCE, Network};
pub use node::{Node, NodeId, NodeKind};
