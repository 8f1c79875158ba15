//! Error type shared by the network model, move operators, scorer and search.
//!
//! Everything that can go wrong during a topology search is locally
//! recoverable (an illegal move is rolled back, an optimizer failure falls
//! back to the previous parameters). Only [NetworkError::MalformedInput] is
//! meant to reach the caller of a search.

use crate::model::{EdgeId, NodeId};
use thiserror::Error;

/// Errors raised while building, editing, scoring or searching a network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// A structural edit would break acyclicity, the hybrid parent count,
    /// the γ-sum, or the level-1 (node-disjoint cycles) property.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// No valid location exists for the requested move.
    #[error("Illegal move target: {0}")]
    IllegalMoveTarget(String),

    /// The continuous optimizer did not converge within its budget.
    #[error("Optimizer failure after {evaluations} evaluations: {reason}")]
    OptimizerFailure { evaluations: usize, reason: String },

    /// Input data is inconsistent with the network (fatal).
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A node id that does not refer to a live node.
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    /// An edge id that does not refer to a live edge.
    #[error("Unknown edge {0}")]
    UnknownEdge(EdgeId),

    /// Misuse of the undo journal (nested begin, commit without begin, ...).
    #[error("Journal state: {0}")]
    JournalState(&'static str),
}

impl NetworkError {
    /// Convenience constructor for [NetworkError::InvalidTopology].
    pub fn invalid_topology(msg: impl Into<String>) -> Self {
        NetworkError::InvalidTopology(msg.into())
    }

    /// Convenience constructor for [NetworkError::IllegalMoveTarget].
    pub fn illegal_target(msg: impl Into<String>) -> Self {
        NetworkError::IllegalMoveTarget(msg.into())
    }

    /// Convenience constructor for [NetworkError::MalformedInput].
    pub fn malformed(msg: impl Into<String>) -> Self {
        NetworkError::MalformedInput(msg.into())
    }

    /// Whether a search can carry on after this error by discarding the
    /// current proposal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, NetworkError::MalformedInput(_))
    }
}
