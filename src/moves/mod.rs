//! Reversible move operators on a [Network].
//!
//! A [Move] is a fully specified structural edit. It is obtained either
//! directly (directed choice) or from [Move::propose] (random choice) and
//! executed with [Move::apply]:
//! 1. a journal scope is opened,
//! 2. the edit is performed through the journaled primitives of [Network],
//! 3. the affected markers are re-derived by [crate::invariants::update_after].
//!
//! If any step fails, `apply` rolls the network back itself and returns the
//! error. On success the scope stays open: the caller scores the candidate
//! and then either [Network::commit]s or [Network::rollback]s.
//!
//! ```
//! use hybridnet::model::{BranchLength, Network};
//! use hybridnet::moves::{Move, MoveConfig};
//!
//! # let mut net = Network::new();
//! # let leaves: Vec<_> = ["A", "B", "C", "D"].iter().map(|l| net.add_leaf(*l)).collect();
//! # let (u, v, r) = (net.add_internal(), net.add_internal(), net.add_internal());
//! # let len = Some(BranchLength::new(1.0));
//! # net.connect(u, leaves[0], len)?;
//! # net.connect(u, leaves[1], len)?;
//! # net.connect(v, leaves[2], len)?;
//! # net.connect(v, leaves[3], len)?;
//! # net.connect(r, u, len)?;
//! # let rv = net.connect(r, v, len)?;
//! # net.set_root(r)?;
//! # net.finalize()?;
//! let before = net.clone();
//! let edges: Vec<_> = net.child_edges(u).collect();
//! let add = Move::AddHybrid { origin_edge: edges[0], target_edge: rv, gamma: 0.3 };
//! add.apply(&mut net, &MoveConfig::default())?;
//! assert_eq!(net.num_hybrids(), 1);
//!
//! net.rollback()?;
//! assert_eq!(net, before);
//! # Ok::<(), hybridnet::NetworkError>(())
//! ```

mod add_hybrid;
mod delete_hybrid;
mod nni;
mod relocate;

use crate::error::NetworkError;
use crate::invariants::{self, Footprint};
use crate::model::{EdgeId, Network, NodeId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// =#========================================================================#=
// MOVE CONFIG
// =#========================================================================#=
/// Parameters shared by all move operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    /// Maximum number of hybrid nodes a network may carry.
    pub max_hybrids: usize,
    /// γ given to the new minor edge by Add Hybridization.
    pub initial_gamma: f64,
    /// Length given to the new hybrid edge by Add Hybridization.
    pub initial_hybrid_length: f64,
    /// Random draws before a proposal gives up with `IllegalMoveTarget`.
    pub max_proposal_attempts: usize,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            max_hybrids: 1,
            initial_gamma: 0.5,
            initial_hybrid_length: 0.1,
            max_proposal_attempts: 100,
        }
    }
}

impl MoveConfig {
    /// Sets the maximum number of hybrid nodes.
    pub fn with_max_hybrids(mut self, max_hybrids: usize) -> Self {
        self.max_hybrids = max_hybrids;
        self
    }

    /// Sets the γ of newly added minor hybrid edges.
    pub fn with_initial_gamma(mut self, gamma: f64) -> Self {
        self.initial_gamma = gamma;
        self
    }

    /// Sets the length of newly added hybrid edges.
    pub fn with_initial_hybrid_length(mut self, length: f64) -> Self {
        self.initial_hybrid_length = length;
        self
    }

    /// Sets how many random draws a proposal may take.
    pub fn with_max_proposal_attempts(mut self, attempts: usize) -> Self {
        self.max_proposal_attempts = attempts;
        self
    }
}

// =#========================================================================#=
// MOVE KIND
// =#========================================================================#=
/// Operator selector used for random proposals and per-operator weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    AddHybrid,
    DeleteHybrid,
    Nni,
    MoveOrigin,
    MoveTarget,
}

impl MoveKind {
    /// All operators, in declaration order.
    pub const ALL: [MoveKind; 5] = [
        MoveKind::AddHybrid,
        MoveKind::DeleteHybrid,
        MoveKind::Nni,
        MoveKind::MoveOrigin,
        MoveKind::MoveTarget,
    ];
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MoveKind::AddHybrid => "add-hybrid",
            MoveKind::DeleteHybrid => "delete-hybrid",
            MoveKind::Nni => "nni",
            MoveKind::MoveOrigin => "move-origin",
            MoveKind::MoveTarget => "move-target",
        };
        f.write_str(name)
    }
}

// =#========================================================================#=
// MOVE
// =#========================================================================#=
/// A fully specified structural edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Move {
    /// Subdivide `origin_edge` (new node m) and `target_edge` (new hybrid h)
    /// and connect `m -> h` as minor hybrid edge with γ = `gamma`.
    AddHybrid {
        origin_edge: EdgeId,
        target_edge: EdgeId,
        gamma: f64,
    },
    /// Remove the minor (or major) parent edge of `hybrid` and suppress the
    /// nodes left with one parent and one child.
    DeleteHybrid { hybrid: NodeId, remove_minor: bool },
    /// Nearest-neighbour interchange across internal tree edge `edge`: the
    /// sibling subtree of the edge's child swaps places with its first
    /// (`swap_left`) or second child subtree.
    Nni { edge: EdgeId, swap_left: bool },
    /// Reattach the origin of the minor edge of `hybrid` onto `target_edge`.
    MoveOrigin { hybrid: NodeId, target_edge: EdgeId },
    /// Move `hybrid` (with its minor edge) onto `target_edge`.
    MoveTarget { hybrid: NodeId, target_edge: EdgeId },
}

impl Move {
    /// The operator of this move.
    pub fn kind(&self) -> MoveKind {
        match self {
            Move::AddHybrid { .. } => MoveKind::AddHybrid,
            Move::DeleteHybrid { .. } => MoveKind::DeleteHybrid,
            Move::Nni { .. } => MoveKind::Nni,
            Move::MoveOrigin { .. } => MoveKind::MoveOrigin,
            Move::MoveTarget { .. } => MoveKind::MoveTarget,
        }
    }

    /// Draws a random move of the given kind whose targets pass the
    /// operator's local legality checks.
    ///
    /// # Errors
    /// [NetworkError::IllegalMoveTarget] if no candidate exists (e.g. no
    /// hybrid to delete, hybrid cap reached) or none was found within
    /// `config.max_proposal_attempts` draws.
    pub fn propose<R: Rng + ?Sized>(
        kind: MoveKind,
        net: &Network,
        config: &MoveConfig,
        rng: &mut R,
    ) -> Result<Move, NetworkError> {
        match kind {
            MoveKind::AddHybrid => add_hybrid::propose(net, config, rng),
            MoveKind::DeleteHybrid => delete_hybrid::propose(net, rng),
            MoveKind::Nni => nni::propose(net, config, rng),
            MoveKind::MoveOrigin => relocate::propose_origin(net, config, rng),
            MoveKind::MoveTarget => relocate::propose_target(net, config, rng),
        }
    }

    /// Applies the move inside a new journal scope and updates the markers.
    ///
    /// # Returns
    /// The footprint of the edit. The journal scope stays open.
    ///
    /// # Errors
    /// [NetworkError::IllegalMoveTarget] if the move is not applicable here,
    /// [NetworkError::InvalidTopology] if the result would be invalid, and
    /// [NetworkError::JournalState] if another move is in flight. In every
    /// error case except the last the network is rolled back and unchanged.
    pub fn apply(&self, net: &mut Network, config: &MoveConfig) -> Result<Footprint, NetworkError> {
        if let Move::AddHybrid { .. } = self {
            if net.num_hybrids() >= config.max_hybrids {
                return Err(NetworkError::illegal_target(format!(
                    "network already has the maximum of {} hybrids",
                    config.max_hybrids
                )));
            }
        }

        net.begin()?;
        let result = self.edit(net, config).and_then(|footprint| {
            invariants::update_after(net, &footprint)?;
            Ok(footprint)
        });
        match result {
            Ok(footprint) => {
                debug!(mv = %self, journal = net.journal().len(), "move applied");
                Ok(footprint)
            }
            Err(err) => {
                net.rollback()?;
                debug!(mv = %self, %err, "move rejected and rolled back");
                Err(err)
            }
        }
    }

    fn edit(&self, net: &mut Network, config: &MoveConfig) -> Result<Footprint, NetworkError> {
        match *self {
            Move::AddHybrid { origin_edge, target_edge, gamma } => {
                add_hybrid::edit(net, origin_edge, target_edge, gamma, config)
            }
            Move::DeleteHybrid { hybrid, remove_minor } => {
                delete_hybrid::edit(net, hybrid, remove_minor)
            }
            Move::Nni { edge, swap_left } => nni::edit(net, edge, swap_left),
            Move::MoveOrigin { hybrid, target_edge } => {
                relocate::edit_origin(net, hybrid, target_edge)
            }
            Move::MoveTarget { hybrid, target_edge } => {
                relocate::edit_target(net, hybrid, target_edge)
            }
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Move::AddHybrid { origin_edge, target_edge, gamma } => {
                write!(f, "add-hybrid({origin_edge} -> {target_edge}, γ={gamma})")
            }
            Move::DeleteHybrid { hybrid, remove_minor } => {
                let which = if *remove_minor { "minor" } else { "major" };
                write!(f, "delete-hybrid({hybrid}, {which})")
            }
            Move::Nni { edge, swap_left } => {
                let side = if *swap_left { "left" } else { "right" };
                write!(f, "nni({edge}, {side})")
            }
            Move::MoveOrigin { hybrid, target_edge } => {
                write!(f, "move-origin({hybrid} -> {target_edge})")
            }
            Move::MoveTarget { hybrid, target_edge } => {
                write!(f, "move-target({hybrid} -> {target_edge})")
            }
        }
    }
}

// ============================================================================
// Shared helpers (crate)
// ============================================================================
/// Touches every node adjacent to `node` (and `node` itself).
pub(crate) fn touch_neighbourhood(net: &Network, node: NodeId, footprint: &mut Footprint) {
    footprint.touch_node(node);
    for &edge in net.incident_edges(node) {
        footprint.touch_edge(edge);
        if let Ok(e) = net.edge(edge) {
            footprint.touch_node(e.other(node));
        }
    }
}

/// Returns whether the two edges share an endpoint.
pub(crate) fn adjacent(net: &Network, first: EdgeId, second: EdgeId) -> bool {
    match (net.edge(first), net.edge(second)) {
        (Ok(a), Ok(b)) => a.touches(b.parent()) || a.touches(b.child()),
        _ => false,
    }
}
