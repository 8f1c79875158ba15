//! Delete Hybridization.

use super::touch_neighbourhood;
use crate::error::NetworkError;
use crate::invariants::{self, Footprint};
use crate::model::{Network, NodeId};
use crate::moves::Move;
use rand::Rng;
use rand::seq::IndexedRandom;

pub(super) fn propose<R: Rng + ?Sized>(net: &Network, rng: &mut R) -> Result<Move, NetworkError> {
    let hybrids: Vec<NodeId> = net.hybrids().map(|n| n.id()).collect();
    let hybrid = *hybrids
        .choose(rng)
        .ok_or_else(|| NetworkError::illegal_target("network has no hybrid to delete"))?;
    Ok(Move::DeleteHybrid {
        hybrid,
        remove_minor: rng.random_bool(0.5),
    })
}

/// Removes one parent edge of `hybrid`, turns the other into a tree edge and
/// suppresses `hybrid` and the detached parent.
pub(super) fn edit(
    net: &mut Network,
    hybrid: NodeId,
    remove_minor: bool,
) -> Result<Footprint, NetworkError> {
    if !net.node(hybrid)?.is_hybrid() {
        return Err(NetworkError::illegal_target(format!("{hybrid} is not a hybrid")));
    }
    let (removed, kept) = match (net.minor_parent_edge(hybrid), net.major_parent_edge(hybrid)) {
        (Some(minor), Some(major)) if remove_minor => (minor, major),
        (Some(minor), Some(major)) => (major, minor),
        _ => {
            return Err(NetworkError::invalid_topology(format!(
                "hybrid {hybrid} lacks a major or minor parent edge"
            )));
        }
    };
    let detached = net.edge(removed)?.parent();

    let mut footprint = invariants::invalidate_cycle(net, hybrid)?;
    touch_neighbourhood(net, hybrid, &mut footprint);
    touch_neighbourhood(net, detached, &mut footprint);

    net.remove_edge(removed)?;
    net.make_tree_edge(kept)?;
    net.set_node_hybrid(hybrid, false)?;
    net.suppress(hybrid)?;

    let num_parents = net.parent_edges(detached).count();
    let num_children = net.child_edges(detached).count();
    // A root left with one child hands the root to it; in an acyclic network
    // with every node below the root that child is neither a leaf nor a hybrid.
    if num_children == 1 && (num_parents == 1 || net.root() == Some(detached)) {
        net.suppress(detached)?;
    }
    Ok(footprint)
}
