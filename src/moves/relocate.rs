//! Relocation of an existing hybridization: move the origin of its minor
//! edge, or move the hybrid node itself, onto another edge.

use super::{MoveConfig, touch_neighbourhood};
use crate::error::NetworkError;
use crate::invariants::{self, Footprint};
use crate::model::{EdgeId, Network, NodeId};
use crate::moves::Move;
use rand::Rng;
use rand::seq::IndexedRandom;

/// Which end of a hybridization is relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Origin,
    Target,
}

pub(super) fn propose_origin<R: Rng + ?Sized>(
    net: &Network,
    config: &MoveConfig,
    rng: &mut R,
) -> Result<Move, NetworkError> {
    let (hybrid, target_edge) = propose(net, config, rng, End::Origin)?;
    Ok(Move::MoveOrigin { hybrid, target_edge })
}

pub(super) fn propose_target<R: Rng + ?Sized>(
    net: &Network,
    config: &MoveConfig,
    rng: &mut R,
) -> Result<Move, NetworkError> {
    let (hybrid, target_edge) = propose(net, config, rng, End::Target)?;
    Ok(Move::MoveTarget { hybrid, target_edge })
}

fn propose<R: Rng + ?Sized>(
    net: &Network,
    config: &MoveConfig,
    rng: &mut R,
    end: End,
) -> Result<(NodeId, EdgeId), NetworkError> {
    let hybrids: Vec<NodeId> = net.hybrids().map(|n| n.id()).collect();
    if hybrids.is_empty() {
        return Err(NetworkError::illegal_target("network has no hybrid to relocate"));
    }
    let edges: Vec<EdgeId> = net.edges().map(|e| e.id()).collect();
    for _ in 0..config.max_proposal_attempts {
        let (Some(&hybrid), Some(&edge)) = (hybrids.choose(rng), edges.choose(rng)) else {
            break;
        };
        let checked = match end {
            End::Origin => check_origin(net, hybrid, edge).map(|_| ()),
            End::Target => check_target(net, hybrid, edge),
        };
        if checked.is_ok() {
            return Ok((hybrid, edge));
        }
    }
    Err(NetworkError::illegal_target(format!(
        "no edge admits relocating a hybridization {}",
        match end {
            End::Origin => "origin",
            End::Target => "node",
        }
    )))
}

// ============================================================================
// Move origin
// ============================================================================
/// The new origin edge must lie outside every other cycle, must not touch the
/// current origin or the hybrid, and must not lie below the hybrid.
fn check_origin(net: &Network, hybrid: NodeId, target: EdgeId) -> Result<EdgeId, NetworkError> {
    let minor = net.minor_parent_edge(hybrid).ok_or_else(|| {
        NetworkError::illegal_target(format!("{hybrid} has no minor parent edge"))
    })?;
    let origin = net.edge(minor)?.parent();
    let t = net.edge(target)?;
    if t.in_cycle().is_some_and(|h| h != hybrid) {
        return Err(NetworkError::illegal_target(format!("{target} lies on another cycle")));
    }
    if t.touches(origin) || t.touches(hybrid) {
        return Err(NetworkError::illegal_target(format!(
            "{target} touches the current origin or the hybrid"
        )));
    }
    if net.is_ancestor(hybrid, t.parent()) {
        return Err(NetworkError::illegal_target(format!("{target} lies below {hybrid}")));
    }
    Ok(minor)
}

pub(super) fn edit_origin(
    net: &mut Network,
    hybrid: NodeId,
    target: EdgeId,
) -> Result<Footprint, NetworkError> {
    let minor = check_origin(net, hybrid, target)?;
    let origin = net.edge(minor)?.parent();

    let mut footprint = invariants::invalidate_cycle(net, hybrid)?;
    touch_neighbourhood(net, origin, &mut footprint);

    let (new_origin, _) = net.subdivide(target)?;
    net.redirect_parent(minor, new_origin)?;
    net.suppress(origin)?;
    if net.is_ancestor(hybrid, new_origin) {
        return Err(NetworkError::invalid_topology(format!(
            "moving the origin of {hybrid} would close a directed cycle"
        )));
    }

    touch_neighbourhood(net, new_origin, &mut footprint);
    touch_neighbourhood(net, hybrid, &mut footprint);
    footprint.retrace(hybrid);
    Ok(footprint)
}

// ============================================================================
// Move target
// ============================================================================
/// The new hybrid location must be a tree edge outside every cycle that does
/// not touch the hybrid, and its parent must differ from the minor parent.
fn check_target(net: &Network, hybrid: NodeId, target: EdgeId) -> Result<(), NetworkError> {
    let minor = net.minor_parent_edge(hybrid).ok_or_else(|| {
        NetworkError::illegal_target(format!("{hybrid} has no minor parent edge"))
    })?;
    let t = net.edge(target)?;
    if t.is_hybrid() || t.is_in_cycle() {
        return Err(NetworkError::illegal_target(format!(
            "{target} is a hybrid edge or lies on a cycle"
        )));
    }
    if t.touches(hybrid) || t.parent() == net.edge(minor)?.parent() {
        return Err(NetworkError::illegal_target(format!(
            "{target} touches {hybrid} or starts at its minor parent"
        )));
    }
    if net.is_ancestor(hybrid, t.parent()) {
        return Err(NetworkError::illegal_target(format!("{target} lies below {hybrid}")));
    }
    Ok(())
}

/// Cuts `hybrid` out from between its major parent and its child and
/// reinserts it on `target`; the minor edge keeps its origin.
pub(super) fn edit_target(
    net: &mut Network,
    hybrid: NodeId,
    target: EdgeId,
) -> Result<Footprint, NetworkError> {
    check_target(net, hybrid, target)?;
    let (Some(major), Some(minor)) = (net.major_parent_edge(hybrid), net.minor_parent_edge(hybrid))
    else {
        return Err(NetworkError::invalid_topology(format!(
            "hybrid {hybrid} lacks a major or minor parent edge"
        )));
    };
    let below: Vec<EdgeId> = net.child_edges(hybrid).collect();
    let [below] = below.as_slice() else {
        return Err(NetworkError::invalid_topology(format!(
            "hybrid {hybrid} must have exactly one child"
        )));
    };
    let below = *below;
    let major_parent = net.edge(major)?.parent();
    let new_parent = net.edge(target)?.parent();

    let mut footprint = invariants::invalidate_cycle(net, hybrid)?;
    touch_neighbourhood(net, hybrid, &mut footprint);
    touch_neighbourhood(net, new_parent, &mut footprint);

    net.redirect_parent(below, major_parent)?;
    net.redirect_parent(major, new_parent)?;
    net.redirect_parent(target, hybrid)?;

    let minor_parent = net.edge(minor)?.parent();
    if net.is_ancestor(hybrid, minor_parent) || net.is_ancestor(hybrid, new_parent) {
        return Err(NetworkError::invalid_topology(format!(
            "moving {hybrid} would close a directed cycle"
        )));
    }

    touch_neighbourhood(net, major_parent, &mut footprint);
    touch_neighbourhood(net, hybrid, &mut footprint);
    footprint.retrace(hybrid);
    Ok(footprint)
}
