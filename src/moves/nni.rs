//! Nearest-neighbour interchange restricted to tree-like neighbourhoods.

use super::{MoveConfig, touch_neighbourhood};
use crate::error::NetworkError;
use crate::invariants::Footprint;
use crate::model::{EdgeId, Network};
use crate::moves::Move;
use rand::Rng;
use rand::seq::IndexedRandom;

pub(super) fn propose<R: Rng + ?Sized>(
    net: &Network,
    config: &MoveConfig,
    rng: &mut R,
) -> Result<Move, NetworkError> {
    let candidates: Vec<EdgeId> = net
        .edges()
        .filter(|e| !e.is_hybrid() && !e.is_in_cycle())
        .map(|e| e.id())
        .collect();
    for _ in 0..config.max_proposal_attempts {
        let Some(&edge) = candidates.choose(rng) else {
            break;
        };
        let swap_left = rng.random_bool(0.5);
        if swap_partners(net, edge, swap_left).is_ok() {
            return Ok(Move::Nni { edge, swap_left });
        }
    }
    Err(NetworkError::illegal_target("no internal tree edge admits an interchange"))
}

/// Returns the sibling edge (below the parent of `edge`) and the child edge
/// (below the child of `edge`) that trade places.
fn swap_partners(
    net: &Network,
    edge: EdgeId,
    swap_left: bool,
) -> Result<(EdgeId, EdgeId), NetworkError> {
    let e = net.edge(edge)?;
    let (upper, lower) = (e.parent(), e.child());
    if e.is_hybrid() || e.is_in_cycle() {
        return Err(NetworkError::illegal_target(format!(
            "{edge} is a hybrid edge or lies on a cycle"
        )));
    }
    for node in [upper, lower] {
        let n = net.node(node)?;
        if n.is_leaf() || n.is_hybrid() || n.is_in_cycle() {
            return Err(NetworkError::illegal_target(format!(
                "interchange around {node} would touch a leaf edge or a cycle"
            )));
        }
    }

    let sibling = net.child_edges(upper).find(|&s| s != edge).ok_or_else(|| {
        NetworkError::illegal_target(format!("{upper} has no second child"))
    })?;
    let mut below: Vec<EdgeId> = net.child_edges(lower).collect();
    below.sort();
    let index = if swap_left { 0 } else { 1 };
    let child = *below.get(index).ok_or_else(|| {
        NetworkError::illegal_target(format!("{lower} has fewer than two children"))
    })?;
    for partner in [sibling, child] {
        let p = net.edge(partner)?;
        if p.is_hybrid() || p.is_in_cycle() {
            return Err(NetworkError::illegal_target(format!(
                "{partner} is a hybrid edge or lies on a cycle"
            )));
        }
    }
    Ok((sibling, child))
}

pub(super) fn edit(net: &mut Network, edge: EdgeId, swap_left: bool) -> Result<Footprint, NetworkError> {
    let (sibling, child) = swap_partners(net, edge, swap_left)?;
    let e = net.edge(edge)?;
    let (upper, lower) = (e.parent(), e.child());

    net.redirect_parent(sibling, lower)?;
    net.redirect_parent(child, upper)?;

    let mut footprint = Footprint::new();
    touch_neighbourhood(net, upper, &mut footprint);
    touch_neighbourhood(net, lower, &mut footprint);
    Ok(footprint)
}
