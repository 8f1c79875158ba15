//! Add Hybridization.

use super::{MoveConfig, adjacent, touch_neighbourhood};
use crate::error::NetworkError;
use crate::invariants::Footprint;
use crate::model::{BranchLength, EdgeId, Network};
use crate::moves::Move;
use rand::Rng;
use rand::seq::IndexedRandom;

pub(super) fn propose<R: Rng + ?Sized>(
    net: &Network,
    config: &MoveConfig,
    rng: &mut R,
) -> Result<Move, NetworkError> {
    if net.num_hybrids() >= config.max_hybrids {
        return Err(NetworkError::illegal_target(format!(
            "network already has the maximum of {} hybrids",
            config.max_hybrids
        )));
    }
    let candidates: Vec<EdgeId> = net
        .edges()
        .filter(|e| !e.is_in_cycle())
        .map(|e| e.id())
        .collect();

    for _ in 0..config.max_proposal_attempts {
        let (Some(&origin_edge), Some(&target_edge)) =
            (candidates.choose(rng), candidates.choose(rng))
        else {
            break;
        };
        if check_targets(net, origin_edge, target_edge).is_ok() {
            return Ok(Move::AddHybrid {
                origin_edge,
                target_edge,
                gamma: config.initial_gamma,
            });
        }
    }
    Err(NetworkError::illegal_target(
        "no edge pair admits a new hybridization",
    ))
}

/// The two edges must be distinct, non-adjacent, outside every cycle and
/// neither may lie above the other.
fn check_targets(net: &Network, origin: EdgeId, target: EdgeId) -> Result<(), NetworkError> {
    let (o, t) = (net.edge(origin)?, net.edge(target)?);
    if origin == target || adjacent(net, origin, target) {
        return Err(NetworkError::illegal_target(format!(
            "{origin} and {target} are identical or adjacent"
        )));
    }
    if o.is_in_cycle() || t.is_in_cycle() {
        return Err(NetworkError::illegal_target(format!(
            "{origin} or {target} lies on a cycle"
        )));
    }
    if net.is_edge_ancestor(origin, target) || net.is_edge_ancestor(target, origin) {
        return Err(NetworkError::illegal_target(format!(
            "{origin} and {target} are ancestor and descendant"
        )));
    }
    Ok(())
}

pub(super) fn edit(
    net: &mut Network,
    origin: EdgeId,
    target: EdgeId,
    gamma: f64,
    config: &MoveConfig,
) -> Result<Footprint, NetworkError> {
    if !(gamma > 0.0 && gamma < 1.0) {
        return Err(NetworkError::invalid_topology(format!(
            "γ of a new hybrid edge must lie in (0, 1), got {gamma}"
        )));
    }
    check_targets(net, origin, target)?;
    let length = BranchLength::try_new(config.initial_hybrid_length)?;

    let (from, _) = net.subdivide(origin)?;
    let (hybrid, _) = net.subdivide(target)?;
    let new_edge = net.connect_hybrid(from, hybrid, Some(length), gamma)?;

    let mut footprint = Footprint::new();
    touch_neighbourhood(net, from, &mut footprint);
    touch_neighbourhood(net, hybrid, &mut footprint);
    footprint.touch_edge(new_edge).retrace(hybrid);
    Ok(footprint)
}
