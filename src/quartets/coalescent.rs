//! Expected quartet concordance factors under the network multispecies
//! coalescent.
//!
//! The four sampled lineages start at their leaves and move upward through
//! the sub-network made of the leaves' ancestors, visited children first:
//! - On an edge of length `t` carrying `n` lineages, no coalescence happens
//!   with probability `exp(-C(n,2) t)`. Otherwise the first coalescing pair
//!   is uniform among the `C(n,2)` pairs.
//! - The first coalescence among the four lineages fixes the unrooted quartet
//!   topology (pair `{i,j}` gives split `ij|kl`), so a resolved configuration
//!   is not followed any further.
//! - At a hybrid node every lineage independently follows the major or the
//!   minor parent edge with probability γ.
//! - Lineages reaching the root unresolved coalesce there in uniform order.
//!
//! Concurrent coalescences on disjoint edges always imply the same split, so
//! accounting edges one after another is exact.

use crate::error::NetworkError;
use crate::model::{EdgeId, Network, NodeId};
use std::collections::{BTreeMap, HashSet};

/// Positions of the four unresolved lineages.
type Placement = [NodeId; 4];

/// Index of the quartet topology (ab|cd = 0, ac|bd = 1, ad|bc = 2) induced
/// by the first coalescence of lineages `i` and `j`.
pub fn split_of_pair(i: usize, j: usize) -> usize {
    let (i, j) = (i.min(j), i.max(j));
    if i == 0 {
        j - 1
    } else {
        // the lineage paired with 0 in the complement
        6 - i - j - 1
    }
}

/// Computes the expected concordance factors of the quartet `leaves`, in the
/// order (01|23, 02|13, 03|12).
///
/// # Errors
/// [NetworkError::InvalidTopology] if the network has no root, or
/// [NetworkError::UnknownNode] if a leaf id is stale.
pub fn expected_cf(net: &Network, leaves: [NodeId; 4]) -> Result<[f64; 3], NetworkError> {
    let order = net.post_order();
    expected_cf_in_order(net, leaves, &order)
}

/// As [expected_cf], reusing a precomputed children-first node order.
pub(crate) fn expected_cf_in_order(
    net: &Network,
    leaves: [NodeId; 4],
    order: &[NodeId],
) -> Result<[f64; 3], NetworkError> {
    let root = net.root_id()?;
    for leaf in leaves {
        net.node(leaf)?;
    }
    let ancestors = ancestors_of(net, &leaves);

    let mut cf = [0.0; 3];
    let mut states: BTreeMap<Placement, f64> = BTreeMap::from([(leaves, 1.0)]);
    for &node in order.iter().filter(|&n| ancestors.contains(n)) {
        let mut next: BTreeMap<Placement, f64> = BTreeMap::new();
        for (placement, probability) in states {
            let here: Vec<usize> = (0..4).filter(|&i| placement[i] == node).collect();
            if here.is_empty() {
                *next.entry(placement).or_insert(0.0) += probability;
            } else if node == root {
                coalesce_uniformly(&here, probability, &mut cf);
            } else {
                let parents = parent_edges_with_weights(net, node)?;
                lift(net, placement, probability, &here, &parents, &mut cf, &mut next)?;
            }
        }
        states = next;
    }
    Ok(cf)
}

/// Moves the lineages `here` through the parent edges of their node, for
/// every assignment of lineages to parent edges.
fn lift(
    net: &Network,
    placement: Placement,
    probability: f64,
    here: &[usize],
    parents: &[(EdgeId, NodeId, f64)],
    cf: &mut [f64; 3],
    next: &mut BTreeMap<Placement, f64>,
) -> Result<(), NetworkError> {
    let num_parents = parents.len();
    let num_assignments = num_parents.pow(here.len() as u32);
    for assignment in 0..num_assignments {
        let mut moved = placement;
        let mut weight = probability;
        let mut per_edge: Vec<Vec<usize>> = vec![Vec::new(); num_parents];
        let mut code = assignment;
        for &lineage in here {
            let choice = code % num_parents;
            code /= num_parents;
            let (_, parent, gamma) = parents[choice];
            weight *= gamma;
            moved[lineage] = parent;
            per_edge[choice].push(lineage);
        }

        for (lineages, &(edge, _, _)) in per_edge.iter().zip(parents) {
            let n = lineages.len();
            if n < 2 || weight == 0.0 {
                continue;
            }
            let length = net.edge(edge)?.length().map_or(0.0, |l| l.value());
            let pairs = (n * (n - 1) / 2) as f64;
            let survive = (-pairs * length).exp();
            let per_pair = weight * (1.0 - survive) / pairs;
            for (a, &i) in lineages.iter().enumerate() {
                for &j in &lineages[a + 1..] {
                    cf[split_of_pair(i, j)] += per_pair;
                }
            }
            weight *= survive;
        }
        if weight > 0.0 {
            *next.entry(moved).or_insert(0.0) += weight;
        }
    }
    Ok(())
}

fn coalesce_uniformly(here: &[usize], probability: f64, cf: &mut [f64; 3]) {
    let n = here.len();
    if n < 2 {
        return;
    }
    let per_pair = probability / (n * (n - 1) / 2) as f64;
    for (a, &i) in here.iter().enumerate() {
        for &j in &here[a + 1..] {
            cf[split_of_pair(i, j)] += per_pair;
        }
    }
}

/// Parent edges of `node` with their parent and inheritance weight.
fn parent_edges_with_weights(
    net: &Network,
    node: NodeId,
) -> Result<Vec<(EdgeId, NodeId, f64)>, NetworkError> {
    let parents: Vec<(EdgeId, NodeId, f64)> = net
        .parent_edges(node)
        .map(|e| net.edge(e).map(|edge| (e, edge.parent(), edge.gamma())))
        .collect::<Result<_, _>>()?;
    if parents.is_empty() {
        return Err(NetworkError::invalid_topology(format!(
            "{node} has no parent but is not the root"
        )));
    }
    Ok(parents)
}

fn ancestors_of(net: &Network, leaves: &[NodeId]) -> HashSet<NodeId> {
    let mut ancestors = HashSet::new();
    let mut stack: Vec<NodeId> = leaves.to_vec();
    while let Some(node) = stack.pop() {
        if ancestors.insert(node) {
            stack.extend(net.parents(node));
        }
    }
    ancestors
}
