//! Invariant updater for the derived network markers.
//!
//! Three marker families are derived from the edge set:
//! - **in-cycle**: for each hybrid `h`, the nodes and edges of its
//!   reticulation cycle carry `Some(h)`; `h` also stores the cycle size.
//! - **used-for-root / contains-root**: a node is usable for the root iff it
//!   is no hybrid and all its parents are usable; an edge can hold the root
//!   iff it is a tree edge into a usable node.
//! - **identifiable**: whether an edge's length (and γ for hybrid edges) can
//!   be estimated from quartet concordance factors.
//!
//! [recompute] derives all markers from scratch (pure). [update_after]
//! re-derives only the region a move touched, described by a [Footprint],
//! writing through the journaled setters of [Network] so that a rollback also
//! restores the markers. Both must always agree, which [verify] checks.

use crate::error::NetworkError;
use crate::model::{Edge, EdgeId, Network, NodeId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use tracing::trace;

// =#========================================================================#=
// FOOTPRINT
// =#========================================================================#=
/// Region of the network affected by a structural edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    nodes: BTreeSet<NodeId>,
    edges: BTreeSet<EdgeId>,
    retrace: BTreeSet<NodeId>,
}

impl Footprint {
    /// Creates an empty footprint.
    pub fn new() -> Self {
        Footprint::default()
    }

    /// Marks a node whose incidence or hybrid status changed.
    pub fn touch_node(&mut self, node: NodeId) -> &mut Self {
        self.nodes.insert(node);
        self
    }

    /// Marks an edge that was created, redirected or retyped.
    pub fn touch_edge(&mut self, edge: EdgeId) -> &mut Self {
        self.edges.insert(edge);
        self
    }

    /// Requests the cycle of `hybrid` to be traced again.
    pub fn retrace(&mut self, hybrid: NodeId) -> &mut Self {
        self.retrace.insert(hybrid);
        self
    }

    /// Merges another footprint into this one.
    pub fn extend(&mut self, other: Footprint) -> &mut Self {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.retrace.extend(other.retrace);
        self
    }

    /// Touched nodes.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Touched edges.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    /// Returns `true` if nothing was touched.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.retrace.is_empty()
    }
}

// =#========================================================================#=
// MARKER SNAPSHOT
// =#========================================================================#=
/// Marker values of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMarkers {
    pub in_cycle: Option<NodeId>,
    pub used_for_root: bool,
    pub cycle_size: usize,
}

/// Marker values of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeMarkers {
    pub in_cycle: Option<NodeId>,
    pub contains_root: bool,
    pub identifiable: bool,
}

/// All markers of a network, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSnapshot {
    pub nodes: BTreeMap<NodeId, NodeMarkers>,
    pub edges: BTreeMap<EdgeId, EdgeMarkers>,
}

impl MarkerSnapshot {
    /// Reads the markers currently stored on the network.
    pub fn capture(net: &Network) -> Self {
        let nodes = net
            .nodes()
            .map(|n| {
                let markers = NodeMarkers {
                    in_cycle: n.in_cycle(),
                    used_for_root: n.is_used_for_root(),
                    cycle_size: n.cycle_size(),
                };
                (n.id(), markers)
            })
            .collect();
        let edges = net
            .edges()
            .map(|e| {
                let markers = EdgeMarkers {
                    in_cycle: e.in_cycle(),
                    contains_root: e.contains_root(),
                    identifiable: e.is_identifiable(),
                };
                (e.id(), markers)
            })
            .collect();
        MarkerSnapshot { nodes, edges }
    }

    /// Describes the first difference to `other`, if any.
    pub fn first_difference(&self, other: &MarkerSnapshot) -> Option<String> {
        for (id, mine) in &self.nodes {
            match other.nodes.get(id) {
                Some(theirs) if theirs == mine => {}
                theirs => return Some(format!("node {id}: {mine:?} vs {theirs:?}")),
            }
        }
        for (id, mine) in &self.edges {
            match other.edges.get(id) {
                Some(theirs) if theirs == mine => {}
                theirs => return Some(format!("edge {id}: {mine:?} vs {theirs:?}")),
            }
        }
        if self.nodes.len() != other.nodes.len() || self.edges.len() != other.edges.len() {
            return Some("different number of nodes or edges".to_string());
        }
        None
    }
}

// ============================================================================
// Full recomputation (pub)
// ============================================================================
/// Derives every marker from scratch without touching the network.
///
/// # Errors
/// [NetworkError::InvalidTopology] if two reticulation cycles share a node
/// (not level-1), if a hybrid lacks a major or minor parent edge, or if no
/// edge below the root can hold the root.
pub fn recompute(net: &Network) -> Result<MarkerSnapshot, NetworkError> {
    let root = net.root_id()?;

    let mut node_cycle: HashMap<NodeId, NodeId> = HashMap::new();
    let mut edge_cycle: HashMap<EdgeId, NodeId> = HashMap::new();
    let mut cycle_sizes: HashMap<NodeId, usize> = HashMap::new();
    for hybrid in net.hybrids().map(|n| n.id()).collect::<Vec<_>>() {
        let cycle = trace_cycle(net, hybrid)?;
        for &node in &cycle.nodes {
            if let Some(other) = node_cycle.insert(node, hybrid) {
                return Err(level_one_violation(node, other, hybrid));
            }
        }
        for &edge in &cycle.edges {
            edge_cycle.insert(edge, hybrid);
        }
        cycle_sizes.insert(hybrid, cycle.nodes.len());
    }

    let mut used: HashMap<NodeId, bool> = HashMap::new();
    for node in net.post_order().into_iter().rev() {
        let value = derive_used_for_root(net, node, root, |p| used.get(&p).copied().unwrap_or(false));
        used.insert(node, value);
    }

    let mut snapshot = MarkerSnapshot::default();
    for node in net.nodes() {
        let id = node.id();
        snapshot.nodes.insert(
            id,
            NodeMarkers {
                in_cycle: node_cycle.get(&id).copied(),
                used_for_root: used.get(&id).copied().unwrap_or(false),
                cycle_size: cycle_sizes.get(&id).copied().unwrap_or(0),
            },
        );
    }
    for edge in net.edges() {
        let id = edge.id();
        let in_cycle = edge_cycle.get(&id).copied();
        let contains_root = !edge.is_hybrid() && used.get(&edge.child()).copied().unwrap_or(false);
        let identifiable = derive_identifiable(net, edge, in_cycle, root, |h| {
            cycle_sizes.get(&h).copied().unwrap_or(0)
        });
        snapshot.edges.insert(id, EdgeMarkers { in_cycle, contains_root, identifiable });
    }

    check_root_placement(net, root, |e| snapshot.edges.get(&e).is_some_and(|m| m.contains_root))?;
    Ok(snapshot)
}

/// Recomputes all markers and writes them to the network.
pub fn refresh_all(net: &mut Network) -> Result<(), NetworkError> {
    let snapshot = recompute(net)?;
    for (&id, markers) in &snapshot.nodes {
        net.set_node_in_cycle(id, markers.in_cycle)?;
        net.set_node_used_for_root(id, markers.used_for_root)?;
        net.set_cycle_size(id, markers.cycle_size)?;
    }
    for (&id, markers) in &snapshot.edges {
        net.set_edge_in_cycle(id, markers.in_cycle)?;
        net.set_edge_contains_root(id, markers.contains_root)?;
        net.set_edge_identifiable(id, markers.identifiable)?;
    }
    Ok(())
}

/// Checks that the stored markers equal a from-scratch recomputation.
pub fn verify(net: &Network) -> Result<(), NetworkError> {
    let expected = recompute(net)?;
    match expected.first_difference(&MarkerSnapshot::capture(net)) {
        None => Ok(()),
        Some(diff) => Err(NetworkError::invalid_topology(format!(
            "stale marker (expected vs stored) at {diff}"
        ))),
    }
}

// ============================================================================
// Incremental update (pub)
// ============================================================================
/// Clears the cycle markers of `hybrid` by walking its marked cycle.
///
/// Call before editing edges of the cycle. Returns the cleared region, which
/// the caller should merge into the footprint of its edit.
pub fn invalidate_cycle(net: &mut Network, hybrid: NodeId) -> Result<Footprint, NetworkError> {
    let mut cleared = Footprint::new();
    let mut queue = VecDeque::from([hybrid]);
    let mut seen = HashSet::from([hybrid]);
    while let Some(node) = queue.pop_front() {
        cleared.touch_node(node);
        for &edge in net.incident_edges(node) {
            let e = net.edge(edge)?;
            if e.in_cycle() != Some(hybrid) {
                continue;
            }
            cleared.touch_edge(edge);
            let next = e.other(node);
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    for node in cleared.nodes.clone() {
        if net.node(node)?.in_cycle() == Some(hybrid) {
            net.set_node_in_cycle(node, None)?;
        }
    }
    for edge in cleared.edges.clone() {
        net.set_edge_in_cycle(edge, None)?;
    }
    net.set_cycle_size(hybrid, 0)?;
    Ok(cleared)
}

/// Re-derives the markers of the region described by `footprint`.
///
/// Cycles listed for retracing are cleared and traced again; the
/// used-for-root marker is propagated downward from the touched nodes by a
/// worklist until nothing changes; contains-root and identifiable are then
/// re-derived for every edge whose inputs may have changed.
///
/// # Errors
/// [NetworkError::InvalidTopology] if a traced cycle shares a node with
/// another cycle or the root can no longer be placed. The network is left
/// partially updated; the caller rolls back.
pub fn update_after(net: &mut Network, footprint: &Footprint) -> Result<(), NetworkError> {
    let root = net.root_id()?;
    let mut region = footprint.clone();

    // in-cycle
    let retrace: Vec<NodeId> = footprint
        .retrace
        .iter()
        .copied()
        .filter(|&h| net.node(h).is_ok_and(|n| n.is_hybrid()))
        .collect();
    for &hybrid in &retrace {
        let cleared = invalidate_cycle(net, hybrid)?;
        region.extend(cleared);
    }
    for &hybrid in &retrace {
        let cycle = trace_cycle(net, hybrid)?;
        for &node in &cycle.nodes {
            match net.node(node)?.in_cycle() {
                Some(other) if other != hybrid => {
                    return Err(level_one_violation(node, other, hybrid));
                }
                _ => net.set_node_in_cycle(node, Some(hybrid))?,
            }
            region.touch_node(node);
        }
        for &edge in &cycle.edges {
            net.set_edge_in_cycle(edge, Some(hybrid))?;
            region.touch_edge(edge);
        }
        net.set_cycle_size(hybrid, cycle.nodes.len())?;
    }

    // used-for-root, worklist from the touched nodes downward
    let mut worklist: VecDeque<NodeId> = region
        .nodes
        .iter()
        .copied()
        .chain(region.edges.iter().filter_map(|&e| net.edge(e).ok().map(Edge::child)))
        .filter(|&n| net.contains_node(n))
        .collect();
    let mut visited: BTreeSet<NodeId> = BTreeSet::new();
    while let Some(node) = worklist.pop_front() {
        visited.insert(node);
        let value = derive_used_for_root(net, node, root, |p| {
            net.node(p).is_ok_and(|n| n.is_used_for_root())
        });
        if net.node(node)?.is_used_for_root() != value {
            net.set_node_used_for_root(node, value)?;
            worklist.extend(net.children(node).collect::<Vec<_>>());
        }
    }

    // contains-root and identifiable
    let mut edges: BTreeSet<EdgeId> = region.edges.clone();
    for &node in region.nodes.iter().chain(visited.iter()) {
        edges.extend(net.incident_edges(node).iter().copied());
    }
    edges.extend(net.child_edges(root));
    for edge in edges {
        let Ok(e) = net.edge(edge) else {
            continue;
        };
        let contains_root = !e.is_hybrid() && net.node(e.child())?.is_used_for_root();
        let identifiable = derive_identifiable(net, e, e.in_cycle(), root, |h| {
            net.node(h).map_or(0, |n| n.cycle_size())
        });
        net.set_edge_contains_root(edge, contains_root)?;
        net.set_edge_identifiable(edge, identifiable)?;
    }

    trace!(
        nodes = visited.len(),
        retraced = retrace.len(),
        "markers updated incrementally"
    );
    check_root_placement(net, root, |e| net.edge(e).is_ok_and(|e| e.contains_root()))
}

// ============================================================================
// Helpers (private)
// ============================================================================
/// Nodes and edges of one reticulation cycle.
#[derive(Debug)]
struct Cycle {
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
}

/// Traces the cycle of `hybrid`: the shortest undirected path from the major
/// parent to the minor parent that avoids `hybrid`, the minor edge and leaves,
/// closed by both hybrid edges.
fn trace_cycle(net: &Network, hybrid: NodeId) -> Result<Cycle, NetworkError> {
    let (Some(major), Some(minor)) = (net.major_parent_edge(hybrid), net.minor_parent_edge(hybrid))
    else {
        return Err(NetworkError::invalid_topology(format!(
            "hybrid {hybrid} needs a major and a minor parent edge"
        )));
    };
    let start = net.edge(major)?.parent();
    let target = net.edge(minor)?.parent();
    if start == target {
        return Err(NetworkError::invalid_topology(format!(
            "parallel hybrid edges into {hybrid}"
        )));
    }

    let mut dist: HashMap<NodeId, usize> = HashMap::from([(start, 0)]);
    let mut previous: HashMap<NodeId, (NodeId, EdgeId)> = HashMap::new();
    let mut queue = BinaryHeap::from([Reverse((0usize, start))]);
    while let Some(Reverse((d, node))) = queue.pop() {
        if node == target {
            break;
        }
        if dist.get(&node).is_some_and(|&best| d > best) {
            continue;
        }
        for &edge in net.incident_edges(node) {
            if edge == minor || edge == major {
                continue;
            }
            let next = net.edge(edge)?.other(node);
            if next == hybrid || net.node(next)?.is_leaf() {
                continue;
            }
            if dist.get(&next).is_none_or(|&best| d + 1 < best) {
                dist.insert(next, d + 1);
                previous.insert(next, (node, edge));
                queue.push(Reverse((d + 1, next)));
            }
        }
    }

    if !dist.contains_key(&target) {
        return Err(NetworkError::invalid_topology(format!(
            "no cycle closes at hybrid {hybrid}"
        )));
    }
    let mut nodes = vec![hybrid, target];
    let mut edges = vec![major, minor];
    let mut current = target;
    while let Some(&(prev, edge)) = previous.get(&current) {
        nodes.push(prev);
        edges.push(edge);
        current = prev;
    }
    Ok(Cycle { nodes, edges })
}

fn derive_used_for_root(
    net: &Network,
    node: NodeId,
    root: NodeId,
    parent_used: impl Fn(NodeId) -> bool,
) -> bool {
    if node == root {
        return true;
    }
    let hybrid = net.node(node).is_ok_and(|n| n.is_hybrid());
    !hybrid && net.parents(node).all(parent_used)
}

fn derive_identifiable(
    net: &Network,
    edge: &Edge,
    in_cycle: Option<NodeId>,
    root: NodeId,
    cycle_size: impl Fn(NodeId) -> usize,
) -> bool {
    if net.node(edge.child()).is_ok_and(|n| n.is_leaf()) {
        return false;
    }
    if in_cycle.is_some_and(|h| cycle_size(h) <= 3) {
        return false;
    }
    if edge.parent() == root {
        let below_root: Vec<&Edge> = net.child_edges(root).filter_map(|e| net.edge(e).ok()).collect();
        if let [first, second] = below_root.as_slice() {
            if !first.is_hybrid() && !second.is_hybrid() {
                let leaf_child = [first, second]
                    .iter()
                    .any(|e| net.node(e.child()).is_ok_and(|n| n.is_leaf()));
                let lower = first.id().min(second.id());
                return !leaf_child && edge.id() == lower;
            }
        }
    }
    true
}

fn check_root_placement(
    net: &Network,
    root: NodeId,
    contains_root: impl Fn(EdgeId) -> bool,
) -> Result<(), NetworkError> {
    if net.child_edges(root).any(contains_root) {
        Ok(())
    } else {
        Err(NetworkError::invalid_topology(
            "no edge below the root can hold the root",
        ))
    }
}

fn level_one_violation(node: NodeId, first: NodeId, second: NodeId) -> NetworkError {
    NetworkError::invalid_topology(format!(
        "cycles of hybrids {first} and {second} share node {node}"
    ))
}
