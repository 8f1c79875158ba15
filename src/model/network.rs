//! Provides the mutable phylogenetic network representation.
//!
//! [Network] stores [Node]s and [Edge]s in two arenas and references them by
//! [NodeId] / [EdgeId]. Every write made through its methods while a journal
//! scope is open is recorded, so that an uncommitted edit can be reverted
//! exactly with [Network::rollback].

use crate::error::NetworkError;
use crate::invariants;
use crate::model::edge::{BranchLength, Edge, EdgeId};
use crate::model::journal::{Change, ChangeKey, EdgeAttr, Journal, NodeAttr};
use crate::model::node::{Node, NodeId};
use std::collections::{HashMap, HashSet};

/// Tolerance for the γ-sum of the two edges entering a hybrid node.
pub const GAMMA_TOLERANCE: f64 = 1e-6;

// =$========================================================================$=
// NETWORK
// =$========================================================================$=
/// A rooted phylogenetic network (directed acyclic graph) using the arena
/// pattern on [Node] and [Edge].
///
/// # Structure
/// - Nodes and edges live in `Vec<Option<_>>` arenas; removal empties a slot,
///   ids are never reused.
/// - Leaves are labelled and have exactly one (tree) parent edge.
/// - Tree nodes have one parent edge; hybrid nodes have two hybrid parent
///   edges whose γ sum to 1 and one child edge.
/// - Markers (in-cycle, contains-root, identifiable) are derived state kept
///   consistent by [crate::invariants].
///
/// # Construction
/// Add leaves and internal nodes, connect them, set the root, then call
/// [Network::finalize], which derives all markers and validates the result:
/// ```
/// use hybridnet::model::{BranchLength, Network};
///
/// let mut net = Network::new();
/// let a = net.add_leaf("A");
/// let b = net.add_leaf("B");
/// let c = net.add_leaf("C");
/// let u = net.add_internal();
/// let root = net.add_internal();
/// net.connect(u, a, Some(BranchLength::new(1.0)))?;
/// net.connect(u, b, Some(BranchLength::new(1.0)))?;
/// net.connect(root, u, Some(BranchLength::new(0.5)))?;
/// net.connect(root, c, Some(BranchLength::new(1.5)))?;
/// net.set_root(root)?;
/// net.finalize()?;
///
/// assert_eq!(net.num_leaves(), 3);
/// assert_eq!(net.num_hybrids(), 0);
/// # Ok::<(), hybridnet::NetworkError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(super) nodes: Vec<Option<Node>>,
    pub(super) edges: Vec<Option<Edge>>,
    pub(super) root: Option<NodeId>,
    pub(super) journal: Journal,
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges && self.root == other.root
    }
}

// ============================================================================
// New, construction (pub)
// ============================================================================
impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Network::default()
    }

    /// Creates an empty network with capacity for a binary tree on
    /// `num_leaves` leaves plus a few hybridizations.
    pub fn with_capacity(num_leaves: usize) -> Self {
        let num_nodes = 2 * num_leaves.max(1) + 8;
        Network {
            nodes: Vec::with_capacity(num_nodes),
            edges: Vec::with_capacity(num_nodes + 8),
            root: None,
            journal: Journal::default(),
        }
    }

    /// Adds a leaf with the given label, returning its id.
    pub fn add_leaf(&mut self, label: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new_leaf(id, label.into())));
        self.journal.record_slot(|| Change::NodeSlot { id, previous: None });
        id
    }

    /// Adds an unconnected internal node, returning its id.
    pub fn add_internal(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new_internal(id)));
        self.journal.record_slot(|| Change::NodeSlot { id, previous: None });
        id
    }

    /// Connects `parent -> child` with a tree edge.
    ///
    /// # Errors
    /// [NetworkError::InvalidTopology] if `child` already has a parent (only
    /// hybrid nodes may have two, see [Network::connect_hybrid]), if the edge
    /// would close a directed cycle, or if it would attach below a leaf.
    pub fn connect(
        &mut self,
        parent: NodeId,
        child: NodeId,
        length: Option<BranchLength>,
    ) -> Result<EdgeId, NetworkError> {
        self.check_connectable(parent, child)?;
        if self.parent_edges(child).next().is_some() {
            return Err(NetworkError::invalid_topology(format!(
                "non-hybrid node {child} would get a second parent"
            )));
        }

        let id = EdgeId(self.edges.len());
        self.edges.push(Some(Edge::new_tree(id, parent, child, length)));
        self.journal.record_slot(|| Change::EdgeSlot { id, previous: None });
        self.attach(parent, id)?;
        self.attach(child, id)?;
        Ok(id)
    }

    /// Connects `parent -> child` with a hybrid edge carrying inheritance
    /// proportion `gamma` and marks `child` as hybrid.
    ///
    /// If `child` already has a single tree parent edge, that edge becomes the
    /// partner hybrid edge with γ = 1 − `gamma`.
    ///
    /// # Errors
    /// [NetworkError::InvalidTopology] if `gamma` is not in (0, 1), if `child`
    /// is a leaf or already has two parents, or if a cycle would be closed.
    pub fn connect_hybrid(
        &mut self,
        parent: NodeId,
        child: NodeId,
        length: Option<BranchLength>,
        gamma: f64,
    ) -> Result<EdgeId, NetworkError> {
        self.check_connectable(parent, child)?;
        if !(gamma > 0.0 && gamma < 1.0) {
            return Err(NetworkError::invalid_topology(format!(
                "γ of a hybrid edge must lie in (0, 1), got {gamma}"
            )));
        }
        if self.node(child)?.is_leaf() {
            return Err(NetworkError::invalid_topology(format!(
                "leaf {child} cannot be a hybrid node"
            )));
        }

        let existing: Vec<EdgeId> = self.parent_edges(child).collect();
        let is_major = match existing.as_slice() {
            [] => gamma > 0.5,
            [partner] => {
                let partner = *partner;
                let partner_major = 1.0 - gamma >= gamma;
                self.make_hybrid_edge(partner, 1.0 - gamma, partner_major)?;
                !partner_major
            }
            _ => {
                return Err(NetworkError::invalid_topology(format!(
                    "hybrid node {child} would get a third parent"
                )));
            }
        };

        let id = EdgeId(self.edges.len());
        self.edges
            .push(Some(Edge::new_hybrid(id, parent, child, length, gamma, is_major)));
        self.journal.record_slot(|| Change::EdgeSlot { id, previous: None });
        self.attach(parent, id)?;
        self.attach(child, id)?;
        self.set_node_hybrid(child, true)?;
        Ok(id)
    }

    /// Designates `root` as root of the network.
    ///
    /// # Errors
    /// [NetworkError::InvalidTopology] if the node has a parent or is a leaf.
    pub fn set_root(&mut self, root: NodeId) -> Result<(), NetworkError> {
        let node = self.node(root)?;
        if node.is_leaf() {
            return Err(NetworkError::invalid_topology("a leaf cannot be the root"));
        }
        if self.parent_edges(root).next().is_some() {
            return Err(NetworkError::invalid_topology(format!(
                "root candidate {root} has a parent"
            )));
        }
        self.write_root(Some(root));
        Ok(())
    }

    /// Derives all markers from scratch and validates the network.
    ///
    /// Call once after construction (e.g. by an external parser) and before
    /// handing the network to move operators or the scorer.
    pub fn finalize(&mut self) -> Result<(), NetworkError> {
        invariants::refresh_all(self)?;
        self.validate()
    }

    /// Renames leaves according to `mapping` (labels missing from `mapping`
    /// are kept). Not journaled.
    ///
    /// # Errors
    /// [NetworkError::JournalState] while a move is in flight,
    /// [NetworkError::MalformedInput] if labels would collide.
    pub fn relabel_leaves(&mut self, mapping: &HashMap<String, String>) -> Result<(), NetworkError> {
        if self.journal.is_open() {
            return Err(NetworkError::JournalState("cannot relabel while a move is in flight"));
        }
        let renamed: Vec<(NodeId, String)> = self
            .leaves()
            .filter_map(|leaf| {
                let label = leaf.label()?;
                Some((leaf.id(), mapping.get(label).cloned().unwrap_or_else(|| label.to_string())))
            })
            .collect();
        let mut seen = HashSet::new();
        for (_, label) in &renamed {
            if !seen.insert(label.as_str()) {
                return Err(NetworkError::malformed(format!("duplicate leaf label '{label}'")));
            }
        }
        for (id, new_label) in renamed {
            if let Some(Node { kind: crate::model::NodeKind::Leaf(label), .. }) =
                self.nodes[id.index()].as_mut()
            {
                *label = new_label;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Undo journal (pub)
// ============================================================================
impl Network {
    /// Opens a recording scope; every subsequent write is journaled.
    ///
    /// # Errors
    /// [NetworkError::JournalState] if a scope is already open.
    pub fn begin(&mut self) -> Result<(), NetworkError> {
        self.journal.begin()
    }

    /// Accepts all writes since [Network::begin] and discards the record.
    pub fn commit(&mut self) -> Result<(), NetworkError> {
        self.journal.commit().map(|_| ())
    }

    /// Reverts every write since [Network::begin], newest first, and closes
    /// the scope.
    pub fn rollback(&mut self) -> Result<(), NetworkError> {
        let changes = self.journal.take()?;
        for change in changes.into_iter().rev() {
            self.revert(change);
        }
        Ok(())
    }

    /// Returns whether a journal scope (a move) is open.
    pub fn in_flight(&self) -> bool {
        self.journal.is_open()
    }

    /// Read access to the journal of the open scope.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

// ============================================================================
// Getters / Accessors, etc. (pub)
// ============================================================================
impl Network {
    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> Result<&Node, NetworkError> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(NetworkError::UnknownNode(id))
    }

    /// Returns the edge with the given id.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge, NetworkError> {
        self.edges
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(NetworkError::UnknownEdge(id))
    }

    /// Returns whether `id` refers to a live node.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Returns whether `id` refers to a live edge.
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edge(id).is_ok()
    }

    /// Id of the root, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Id of the root.
    ///
    /// # Errors
    /// [NetworkError::InvalidTopology] if no root has been set.
    pub fn root_id(&self) -> Result<NodeId, NetworkError> {
        self.root
            .ok_or_else(|| NetworkError::invalid_topology("network has no root"))
    }

    /// Iterator over all live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().flatten()
    }

    /// Iterator over all live edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().flatten()
    }

    /// Iterator over all leaves in id order.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes().filter(|n| n.is_leaf())
    }

    /// Iterator over all hybrid nodes in id order.
    pub fn hybrids(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes().filter(|n| n.is_hybrid())
    }

    /// Number of live nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes().count()
    }

    /// Number of live edges.
    pub fn num_edges(&self) -> usize {
        self.edges().count()
    }

    /// Number of leaves.
    pub fn num_leaves(&self) -> usize {
        self.leaves().count()
    }

    /// Number of hybrid nodes.
    pub fn num_hybrids(&self) -> usize {
        self.hybrids().count()
    }

    /// Finds the leaf carrying `label`.
    pub fn leaf_by_label(&self, label: &str) -> Option<NodeId> {
        self.leaves().find(|n| n.label() == Some(label)).map(Node::id)
    }

    /// Leaf labels in id order.
    pub fn leaf_labels(&self) -> Vec<&str> {
        self.leaves().filter_map(Node::label).collect()
    }

    /// Ids of the edges incident to `node`; empty for unknown ids.
    pub fn incident_edges(&self, node: NodeId) -> &[EdgeId] {
        self.node(node).map(Node::edges).unwrap_or(&[])
    }

    /// Edges entering `node`.
    pub fn parent_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.incident_edges(node)
            .iter()
            .copied()
            .filter(move |&e| self.edges[e.index()].as_ref().is_some_and(|e| e.child == node))
    }

    /// Edges leaving `node`.
    pub fn child_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.incident_edges(node)
            .iter()
            .copied()
            .filter(move |&e| self.edges[e.index()].as_ref().is_some_and(|e| e.parent == node))
    }

    /// Parents of `node`.
    pub fn parents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.parent_edges(node).map(move |e| self.edges[e.index()].as_ref().map_or(node, |e| e.parent))
    }

    /// Children of `node`.
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.child_edges(node).map(move |e| self.edges[e.index()].as_ref().map_or(node, |e| e.child))
    }

    /// The single tree edge entering `node`, if any.
    pub fn tree_parent_edge(&self, node: NodeId) -> Option<EdgeId> {
        self.parent_edges(node)
            .find(|&e| self.edge(e).is_ok_and(|e| !e.is_hybrid()))
    }

    /// Major hybrid edge entering `hybrid`.
    pub fn major_parent_edge(&self, hybrid: NodeId) -> Option<EdgeId> {
        self.parent_edges(hybrid)
            .find(|&e| self.edge(e).is_ok_and(|e| e.is_hybrid() && e.is_major()))
    }

    /// Minor hybrid edge entering `hybrid`.
    pub fn minor_parent_edge(&self, hybrid: NodeId) -> Option<EdgeId> {
        self.parent_edges(hybrid)
            .find(|&e| self.edge(e).is_ok_and(|e| e.is_hybrid() && !e.is_major()))
    }

    /// The other hybrid edge entering the child of hybrid edge `edge`.
    pub fn partner_edge(&self, edge: EdgeId) -> Option<EdgeId> {
        let child = self.edge(edge).ok()?.child;
        self.parent_edges(child).find(|&e| e != edge)
    }

    /// Returns whether `ancestor` equals `node` or reaches it by a directed
    /// path.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut stack = vec![node];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.parents(current));
            }
        }
        false
    }

    /// Returns whether edge `upper` lies on a directed path above edge
    /// `lower` (i.e. the child of `upper` is an ancestor of the parent of
    /// `lower`).
    pub fn is_edge_ancestor(&self, upper: EdgeId, lower: EdgeId) -> bool {
        match (self.edge(upper), self.edge(lower)) {
            (Ok(u), Ok(l)) => self.is_ancestor(u.child, l.parent),
            _ => false,
        }
    }

    /// Returns all live nodes with children before parents.
    ///
    /// Nodes on a directed cycle (only possible in an invalid network) are
    /// left out; [Network::validate] reports them.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut remaining: HashMap<NodeId, usize> = HashMap::new();
        let mut ready = Vec::new();
        for node in self.nodes() {
            let num_children = self.child_edges(node.id).count();
            if num_children == 0 {
                ready.push(node.id);
            } else {
                remaining.insert(node.id, num_children);
            }
        }
        ready.reverse();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop() {
            order.push(current);
            for parent in self.parents(current) {
                if let Some(count) = remaining.get_mut(&parent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(parent);
                    }
                }
            }
        }
        order
    }

    /// Canonical, id- and length-free description of the topology.
    ///
    /// Two networks have equal signatures iff they are isomorphic as rooted
    /// networks with labelled leaves (major and minor hybrid edges are
    /// distinguished).
    pub fn topology_signature(&self) -> String {
        fn build(net: &Network, node: NodeId, incoming_major: bool) -> String {
            let Ok(n) = net.node(node) else {
                return String::new();
            };
            if let Some(label) = n.label() {
                return label.to_string();
            }
            let mut parts: Vec<String> = net
                .child_edges(node)
                .filter_map(|e| net.edge(e).ok())
                .map(|e| build(net, e.child, e.is_major))
                .collect();
            parts.sort();
            let inner = format!("({})", parts.join(","));
            if n.is_hybrid() {
                if incoming_major { format!("H{inner}") } else { format!("h{inner}") }
            } else {
                inner
            }
        }

        match self.root {
            Some(root) => format!("{};", build(self, root, true)),
            None => String::new(),
        }
    }

    /// Returns whether both networks are isomorphic as leaf-labelled rooted
    /// networks.
    pub fn is_isomorphic_to(&self, other: &Network) -> bool {
        self.topology_signature() == other.topology_signature()
    }
}

// ============================================================================
// Parameter writes (pub, journaled)
// ============================================================================
impl Network {
    /// Sets the length of `edge`.
    pub fn set_length(
        &mut self,
        edge: EdgeId,
        length: Option<BranchLength>,
    ) -> Result<(), NetworkError> {
        self.update_edge(edge, EdgeAttr::Length(length))
    }

    /// Sets γ of hybrid edge `edge` and 1 − γ on its partner, updating which
    /// of the two is major (a tie keeps the current major edge).
    ///
    /// # Errors
    /// [NetworkError::InvalidTopology] for tree edges, incomplete hybrids, or
    /// `gamma` outside (0, 1).
    pub fn set_gamma(&mut self, edge: EdgeId, gamma: f64) -> Result<(), NetworkError> {
        let e = self.edge(edge)?;
        if !e.is_hybrid() {
            return Err(NetworkError::invalid_topology(format!(
                "tree edge {edge} carries γ = 1"
            )));
        }
        if !(gamma > 0.0 && gamma < 1.0) {
            return Err(NetworkError::invalid_topology(format!(
                "γ must lie in (0, 1), got {gamma}"
            )));
        }
        let was_major = e.is_major();
        let partner = self.partner_edge(edge).ok_or_else(|| {
            NetworkError::invalid_topology(format!("hybrid edge {edge} has no partner"))
        })?;

        let is_major = if gamma > 0.5 {
            true
        } else if gamma < 0.5 {
            false
        } else {
            was_major
        };
        self.update_edge(edge, EdgeAttr::Gamma(gamma))?;
        self.update_edge(edge, EdgeAttr::Major(is_major))?;
        self.update_edge(partner, EdgeAttr::Gamma(1.0 - gamma))?;
        self.update_edge(partner, EdgeAttr::Major(!is_major))
    }

    /// Gives every edge without a length the value `default`.
    pub fn fill_missing_lengths(&mut self, default: BranchLength) -> Result<usize, NetworkError> {
        let missing: Vec<EdgeId> = self
            .edges()
            .filter(|e| e.length.is_none())
            .map(Edge::id)
            .collect();
        for &edge in &missing {
            self.set_length(edge, Some(default))?;
        }
        Ok(missing.len())
    }
}

// ============================================================================
// Structural primitives (crate, journaled)
// ============================================================================
impl Network {
    /// Splits `edge` (p -> c) into p -> y -> c with a new node y, returning y.
    ///
    /// `edge` keeps its id and all child-side attributes (hybrid status, γ)
    /// and becomes y -> c; a new tree edge p -> y is created. The length is
    /// split in halves.
    pub(crate) fn subdivide(&mut self, edge: EdgeId) -> Result<(NodeId, EdgeId), NetworkError> {
        let e = self.edge(edge)?;
        let parent = e.parent;
        let half = e.length.map(|l| BranchLength::new(l.value() / 2.0));

        let middle = self.add_internal();
        let upper = EdgeId(self.edges.len());
        self.edges.push(Some(Edge::new_tree(upper, parent, middle, half)));
        self.journal.record_slot(|| Change::EdgeSlot { id: upper, previous: None });
        self.attach(parent, upper)?;
        self.attach(middle, upper)?;

        self.redirect_parent(edge, middle)?;
        self.update_edge(edge, EdgeAttr::Length(half))?;
        Ok((middle, upper))
    }

    /// Removes `node` that has exactly one parent and one child edge by
    /// merging the two edges; a root with a single child hands the root over
    /// to that child instead.
    ///
    /// The child edge survives (redirected to the parent), so hybrid status
    /// on the lower side is preserved. Returns the surviving edge, or `None`
    /// if the root was handed over.
    pub(crate) fn suppress(&mut self, node: NodeId) -> Result<Option<EdgeId>, NetworkError> {
        let parents: Vec<EdgeId> = self.parent_edges(node).collect();
        let children: Vec<EdgeId> = self.child_edges(node).collect();

        match (parents.as_slice(), children.as_slice()) {
            ([], [only]) if self.root == Some(node) => {
                let only = *only;
                let new_root = self.edge(only)?.child;
                if self.node(new_root)?.is_leaf() || self.node(new_root)?.is_hybrid() {
                    return Err(NetworkError::invalid_topology(format!(
                        "cannot hand the root over to {new_root}"
                    )));
                }
                self.remove_edge(only)?;
                self.remove_node(node)?;
                self.write_root(Some(new_root));
                Ok(None)
            }
            ([upper], [lower]) => {
                let (upper, lower) = (*upper, *lower);
                let upper_edge = self.edge(upper)?;
                if upper_edge.is_hybrid() {
                    return Err(NetworkError::invalid_topology(format!(
                        "cannot suppress {node}: its parent edge {upper} is hybrid"
                    )));
                }
                let grandparent = upper_edge.parent;
                let length = match (upper_edge.length, self.edge(lower)?.length) {
                    (Some(a), Some(b)) => Some(BranchLength::new(a.value() + b.value())),
                    (a, b) => a.or(b),
                };
                self.remove_edge(upper)?;
                self.redirect_parent(lower, grandparent)?;
                self.update_edge(lower, EdgeAttr::Length(length))?;
                self.remove_node(node)?;
                Ok(Some(lower))
            }
            _ => Err(NetworkError::invalid_topology(format!(
                "cannot suppress {node} with {} parent and {} child edges",
                parents.len(),
                children.len()
            ))),
        }
    }

    /// Removes `edge` and detaches it from both endpoints.
    pub(crate) fn remove_edge(&mut self, edge: EdgeId) -> Result<(), NetworkError> {
        let e = self.edge(edge)?;
        let (parent, child) = (e.parent, e.child);
        self.detach(parent, edge)?;
        self.detach(child, edge)?;
        let previous = self.edges[edge.index()].take();
        self.journal.record_slot(|| Change::EdgeSlot { id: edge, previous });
        Ok(())
    }

    /// Removes an isolated node.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<(), NetworkError> {
        if self.node(node)?.degree() != 0 {
            return Err(NetworkError::invalid_topology(format!(
                "node {node} still has incident edges"
            )));
        }
        let previous = self.nodes[node.index()].take();
        self.journal.record_slot(|| Change::NodeSlot { id: node, previous });
        Ok(())
    }

    /// Moves the tail of `edge` to `new_parent`.
    pub(crate) fn redirect_parent(&mut self, edge: EdgeId, new_parent: NodeId) -> Result<(), NetworkError> {
        let old = self.edge(edge)?.parent;
        self.node(new_parent)?;
        if old == new_parent {
            return Ok(());
        }
        self.detach(old, edge)?;
        self.attach(new_parent, edge)?;
        self.update_edge(edge, EdgeAttr::Parent(new_parent))
    }

    /// Turns `edge` into a hybrid edge with the given γ and major flag.
    pub(crate) fn make_hybrid_edge(&mut self, edge: EdgeId, gamma: f64, is_major: bool) -> Result<(), NetworkError> {
        self.update_edge(edge, EdgeAttr::Hybrid(true))?;
        self.update_edge(edge, EdgeAttr::Gamma(gamma))?;
        self.update_edge(edge, EdgeAttr::Major(is_major))
    }

    /// Turns `edge` into a tree edge (γ = 1, major).
    pub(crate) fn make_tree_edge(&mut self, edge: EdgeId) -> Result<(), NetworkError> {
        self.update_edge(edge, EdgeAttr::Hybrid(false))?;
        self.update_edge(edge, EdgeAttr::Gamma(1.0))?;
        self.update_edge(edge, EdgeAttr::Major(true))
    }

    pub(crate) fn set_node_hybrid(&mut self, node: NodeId, hybrid: bool) -> Result<(), NetworkError> {
        self.update_node(node, NodeAttr::Hybrid(hybrid))
    }
}

// ============================================================================
// Marker writes (crate, only called by the invariant updater)
// ============================================================================
impl Network {
    pub(crate) fn set_node_in_cycle(&mut self, node: NodeId, cycle: Option<NodeId>) -> Result<(), NetworkError> {
        self.update_node(node, NodeAttr::InCycle(cycle))
    }

    pub(crate) fn set_node_used_for_root(&mut self, node: NodeId, used: bool) -> Result<(), NetworkError> {
        self.update_node(node, NodeAttr::UsedForRoot(used))
    }

    pub(crate) fn set_cycle_size(&mut self, node: NodeId, size: usize) -> Result<(), NetworkError> {
        self.update_node(node, NodeAttr::CycleSize(size))
    }

    pub(crate) fn set_edge_in_cycle(&mut self, edge: EdgeId, cycle: Option<NodeId>) -> Result<(), NetworkError> {
        self.update_edge(edge, EdgeAttr::InCycle(cycle))
    }

    pub(crate) fn set_edge_contains_root(&mut self, edge: EdgeId, contains: bool) -> Result<(), NetworkError> {
        self.update_edge(edge, EdgeAttr::ContainsRoot(contains))
    }

    pub(crate) fn set_edge_identifiable(&mut self, edge: EdgeId, identifiable: bool) -> Result<(), NetworkError> {
        self.update_edge(edge, EdgeAttr::Identifiable(identifiable))
    }
}

// ============================================================================
// Journaled low-level writes (private)
// ============================================================================
impl Network {
    fn update_node(&mut self, id: NodeId, new: NodeAttr) -> Result<(), NetworkError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(NetworkError::UnknownNode(id))?;
        let previous = match &new {
            NodeAttr::Hybrid(v) => NodeAttr::Hybrid(std::mem::replace(&mut node.hybrid, *v)),
            NodeAttr::InCycle(v) => NodeAttr::InCycle(std::mem::replace(&mut node.in_cycle, *v)),
            NodeAttr::UsedForRoot(v) => {
                NodeAttr::UsedForRoot(std::mem::replace(&mut node.used_for_root, *v))
            }
            NodeAttr::CycleSize(v) => {
                NodeAttr::CycleSize(std::mem::replace(&mut node.cycle_size, *v))
            }
        };
        if previous != new {
            self.journal
                .record(ChangeKey::node(id, &previous), || Change::Node { id, previous });
        }
        Ok(())
    }

    fn update_edge(&mut self, id: EdgeId, new: EdgeAttr) -> Result<(), NetworkError> {
        let edge = self
            .edges
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(NetworkError::UnknownEdge(id))?;
        let previous = match &new {
            EdgeAttr::Parent(v) => EdgeAttr::Parent(std::mem::replace(&mut edge.parent, *v)),
            EdgeAttr::Child(v) => EdgeAttr::Child(std::mem::replace(&mut edge.child, *v)),
            EdgeAttr::Length(v) => EdgeAttr::Length(std::mem::replace(&mut edge.length, *v)),
            EdgeAttr::Hybrid(v) => EdgeAttr::Hybrid(std::mem::replace(&mut edge.hybrid, *v)),
            EdgeAttr::Gamma(v) => EdgeAttr::Gamma(std::mem::replace(&mut edge.gamma, *v)),
            EdgeAttr::Major(v) => EdgeAttr::Major(std::mem::replace(&mut edge.is_major, *v)),
            EdgeAttr::InCycle(v) => EdgeAttr::InCycle(std::mem::replace(&mut edge.in_cycle, *v)),
            EdgeAttr::ContainsRoot(v) => {
                EdgeAttr::ContainsRoot(std::mem::replace(&mut edge.contains_root, *v))
            }
            EdgeAttr::Identifiable(v) => {
                EdgeAttr::Identifiable(std::mem::replace(&mut edge.identifiable, *v))
            }
        };
        if previous != new {
            self.journal
                .record(ChangeKey::edge(id, &previous), || Change::Edge { id, previous });
        }
        Ok(())
    }

    fn write_root(&mut self, root: Option<NodeId>) {
        let previous = std::mem::replace(&mut self.root, root);
        if previous != root {
            self.journal.record(ChangeKey::Root, || Change::Root { previous });
        }
    }

    fn attach(&mut self, node: NodeId, edge: EdgeId) -> Result<(), NetworkError> {
        let n = self
            .nodes
            .get_mut(node.index())
            .and_then(Option::as_mut)
            .ok_or(NetworkError::UnknownNode(node))?;
        self.journal.record(ChangeKey::Incidence(node), || Change::Incidence {
            node,
            previous: n.edges.clone(),
        });
        n.edges.push(edge);
        Ok(())
    }

    fn detach(&mut self, node: NodeId, edge: EdgeId) -> Result<(), NetworkError> {
        let n = self
            .nodes
            .get_mut(node.index())
            .and_then(Option::as_mut)
            .ok_or(NetworkError::UnknownNode(node))?;
        self.journal.record(ChangeKey::Incidence(node), || Change::Incidence {
            node,
            previous: n.edges.clone(),
        });
        n.edges.retain(|&e| e != edge);
        Ok(())
    }

    fn check_connectable(&self, parent: NodeId, child: NodeId) -> Result<(), NetworkError> {
        let p = self.node(parent)?;
        let c = self.node(child)?;
        if parent == child {
            return Err(NetworkError::invalid_topology(format!("self loop at {parent}")));
        }
        if p.is_leaf() {
            return Err(NetworkError::invalid_topology(format!(
                "leaf {parent} cannot have children"
            )));
        }
        if c.is_leaf() && c.degree() > 0 {
            return Err(NetworkError::invalid_topology(format!(
                "leaf {child} already has a parent"
            )));
        }
        if self.root == Some(child) {
            return Err(NetworkError::invalid_topology("the root cannot have a parent"));
        }
        if self.is_ancestor(child, parent) {
            return Err(NetworkError::invalid_topology(format!(
                "edge {parent} -> {child} would close a directed cycle"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Validation (pub)
// ============================================================================
impl Network {
    /// Validates structure and markers.
    ///
    /// Checks:
    /// - Root is set, internal and has no parent
    /// - Incidence lists and edge endpoints agree
    /// - Leaves have one parent edge and unique labels
    /// - Tree nodes have one tree parent edge; hybrid nodes two hybrid parent
    ///   edges with γ summing to 1 (within [GAMMA_TOLERANCE]) and one major
    /// - The graph is acyclic and every node is reachable from the root
    /// - Stored markers equal a from-scratch recomputation
    pub fn validate(&self) -> Result<(), NetworkError> {
        fn invalid(msg: impl Into<String>) -> NetworkError {
            NetworkError::invalid_topology(msg)
        }
        let root = self.root_id()?;
        if self.node(root)?.is_leaf() || self.parent_edges(root).next().is_some() {
            return Err(invalid("root must be internal and have no parent"));
        }

        for edge in self.edges() {
            for end in [edge.parent, edge.child] {
                if !self.node(end)?.edges.contains(&edge.id) {
                    return Err(invalid(format!("{} missing from incidence of {end}", edge.id)));
                }
            }
            if !edge.hybrid && ((edge.gamma - 1.0).abs() > GAMMA_TOLERANCE || !edge.is_major) {
                return Err(invalid(format!("tree edge {} must have γ = 1", edge.id)));
            }
        }

        let mut labels = HashSet::new();
        for node in self.nodes() {
            for &e in &node.edges {
                if !self.edge(e)?.touches(node.id) {
                    return Err(invalid(format!("{e} listed at {} but not incident", node.id)));
                }
            }
            let parents: Vec<&Edge> = self
                .parent_edges(node.id)
                .filter_map(|e| self.edge(e).ok())
                .collect();
            let num_children = node.edges.len() - parents.len();

            if let Some(label) = node.label() {
                if !labels.insert(label) {
                    return Err(invalid(format!("duplicate leaf label '{label}'")));
                }
                if parents.len() != 1 || num_children != 0 {
                    return Err(invalid(format!("leaf {} must have exactly one parent", node.id)));
                }
            } else if num_children == 0 {
                return Err(invalid(format!("internal node {} has no children", node.id)));
            }

            if node.hybrid {
                let [first, second] = parents.as_slice() else {
                    return Err(invalid(format!("hybrid {} needs two parent edges", node.id)));
                };
                if !first.hybrid || !second.hybrid {
                    return Err(invalid(format!("hybrid {} has a tree parent edge", node.id)));
                }
                if (first.gamma + second.gamma - 1.0).abs() > GAMMA_TOLERANCE {
                    return Err(invalid(format!("γ at hybrid {} does not sum to 1", node.id)));
                }
                if first.is_major == second.is_major {
                    return Err(invalid(format!("hybrid {} needs one major parent", node.id)));
                }
            } else if node.id != root {
                match parents.as_slice() {
                    [only] if !only.hybrid => {}
                    _ => return Err(invalid(format!("tree node {} needs one tree parent", node.id))),
                }
            }
        }

        if self.post_order().len() != self.num_nodes() {
            return Err(invalid("network contains a directed cycle"));
        }
        let mut reachable = HashSet::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if reachable.insert(current) {
                stack.extend(self.children(current));
            }
        }
        if reachable.len() != self.num_nodes() {
            return Err(invalid("some nodes are not reachable from the root"));
        }

        invariants::verify(self)
    }
}
