#![allow(dead_code)]

use hybridnet::model::{BranchLength, EdgeId, Network, NodeId};

pub fn length(value: f64) -> Option<BranchLength> {
    Some(BranchLength::new(value))
}

/// The tree ((A:1,B:1):x,(C:1,D:1):y) with root edges of length `x` and `y`.
pub fn four_taxon_tree(x: f64, y: f64) -> Network {
    let mut net = Network::with_capacity(4);
    let a = net.add_leaf("A");
    let b = net.add_leaf("B");
    let c = net.add_leaf("C");
    let d = net.add_leaf("D");
    let u = net.add_internal();
    let v = net.add_internal();
    let root = net.add_internal();
    net.connect(u, a, length(1.0)).unwrap();
    net.connect(u, b, length(1.0)).unwrap();
    net.connect(v, c, length(1.0)).unwrap();
    net.connect(v, d, length(1.0)).unwrap();
    net.connect(root, u, length(x)).unwrap();
    net.connect(root, v, length(y)).unwrap();
    net.set_root(root).unwrap();
    net.finalize().unwrap();
    net
}

/// Caterpillar (((t1,t2),t3),...) with all lengths 1.
pub fn caterpillar(taxa: &[&str]) -> Network {
    let mut net = Network::with_capacity(taxa.len());
    let root = net.add_internal();
    net.set_root(root).unwrap();
    let mut current = root;
    for taxon in &taxa[..taxa.len() - 2] {
        let leaf = net.add_leaf(*taxon);
        net.connect(current, leaf, length(1.0)).unwrap();
        let next = net.add_internal();
        net.connect(current, next, length(1.0)).unwrap();
        current = next;
    }
    for taxon in &taxa[taxa.len() - 2..] {
        let leaf = net.add_leaf(*taxon);
        net.connect(current, leaf, length(1.0)).unwrap();
    }
    net.finalize().unwrap();
    net
}

/// Balanced tree on six taxa: (((A,B),C),((D,E),F)).
pub fn six_taxon_tree() -> Network {
    let mut net = Network::with_capacity(6);
    let leaves: Vec<NodeId> = ["A", "B", "C", "D", "E", "F"]
        .iter()
        .map(|l| net.add_leaf(*l))
        .collect();
    let ab = net.add_internal();
    let abc = net.add_internal();
    let de = net.add_internal();
    let def = net.add_internal();
    let root = net.add_internal();
    for (parent, child) in [
        (ab, leaves[0]),
        (ab, leaves[1]),
        (abc, ab),
        (abc, leaves[2]),
        (de, leaves[3]),
        (de, leaves[4]),
        (def, de),
        (def, leaves[5]),
        (root, abc),
        (root, def),
    ] {
        net.connect(parent, child, length(0.8)).unwrap();
    }
    net.set_root(root).unwrap();
    net.finalize().unwrap();
    net
}

/// Nodes and edges of [one_hybrid_network].
pub struct HybridFixture {
    pub net: Network,
    pub hybrid: NodeId,
    pub major: EdgeId,
    pub minor: EdgeId,
}

/// Level-1 network on A, B, C, D with one reticulation of size 4:
/// root r -> a, r -> b; a -> A, a -> h (major, γ 0.75); b -> D, b -> h
/// (minor, γ 0.25); h -> c; c -> B, c -> C. All lengths 1.
pub fn one_hybrid_network() -> HybridFixture {
    let mut net = Network::with_capacity(4);
    let root = net.add_internal();
    let a = net.add_internal();
    let b = net.add_internal();
    let h = net.add_internal();
    let c = net.add_internal();
    let leaf_a = net.add_leaf("A");
    let leaf_b = net.add_leaf("B");
    let leaf_c = net.add_leaf("C");
    let leaf_d = net.add_leaf("D");
    net.connect(root, a, length(1.0)).unwrap();
    net.connect(root, b, length(1.0)).unwrap();
    net.connect(a, leaf_a, length(1.0)).unwrap();
    let major = net.connect(a, h, length(1.0)).unwrap();
    net.connect(b, leaf_d, length(1.0)).unwrap();
    let minor = net.connect_hybrid(b, h, length(1.0), 0.25).unwrap();
    net.connect(h, c, length(1.0)).unwrap();
    net.connect(c, leaf_b, length(1.0)).unwrap();
    net.connect(c, leaf_c, length(1.0)).unwrap();
    net.set_root(root).unwrap();
    net.finalize().unwrap();
    HybridFixture { net, hybrid: h, major, minor }
}

/// Asserts that the stored markers equal a full recomputation.
pub fn assert_markers_consistent(net: &Network) {
    let expected = hybridnet::invariants::recompute(net).unwrap();
    let stored = hybridnet::invariants::MarkerSnapshot::capture(net);
    if let Some(diff) = expected.first_difference(&stored) {
        panic!("stale marker: {diff}");
    }
}

/// Sum of γ over the parent edges of every hybrid node.
pub fn gamma_sums(net: &Network) -> Vec<f64> {
    net.hybrids()
        .map(|h| {
            net.parent_edges(h.id())
                .map(|e| net.edge(e).unwrap().gamma())
                .sum()
        })
        .collect()
}
