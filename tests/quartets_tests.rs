mod common;

use common::{four_taxon_tree, one_hybrid_network, six_taxon_tree};
use hybridnet::NetworkError;
use hybridnet::model::{Network, NodeId};
use hybridnet::moves::{Move, MoveConfig};
use hybridnet::quartets::{PseudoLikelihood, QuartetCF, QuartetTable, expected_cf};

const EPS: f64 = 1e-12;

fn leaves(net: &Network, labels: [&str; 4]) -> [NodeId; 4] {
    labels.map(|l| net.leaf_by_label(l).unwrap())
}

fn tree_cf(internal: f64) -> [f64; 3] {
    let minor = (-internal).exp() / 3.0;
    [1.0 - 2.0 * minor, minor, minor]
}

fn assert_close(actual: [f64; 3], expected: [f64; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < EPS, "{actual:?} vs {expected:?}");
    }
}

// ============= Expected concordance factors =============

#[test]
fn test_tree_expected_cf() {
    for (x, y) in [(0.5, 0.5), (0.1, 1.2), (2.0, 0.0)] {
        let net = four_taxon_tree(x, y);
        let cf = expected_cf(&net, leaves(&net, ["A", "B", "C", "D"])).unwrap();
        assert_close(cf, tree_cf(x + y));
    }
}

#[test]
fn test_zero_internal_length_is_uniform() {
    let net = four_taxon_tree(0.0, 0.0);
    let cf = expected_cf(&net, leaves(&net, ["A", "B", "C", "D"])).unwrap();
    assert_close(cf, [1.0 / 3.0; 3]);
}

#[test]
fn test_expected_cf_follows_taxon_order() {
    let net = four_taxon_tree(0.4, 0.3);
    let base = expected_cf(&net, leaves(&net, ["A", "B", "C", "D"])).unwrap();

    // Swapping within a pair keeps every split
    let swapped = expected_cf(&net, leaves(&net, ["B", "A", "D", "C"])).unwrap();
    assert_close(swapped, base);

    // [A, C, B, D] lists AC|BD first
    let permuted = expected_cf(&net, leaves(&net, ["A", "C", "B", "D"])).unwrap();
    assert_close(permuted, [base[1], base[0], base[2]]);

    // [C, D, A, B] describes the same three splits in the same order
    let rotated = expected_cf(&net, leaves(&net, ["C", "D", "A", "B"])).unwrap();
    assert_close(rotated, base);
}

#[test]
fn test_network_expected_cf_sums_to_one() {
    let fixture = one_hybrid_network();
    let net = &fixture.net;
    let cf = expected_cf(net, leaves(net, ["A", "B", "C", "D"])).unwrap();
    assert!((cf.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(cf.iter().all(|p| *p > 0.0));
    // B and C share the unit-length edge below the hybrid
    assert!(cf[2] >= 1.0 - (-1.0f64).exp());
}

#[test]
fn test_hybridization_shifts_concordance() {
    let tree = four_taxon_tree(1.0, 1.0);
    let tree_cf = expected_cf(&tree, leaves(&tree, ["A", "B", "C", "D"])).unwrap();

    let mut net = tree.clone();
    let origin = net.tree_parent_edge(net.leaf_by_label("A").unwrap()).unwrap();
    let target = net.tree_parent_edge(net.leaf_by_label("C").unwrap()).unwrap();
    Move::AddHybrid { origin_edge: origin, target_edge: target, gamma: 0.4 }
        .apply(&mut net, &MoveConfig::default())
        .unwrap();
    let net_cf = expected_cf(&net, leaves(&net, ["A", "B", "C", "D"])).unwrap();

    assert!((net_cf.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    // Gene flow from A's lineage into C raises AC|BD
    assert!(net_cf[1] > tree_cf[1]);
    assert!(net_cf[0] < tree_cf[0]);
}

// ============= Pseudo-likelihood =============

#[test]
fn test_score_of_tree() {
    let net = four_taxon_tree(0.5, 0.5);
    let observed = [0.6, 0.3, 0.1];
    let table = QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], observed)]).unwrap();
    let scorer = PseudoLikelihood::bind(&table, &net).unwrap();
    assert_eq!(scorer.len(), 1);

    let score = scorer.score(&net).unwrap();
    let expected: f64 = observed
        .iter()
        .zip(tree_cf(1.0))
        .map(|(o, e)| o * e.ln())
        .sum();
    assert!(score.log_pseudo_likelihood.is_finite());
    assert!((score.log_pseudo_likelihood - expected).abs() < EPS);
    assert_eq!(score.clamped, 0);
    assert_eq!(score.quartets, 1);
}

#[test]
fn test_better_fit_scores_higher() {
    let table =
        QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.8, 0.1, 0.1])]).unwrap();
    let short = four_taxon_tree(0.05, 0.05);
    let fitting = four_taxon_tree(0.6, 0.6);
    let short_score = hybridnet::score_network(&short, &table).unwrap();
    let fitting_score = hybridnet::score_network(&fitting, &table).unwrap();
    assert!(fitting_score.log_pseudo_likelihood > short_score.log_pseudo_likelihood);
}

#[test]
fn test_sample_size_weights_rows() {
    let net = four_taxon_tree(0.5, 0.5);
    let row = QuartetCF::new(["A", "B", "C", "D"], [0.6, 0.3, 0.1]);
    let plain = QuartetTable::new(vec![row.clone()]).unwrap();
    let weighted = QuartetTable::new(vec![row.with_sample_size(10.0)]).unwrap();
    let plain_score = hybridnet::score_network(&net, &plain).unwrap();
    let weighted_score = hybridnet::score_network(&net, &weighted).unwrap();
    assert!(
        (weighted_score.log_pseudo_likelihood - 10.0 * plain_score.log_pseudo_likelihood).abs()
            < 1e-9
    );
}

#[test]
fn test_vanishing_expectation_is_clamped() {
    let net = four_taxon_tree(20.0, 20.0);
    let table =
        QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.2, 0.4, 0.4])]).unwrap();
    let score = hybridnet::score_network(&net, &table).unwrap();
    assert_eq!(score.clamped, 2);
    assert!(score.log_pseudo_likelihood.is_finite());
}

#[test]
fn test_unknown_taxon_is_malformed() {
    let net = four_taxon_tree(0.5, 0.5);
    let table =
        QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "Z"], [0.6, 0.3, 0.1])]).unwrap();
    assert!(matches!(
        PseudoLikelihood::bind(&table, &net),
        Err(NetworkError::MalformedInput(_))
    ));
}

#[test]
fn test_binding_survives_moves() {
    let mut net = six_taxon_tree();
    let table = QuartetTable::new(vec![
        QuartetCF::new(["A", "B", "C", "D"], [0.7, 0.2, 0.1]),
        QuartetCF::new(["A", "D", "E", "F"], [0.1, 0.1, 0.8]),
    ])
    .unwrap();
    let scorer = PseudoLikelihood::bind(&table, &net).unwrap();
    let before = scorer.score(&net).unwrap();

    let origin = net.tree_parent_edge(net.leaf_by_label("B").unwrap()).unwrap();
    let target = net.tree_parent_edge(net.leaf_by_label("E").unwrap()).unwrap();
    Move::AddHybrid { origin_edge: origin, target_edge: target, gamma: 0.2 }
        .apply(&mut net, &MoveConfig::default())
        .unwrap();
    let during = scorer.score(&net).unwrap();
    assert!(during.log_pseudo_likelihood.is_finite());
    assert_eq!(scorer.expected(&net).unwrap().len(), 2);

    net.rollback().unwrap();
    assert_eq!(scorer.score(&net).unwrap(), before);
}

// ============= Table validation =============

#[test]
fn test_table_rejects_repeated_taxon() {
    let row = QuartetCF::new(["A", "B", "A", "D"], [0.6, 0.3, 0.1]);
    assert!(matches!(QuartetTable::new(vec![row]), Err(NetworkError::MalformedInput(_))));
}

#[test]
fn test_table_checks_proportions() {
    let taxa = ["A", "B", "C", "D"];
    assert!(QuartetTable::new(vec![QuartetCF::new(taxa, [0.6, 0.3, 0.095])]).is_ok());
    assert!(QuartetTable::new(vec![QuartetCF::new(taxa, [0.6, 0.2, 0.1])]).is_err());
    assert!(QuartetTable::new(vec![QuartetCF::new(taxa, [1.2, -0.1, -0.1])]).is_err());
    assert!(QuartetTable::new(vec![QuartetCF::new(taxa, [f64::NAN, 0.5, 0.5])]).is_err());
    let zero_genes = QuartetCF::new(taxa, [0.6, 0.3, 0.1]).with_sample_size(0.0);
    assert!(QuartetTable::new(vec![zero_genes]).is_err());
}

#[test]
fn test_table_from_json() {
    let json = r#"[
        { "taxa": ["A", "B", "C", "D"], "cf": [0.6, 0.3, 0.1] },
        { "taxa": ["A", "B", "C", "E"], "cf": [0.5, 0.25, 0.25], "sample_size": 40 }
    ]"#;
    let table = QuartetTable::from_json_str(json).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0].weight(), 1.0);
    assert_eq!(table.rows()[1].weight(), 40.0);
    assert_eq!(table.taxa().into_iter().collect::<Vec<_>>(), vec!["A", "B", "C", "D", "E"]);

    assert!(matches!(
        QuartetTable::from_json_str("{ not json"),
        Err(NetworkError::MalformedInput(_))
    ));
    assert!(QuartetTable::from_json_str(r#"[{ "taxa": ["A", "B", "C"], "cf": [1, 0, 0] }]"#).is_err());
}

// ============= Scenarios =============

#[test]
fn test_score_invariant_under_relabeling() {
    let mut net = one_hybrid_network().net;
    let rows = |names: [&str; 4]| {
        QuartetTable::new(vec![QuartetCF::new(names, [0.5, 0.3, 0.2])]).unwrap()
    };
    let before = hybridnet::score_network(&net, &rows(["A", "B", "C", "D"])).unwrap();

    let mapping: std::collections::HashMap<String, String> =
        [("A", "w"), ("B", "x"), ("C", "y"), ("D", "z")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
    net.relabel_leaves(&mapping).unwrap();
    let after = hybridnet::score_network(&net, &rows(["w", "x", "y", "z"])).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_hybridized_quartet_scenario() {
    let tree = four_taxon_tree(1.0, 1.0);
    let table =
        QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.6, 0.3, 0.1])]).unwrap();

    // A and C are not sisters
    let mut net = tree.clone();
    let origin = net.tree_parent_edge(net.leaf_by_label("A").unwrap()).unwrap();
    let target = net.tree_parent_edge(net.leaf_by_label("C").unwrap()).unwrap();
    Move::AddHybrid { origin_edge: origin, target_edge: target, gamma: 0.5 }
        .apply(&mut net, &MoveConfig::default())
        .unwrap();
    net.commit().unwrap();

    let score = hybridnet::score_network(&net, &table).unwrap();
    assert!(score.log_pseudo_likelihood.is_finite());

    let hybrid = net.hybrids().next().unwrap().id();
    Move::DeleteHybrid { hybrid, remove_minor: true }
        .apply(&mut net, &MoveConfig::default())
        .unwrap();
    net.commit().unwrap();
    assert!(net.is_isomorphic_to(&tree));
}
