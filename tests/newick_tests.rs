mod common;

use common::{four_taxon_tree, one_hybrid_network};
use hybridnet::NetworkError;
use hybridnet::model::Network;
use hybridnet::newick::writer::escape_label;
use hybridnet::newick::{WriterOptions, to_extended_newick, write_networks};

#[test]
fn test_write_tree() {
    let net = four_taxon_tree(0.5, 0.25);
    let newick = to_extended_newick(&net, &WriterOptions::default()).unwrap();
    assert_eq!(newick, "((A:1,B:1):0.5,(C:1,D:1):0.25);");
}

#[test]
fn test_write_tree_with_precision() {
    let net = four_taxon_tree(0.5, 0.25);
    let options = WriterOptions::default().with_precision(2);
    let newick = to_extended_newick(&net, &options).unwrap();
    assert_eq!(newick, "((A:1.00,B:1.00):0.50,(C:1.00,D:1.00):0.25);");
}

#[test]
fn test_write_network() {
    let fixture = one_hybrid_network();
    let newick = to_extended_newick(&fixture.net, &WriterOptions::default()).unwrap();
    assert_eq!(
        newick,
        "((A:1,((B:1,C:1):1)#H1:1::0.75):1,(D:1,#H1:1::0.25):1);"
    );
}

#[test]
fn test_write_network_topology_only() {
    let fixture = one_hybrid_network();
    let newick = to_extended_newick(&fixture.net, &WriterOptions::topology_only()).unwrap();
    assert_eq!(newick, "((A,((B,C))#H1),(D,#H1));");
}

#[test]
fn test_write_network_without_gamma() {
    let fixture = one_hybrid_network();
    let options = WriterOptions { gammas: false, ..WriterOptions::default() };
    let newick = to_extended_newick(&fixture.net, &options).unwrap();
    assert_eq!(newick, "((A:1,((B:1,C:1):1)#H1:1):1,(D:1,#H1:1):1);");
}

#[test]
fn test_write_gamma_without_length() {
    let mut fixture = one_hybrid_network();
    fixture.net.set_length(fixture.minor, None).unwrap();
    let newick = to_extended_newick(&fixture.net, &WriterOptions::default()).unwrap();
    assert!(newick.contains("(D:1,#H1:::0.25)"));
}

#[test]
fn test_subtree_written_below_major_parent() {
    let mut fixture = one_hybrid_network();
    // Swap which parent is major
    fixture.net.set_gamma(fixture.minor, 0.8).unwrap();
    let newick = to_extended_newick(&fixture.net, &WriterOptions::topology_only()).unwrap();
    assert_eq!(newick, "((A,#H1),(D,((B,C))#H1));");
}

#[test]
fn test_every_leaf_written_once() {
    let fixture = one_hybrid_network();
    let newick = to_extended_newick(&fixture.net, &WriterOptions::default()).unwrap();
    for label in ["A", "B", "C", "D"] {
        assert_eq!(newick.matches(label).count(), 1, "{label} in {newick}");
    }
    assert_eq!(newick.matches("#H1").count(), 2);
}

#[test]
fn test_escape_label() {
    assert_eq!(escape_label("Apteryx"), "Apteryx");
    assert_eq!(escape_label("Apteryx owenii"), "'Apteryx owenii'");
    assert_eq!(escape_label("O'Brien"), "'O''Brien'");
    assert_eq!(escape_label("taxon:1"), "'taxon:1'");
    assert_eq!(escape_label("#H1"), "'#H1'");
}

#[test]
fn test_write_quoted_labels() {
    let mut net = Network::new();
    let a = net.add_leaf("Homo sapiens");
    let b = net.add_leaf("Pan");
    let root = net.add_internal();
    net.connect(root, a, None).unwrap();
    net.connect(root, b, None).unwrap();
    net.set_root(root).unwrap();
    let newick = to_extended_newick(&net, &WriterOptions::default()).unwrap();
    assert_eq!(newick, "('Homo sapiens',Pan);");
}

#[test]
fn test_missing_root_is_error() {
    let mut net = Network::new();
    net.add_leaf("A");
    assert!(matches!(
        to_extended_newick(&net, &WriterOptions::default()),
        Err(NetworkError::InvalidTopology(_))
    ));
}

#[test]
fn test_write_networks() {
    let networks = vec![four_taxon_tree(0.5, 0.25), one_hybrid_network().net];
    let mut buffer = Vec::new();
    write_networks(&mut buffer, &networks, &WriterOptions::topology_only()).unwrap();
    let written = String::from_utf8(buffer).unwrap();
    assert_eq!(written, "((A,B),(C,D));\n((A,((B,C))#H1),(D,#H1));\n");

    let mut buffer = Vec::new();
    let err = write_networks(&mut buffer, &[Network::new()], &WriterOptions::default()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
