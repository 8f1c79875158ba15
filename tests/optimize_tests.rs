mod common;

use common::{four_taxon_tree, one_hybrid_network};
use hybridnet::NetworkError;
use hybridnet::model::Network;
use hybridnet::optimize::{
    CoordinateDescent, GAMMA_BOUNDS, LENGTH_BOUNDS, Objective, Optimizer, OptimizerConfig,
    OptimizerReport, Parameter, ParameterMap, optimize_parameters,
};
use hybridnet::quartets::{PseudoLikelihood, QuartetCF, QuartetTable};

fn scorer_for(net: &Network, cf: [f64; 3]) -> PseudoLikelihood {
    let table = QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], cf)]).unwrap();
    PseudoLikelihood::bind(&table, net).unwrap()
}

fn internal_length(net: &Network) -> f64 {
    let root = net.root_id().unwrap();
    net.child_edges(root)
        .map(|e| net.edge(e).unwrap().length().unwrap().value())
        .sum()
}

/// Sets every parameter to the middle of its bounds.
struct Midpoint;

impl Optimizer for Midpoint {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        _start: &[f64],
    ) -> Result<OptimizerReport, NetworkError> {
        let parameters: Vec<f64> = (0..objective.dimension())
            .map(|i| {
                let (lo, hi) = objective.bounds(i);
                (lo + hi) / 2.0
            })
            .collect();
        let value = objective.evaluate(&parameters)?;
        Ok(OptimizerReport { parameters, value, evaluations: 1, rounds: 1 })
    }
}

#[test]
fn test_parameter_map_of_tree() {
    let net = four_taxon_tree(0.5, 0.5);
    let map = ParameterMap::new(&net);
    // Only one of the two root edges is identifiable
    assert_eq!(map.len(), 1);
    assert!(matches!(map.parameters()[0], Parameter::Length(_)));
    assert_eq!(map.bounds(0), LENGTH_BOUNDS);
    assert_eq!(map.read(&net).unwrap(), vec![0.5]);
}

#[test]
fn test_parameter_map_of_network() {
    let fixture = one_hybrid_network();
    let map = ParameterMap::new(&fixture.net);
    let gamma_index = map
        .parameters()
        .iter()
        .position(|p| *p == Parameter::Gamma(fixture.minor))
        .unwrap();
    assert_eq!(map.bounds(gamma_index), GAMMA_BOUNDS);
    assert_eq!(map.read(&fixture.net).unwrap()[gamma_index], 0.25);
    assert!(!map.parameters().contains(&Parameter::Gamma(fixture.major)));
}

#[test]
fn test_parameter_map_write_checks_length() {
    let mut net = four_taxon_tree(0.5, 0.5);
    let map = ParameterMap::new(&net);
    assert!(matches!(
        map.write(&mut net, &[1.0, 2.0]),
        Err(NetworkError::OptimizerFailure { .. })
    ));
}

#[test]
fn test_coordinate_descent_fits_internal_length() {
    let mut net = four_taxon_tree(0.05, 0.05);
    // 1 - 2/3 exp(-s) = 0.8 at s = ln(10/3)
    let scorer = scorer_for(&net, [0.8, 0.1, 0.1]);
    let before = scorer.score(&net).unwrap();

    let optimizer = CoordinateDescent::new(OptimizerConfig::default());
    let report = optimize_parameters(&mut net, &scorer, &optimizer).unwrap();

    let target = (10.0f64 / 3.0).ln();
    assert!((internal_length(&net) - target).abs() < 1e-3);
    assert!(report.evaluations > 1);
    assert!(report.rounds >= 1);
    let after = scorer.score(&net).unwrap();
    assert!(after.log_pseudo_likelihood > before.log_pseudo_likelihood);
    assert!((report.value + after.log_pseudo_likelihood).abs() < 1e-12);
}

#[test]
fn test_failure_restores_parameters() {
    let mut net = four_taxon_tree(0.05, 0.05);
    let before = net.clone();
    let scorer = scorer_for(&net, [0.8, 0.1, 0.1]);

    let optimizer = CoordinateDescent::new(OptimizerConfig::default().with_max_evaluations(3));
    let err = optimize_parameters(&mut net, &scorer, &optimizer).unwrap_err();
    assert!(matches!(err, NetworkError::OptimizerFailure { evaluations: 3, .. }));
    assert_eq!(net, before);

    let optimizer = CoordinateDescent::new(OptimizerConfig::default().with_max_rounds(1));
    let err = optimize_parameters(&mut net, &scorer, &optimizer).unwrap_err();
    assert!(matches!(err, NetworkError::OptimizerFailure { .. }));
    assert_eq!(net, before);
}

#[test]
fn test_custom_optimizer_through_trait() {
    let mut fixture = one_hybrid_network();
    let scorer = scorer_for(&fixture.net, [0.3, 0.3, 0.4]);
    let report = optimize_parameters(&mut fixture.net, &scorer, &Midpoint).unwrap();
    assert_eq!(report.evaluations, 1);

    let minor = fixture.net.edge(fixture.minor).unwrap();
    let major = fixture.net.edge(fixture.major).unwrap();
    let mid_gamma = (GAMMA_BOUNDS.0 + GAMMA_BOUNDS.1) / 2.0;
    assert_eq!(minor.gamma(), mid_gamma);
    assert!((major.gamma() + minor.gamma() - 1.0).abs() < 1e-12);
    assert!(major.is_major());
    fixture.net.validate().unwrap();
}

#[test]
fn test_optimizer_respects_journal() {
    let mut net = four_taxon_tree(0.05, 0.05);
    let before = net.clone();
    let scorer = scorer_for(&net, [0.8, 0.1, 0.1]);

    net.begin().unwrap();
    optimize_parameters(&mut net, &scorer, &CoordinateDescent::default()).unwrap();
    assert_ne!(net, before);
    net.rollback().unwrap();
    assert_eq!(net, before);
}

#[test]
fn test_optimizer_config_from_json() {
    let config: OptimizerConfig = serde_json::from_str(r#"{ "max_rounds": 5 }"#).unwrap();
    assert_eq!(config.max_rounds, 5);
    assert_eq!(config.max_evaluations, OptimizerConfig::default().max_evaluations);
}
