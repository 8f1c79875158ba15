mod common;

use common::{four_taxon_tree, six_taxon_tree};
use hybridnet::NetworkError;
use hybridnet::moves::MoveKind;
use hybridnet::optimize::OptimizerConfig;
use hybridnet::quartets::{PseudoLikelihood, QuartetCF, QuartetTable};
use hybridnet::search::{
    AcceptanceSchedule, QualityFlag, SearchConfig, SearchDriver, StepOutcome, TerminationReason,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::atomic::Ordering;

fn six_taxon_table() -> QuartetTable {
    QuartetTable::new(vec![
        QuartetCF::new(["A", "B", "C", "D"], [0.7, 0.15, 0.15]),
        QuartetCF::new(["A", "B", "E", "F"], [0.7, 0.15, 0.15]),
        QuartetCF::new(["A", "C", "D", "E"], [0.6, 0.2, 0.2]),
        QuartetCF::new(["B", "C", "D", "F"], [0.6, 0.2, 0.2]),
        QuartetCF::new(["A", "D", "E", "F"], [0.15, 0.15, 0.7]),
    ])
    .unwrap()
}

fn driver(config: SearchConfig) -> SearchDriver {
    let net = six_taxon_tree();
    let scorer = PseudoLikelihood::bind(&six_taxon_table(), &net).unwrap();
    SearchDriver::new(config, scorer).unwrap()
}

fn quick_config() -> SearchConfig {
    SearchConfig::default()
        .with_max_iterations(40)
        .with_stall_iterations(40)
        .with_optimizer(OptimizerConfig::default().with_max_rounds(20))
}

// ============= Steps =============

#[test]
fn test_rejected_step_leaves_network_identical() {
    let driver = driver(quick_config().with_schedule(AcceptanceSchedule::Greedy));
    let mut state = driver.init(six_taxon_tree()).unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    let mut rejected = 0;

    for _ in 0..60 {
        let before = state.network().clone();
        let score_before = state.current_score();
        match driver.step(&mut state, &mut rng).unwrap() {
            StepOutcome::Rejected { delta, .. } => {
                rejected += 1;
                assert!(delta <= 0.0);
                assert_eq!(*state.network(), before);
                assert_eq!(state.current_score(), score_before);
            }
            StepOutcome::Illegal { .. } => {
                assert_eq!(*state.network(), before);
            }
            StepOutcome::Accepted { delta, .. } => {
                assert!(delta > 0.0);
                assert!(state.current_score() > score_before);
            }
        }
        assert!(!state.network().in_flight());
        state.network().validate().unwrap();
    }
    assert!(rejected > 0);
    let stats = state.stats();
    assert_eq!(stats.proposed, 60);
    assert_eq!(stats.proposed, stats.accepted + stats.rejected + stats.illegal);
}

#[test]
fn test_best_never_worse_than_current() {
    let driver = driver(quick_config());
    let mut state = driver.init(six_taxon_tree()).unwrap();
    let start_score = state.best_score();
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..30 {
        driver.step(&mut state, &mut rng).unwrap();
        assert!(state.best_score() >= state.current_score());
        assert!(state.best_score() >= start_score);
    }
    assert_eq!(state.iteration(), 30);
    let rescored = driver.scorer().score(state.best()).unwrap();
    assert!((rescored.log_pseudo_likelihood - state.best_score()).abs() < 1e-9);
}

#[test]
fn test_init_fills_missing_lengths() {
    let mut start = hybridnet::model::Network::new();
    let leaves: Vec<_> = ["A", "B", "C", "D"].iter().map(|l| start.add_leaf(*l)).collect();
    let (u, v, root) = (start.add_internal(), start.add_internal(), start.add_internal());
    for (parent, child) in [(u, leaves[0]), (u, leaves[1]), (v, leaves[2]), (v, leaves[3]), (root, u), (root, v)] {
        start.connect(parent, child, None).unwrap();
    }
    start.set_root(root).unwrap();
    start.finalize().unwrap();

    let table =
        QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.8, 0.1, 0.1])]).unwrap();
    let scorer = PseudoLikelihood::bind(&table, &start).unwrap();
    let driver = SearchDriver::new(SearchConfig::default(), scorer).unwrap();
    let state = driver.init(start).unwrap();
    assert!(state.network().edges().all(|e| e.length().is_some()));
    assert!(state.current_score().is_finite());
}

#[test]
fn test_init_rejects_network_in_flight() {
    let driver = driver(quick_config());
    let mut start = six_taxon_tree();
    start.begin().unwrap();
    assert!(matches!(driver.init(start), Err(NetworkError::JournalState(_))));
}

#[test]
fn test_optimizer_failure_is_flagged() {
    let config = quick_config()
        .with_max_iterations(5)
        .with_optimizer(OptimizerConfig::default().with_max_evaluations(2));
    let outcome = driver(config).run_seeded(six_taxon_tree(), 1).unwrap();
    assert!(outcome.flags.contains(&QualityFlag::OptimizerFailed));
    assert!(outcome.best_score.is_finite());
}

// ============= Runs =============

#[test]
fn test_run_is_reproducible() {
    let driver = driver(quick_config());
    let first = driver.run_seeded(six_taxon_tree(), 99).unwrap();
    let second = driver.run_seeded(six_taxon_tree(), 99).unwrap();
    assert_eq!(first.best_score, second.best_score);
    assert_eq!(first.iterations, second.iterations);
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.best, second.best);
    assert_eq!(first.seed, 99);
}

#[test]
fn test_iteration_budget() {
    let config = quick_config().with_max_iterations(7).with_stall_iterations(100);
    let outcome = driver(config).run_seeded(six_taxon_tree(), 3).unwrap();
    assert_eq!(outcome.termination, TerminationReason::IterationBudget);
    assert_eq!(outcome.iterations, 7);
    assert_eq!(outcome.stats.proposed, 7);
    outcome.best.validate().unwrap();
}

#[test]
fn test_stall_detection() {
    let config = quick_config()
        .with_max_iterations(1_000)
        .with_stall_iterations(3)
        .with_schedule(AcceptanceSchedule::Greedy);
    let outcome = driver(config).run_seeded(six_taxon_tree(), 8).unwrap();
    assert_eq!(outcome.termination, TerminationReason::Converged);
    assert!(outcome.iterations < 1_000);
}

#[test]
fn test_cancellation() {
    let driver = driver(quick_config());
    let start = six_taxon_tree();
    let initial = driver.init(start.clone()).unwrap().best_score();

    driver.cancellation().store(true, Ordering::Relaxed);
    let outcome = driver.run_seeded(start, 4).unwrap();
    assert_eq!(outcome.termination, TerminationReason::Cancelled);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.best_score, initial);
}

#[test]
fn test_restarts_return_best_run() {
    let config = quick_config().with_seed(20).with_restarts(3);
    let driver = driver(config);
    let start = six_taxon_tree();
    let outcome = driver.run_restarts(&start).unwrap();

    let best_single = (20..23)
        .map(|seed| driver.run_seeded(start.clone(), seed).unwrap().best_score)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(outcome.best_score, best_single);
    assert!((20..23).contains(&outcome.seed));
}

#[test]
fn test_quick_search_api() {
    let start = four_taxon_tree(0.1, 0.1);
    let table =
        QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.8, 0.1, 0.1])]).unwrap();
    let config = SearchConfig::default().with_max_iterations(10).with_seed(1);
    let outcome = hybridnet::search(&start, &table, config).unwrap();
    assert!(outcome.best_score.is_finite());
    assert_eq!(outcome.best.num_leaves(), 4);
}

// ============= Configuration =============

#[test]
fn test_config_json_round_trip() {
    let config = SearchConfig::default()
        .with_seed(12)
        .with_schedule(AcceptanceSchedule::Geometric { initial_probability: 0.3, decay: 0.99 })
        .with_move_weight(MoveKind::AddHybrid, 0.5);
    let json = config.to_json_string().unwrap();
    assert!(json.contains("\"add_hybrid\""));
    assert!(json.contains("\"geometric\""));
    assert_eq!(SearchConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_config_rejects_bad_values() {
    for json in [
        r#"{ "restarts": 0 }"#,
        r#"{ "move_weights": { "nni": -1.0 } }"#,
        r#"{ "move_weights": { "add_hybrid": 0, "delete_hybrid": 0, "nni": 0, "move_origin": 0, "move_target": 0 } }"#,
        r#"{ "move_weights": { "teleport": 1.0 } }"#,
        r#"{ "schedule": { "kind": "metropolis", "initial_temperature": 1.0, "cooling_rate": 1.5 } }"#,
        r#"{ "moves": { "initial_gamma": 1.0 } }"#,
        r#"{ "max_iterations": "many" }"#,
    ] {
        assert!(
            matches!(SearchConfig::from_json_str(json), Err(NetworkError::MalformedInput(_))),
            "{json}"
        );
    }
}

#[test]
fn test_driver_rejects_invalid_config() {
    let net = six_taxon_tree();
    let scorer = PseudoLikelihood::bind(&six_taxon_table(), &net).unwrap();
    let config = SearchConfig::default().with_restarts(0);
    assert!(matches!(
        SearchDriver::new(config, scorer),
        Err(NetworkError::MalformedInput(_))
    ));
}

// ============= Schedules =============

#[test]
fn test_schedule_probabilities() {
    let greedy = AcceptanceSchedule::Greedy;
    assert_eq!(greedy.probability(0.5, 0), 1.0);
    assert_eq!(greedy.probability(0.0, 0), 0.0);
    assert_eq!(greedy.probability(-0.5, 0), 0.0);

    let metropolis = AcceptanceSchedule::Metropolis { initial_temperature: 2.0, cooling_rate: 0.5 };
    assert_eq!(metropolis.temperature(2), Some(0.5));
    assert!((metropolis.probability(-1.0, 0) - (-0.5f64).exp()).abs() < 1e-12);
    assert!((metropolis.probability(-1.0, 2) - (-2.0f64).exp()).abs() < 1e-12);
    assert_eq!(metropolis.probability(0.0, 10), 1.0);

    let geometric = AcceptanceSchedule::Geometric { initial_probability: 0.4, decay: 0.5 };
    assert!((geometric.probability(-100.0, 1) - 0.2).abs() < 1e-12);
    assert_eq!(geometric.temperature(0), None);

    let mut rng = StdRng::seed_from_u64(0);
    assert!(!greedy.accepts(-1e-9, 0, &mut rng));
    assert!(metropolis.accepts(1e-9, 0, &mut rng));
}

#[test]
fn test_schedules_keep_decaying_on_long_runs() {
    let late = 1usize << 31;
    let metropolis = AcceptanceSchedule::Metropolis { initial_temperature: 1.0, cooling_rate: 0.99 };
    assert_eq!(metropolis.temperature(late), Some(0.0));
    assert_eq!(metropolis.probability(-1.0, late), 0.0);

    let geometric = AcceptanceSchedule::Geometric { initial_probability: 0.5, decay: 0.99 };
    assert_eq!(geometric.probability(-1.0, late), 0.0);
    assert!(geometric.probability(-1.0, late) <= geometric.probability(-1.0, late - 1));
}
