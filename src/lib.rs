//! Hybridnet is a library to search level-1 phylogenetic networks under a
//! quartet pseudo-likelihood.
//!
//! A phylogenetic network is a rooted DAG whose hybrid nodes have two
//! parents, one reached through a major and one through a minor edge with
//! inheritance probabilities γ summing to 1. This crate offers the building
//! blocks of a hill-climbing / simulated-annealing search over such networks:
//! - Network model: arena-backed [Network](crate::model::Network) of nodes and
//!   edges addressed by stable ids, see [crate::model].
//! - Invariant maintenance: in-cycle, contains-root and identifiability
//!   markers kept consistent after every edit, see [crate::invariants].
//! - Reversible moves: add-hybrid, delete-hybrid, NNI, move-origin and
//!   move-target, each journaled so that a rejected candidate is restored
//!   exactly by [Network::rollback](crate::model::Network::rollback),
//!   see [crate::moves].
//! - Scoring: expected quartet concordance factors under the network
//!   multispecies coalescent and the pseudo-likelihood of observed ones,
//!   see [crate::quartets].
//! - Continuous optimization of branch lengths and γ behind the
//!   [Optimizer](crate::optimize::Optimizer) trait, see [crate::optimize].
//! - Search driver with configurable acceptance schedule, convergence
//!   detection, cancellation and parallel restarts, see [crate::search].
//! - Extended Newick output, see [crate::newick].
//!
//! Limitations:
//! - Only level-1 networks (hybrid cycles are node-disjoint)
//! - Move operators assume binary nodes (tree nodes: one parent and two
//!   children; hybrids: two parents and one child)
//! - No Newick parsing; networks are assembled with the builder methods of
//!   [Network](crate::model::Network)
//!
//! # Usage patterns
//! 1. Use [score_network] and [search] with default settings.
//! 2. Bind a [QuartetTable](crate::quartets::QuartetTable) with
//!    [PseudoLikelihood::bind](crate::quartets::PseudoLikelihood::bind),
//!    configure a [SearchConfig](crate::search::SearchConfig) and drive a
//!    [SearchDriver](crate::search::SearchDriver) yourself, step by step if
//!    needed.
//!
//! ## Example
//! ```
//! use hybridnet::model::Network;
//! use hybridnet::newick::{WriterOptions, to_extended_newick};
//! use hybridnet::quartets::{QuartetCF, QuartetTable};
//! use hybridnet::search::SearchConfig;
//!
//! let mut net = Network::new();
//! let leaves: Vec<_> = ["A", "B", "C", "D"].iter().map(|l| net.add_leaf(*l)).collect();
//! let (u, v, root) = (net.add_internal(), net.add_internal(), net.add_internal());
//! net.connect(u, leaves[0], None)?;
//! net.connect(u, leaves[1], None)?;
//! net.connect(v, leaves[2], None)?;
//! net.connect(v, leaves[3], None)?;
//! net.connect(root, u, None)?;
//! net.connect(root, v, None)?;
//! net.set_root(root)?;
//! net.finalize()?;
//!
//! let table = QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.8, 0.1, 0.1])])?;
//! let config = SearchConfig::default().with_max_iterations(20).with_seed(42);
//! let outcome = hybridnet::search(&net, &table, config)?;
//!
//! assert!(outcome.best_score.is_finite());
//! println!("{}", to_extended_newick(&outcome.best, &WriterOptions::default())?);
//! # Ok::<(), hybridnet::NetworkError>(())
//! ```

pub mod error;
pub mod invariants;
pub mod model;
pub mod moves;
pub mod newick;
pub mod optimize;
pub mod quartets;
pub mod search;

pub use error::NetworkError;

use crate::model::Network;
use crate::quartets::{PseudoLikelihood, QuartetTable, Score};
use crate::search::{SearchConfig, SearchDriver, SearchOutcome};

// ============================================================================
// Quick API
// ============================================================================
/// Scores `net` against the observed concordance factors in `table`.
///
/// See [PseudoLikelihood::score] for details.
///
/// # Errors
/// [NetworkError::MalformedInput] if a taxon of `table` is not a leaf of
/// `net`, or any error from computing expected concordance factors.
pub fn score_network(net: &Network, table: &QuartetTable) -> Result<Score, NetworkError> {
    PseudoLikelihood::bind(table, net)?.score(net)
}

/// Runs `config.restarts` searches from `start` and returns the best outcome.
///
/// See [SearchDriver::run_restarts] for details.
pub fn search(
    start: &Network,
    table: &QuartetTable,
    config: SearchConfig,
) -> Result<SearchOutcome, NetworkError> {
    let scorer = PseudoLikelihood::bind(table, start)?;
    SearchDriver::new(config, scorer)?.run_restarts(start)
}
