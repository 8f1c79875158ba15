//! The search loop.

use crate::error::NetworkError;
use crate::model::{BranchLength, Network};
use crate::moves::{Move, MoveKind};
use crate::optimize::{CoordinateDescent, Optimizer, optimize_parameters};
use crate::quartets::{PseudoLikelihood, Score};
use crate::search::SearchConfig;
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

// =#========================================================================#=
// OUTCOME TYPES
// =#========================================================================#=
/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// `max_iterations` proposals were made.
    IterationBudget,
    /// The best score did not improve for `stall_iterations` iterations.
    Converged,
    /// The cancellation flag was raised.
    Cancelled,
}

/// Degradations that did not stop the search but affect result quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityFlag {
    /// The optimizer exhausted its budget at least once; the candidate was
    /// scored with its parameters from before the optimization.
    OptimizerFailed,
    /// At least one expected concordance factor was raised to the floor.
    NumericClamped,
}

/// Counters of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub proposed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub illegal: usize,
    pub optimizer_failures: usize,
}

/// What happened in one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// The candidate was committed.
    Accepted { mv: Move, delta: f64 },
    /// The candidate was scored and rolled back.
    Rejected { mv: Move, delta: f64 },
    /// No legal candidate was produced; the network is unchanged.
    Illegal { kind: MoveKind },
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Network,
    pub best_score: f64,
    pub iterations: usize,
    pub stats: SearchStats,
    pub termination: TerminationReason,
    pub flags: BTreeSet<QualityFlag>,
    pub seed: u64,
}

// =#========================================================================#=
// SEARCH STATE
// =#========================================================================#=
/// Mutable state of one search instance.
#[derive(Debug, Clone)]
pub struct SearchState {
    current: Network,
    current_score: f64,
    best: Network,
    best_score: f64,
    iteration: usize,
    stall: usize,
    stats: SearchStats,
    flags: BTreeSet<QualityFlag>,
}

impl SearchState {
    /// The network the next move is applied to.
    pub fn network(&self) -> &Network {
        &self.current
    }

    /// Score of [SearchState::network].
    pub fn current_score(&self) -> f64 {
        self.current_score
    }

    /// Best network seen so far.
    pub fn best(&self) -> &Network {
        &self.best
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn flags(&self) -> &BTreeSet<QualityFlag> {
        &self.flags
    }

    fn note_score(&mut self, score: &Score) {
        if score.clamped > 0 {
            self.flags.insert(QualityFlag::NumericClamped);
        }
    }
}

// =#========================================================================#=
// SEARCH DRIVER
// =#========================================================================#=
/// Runs the propose / optimize / score / accept-or-rollback loop.
///
/// The driver itself is immutable and shareable; every search owns its
/// network, journal and RNG, so several searches can run in parallel
/// ([SearchDriver::run_restarts]).
pub struct SearchDriver {
    config: SearchConfig,
    scorer: PseudoLikelihood,
    optimizer: Box<dyn Optimizer + Send + Sync>,
    cancel: Arc<AtomicBool>,
    kinds: Vec<MoveKind>,
    weights: WeightedIndex<f64>,
}

impl SearchDriver {
    /// Creates a driver with the default [CoordinateDescent] optimizer.
    ///
    /// # Errors
    /// [NetworkError::MalformedInput] if the configuration is inconsistent.
    pub fn new(config: SearchConfig, scorer: PseudoLikelihood) -> Result<Self, NetworkError> {
        config.validate()?;
        let (kinds, weights): (Vec<MoveKind>, Vec<f64>) = config
            .move_weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(k, w)| (*k, *w))
            .unzip();
        let weights = WeightedIndex::new(&weights)
            .map_err(|e| NetworkError::malformed(format!("move weights: {e}")))?;
        let optimizer = Box::new(CoordinateDescent::new(config.optimizer.clone()));
        Ok(SearchDriver {
            config,
            scorer,
            optimizer,
            cancel: Arc::new(AtomicBool::new(false)),
            kinds,
            weights,
        })
    }

    /// Replaces the continuous optimizer.
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer + Send + Sync>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Uses `flag` as cancellation signal; it is checked once per iteration.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Handle to the cancellation flag.
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn scorer(&self) -> &PseudoLikelihood {
        &self.scorer
    }

    /// Prepares a search from `start`: fills missing lengths, optimizes the
    /// continuous parameters and scores the result.
    ///
    /// # Errors
    /// Any structural problem of `start`, or [NetworkError::MalformedInput].
    pub fn init(&self, mut start: Network) -> Result<SearchState, NetworkError> {
        if start.in_flight() {
            return Err(NetworkError::JournalState("start network has a move in flight"));
        }
        start.fill_missing_lengths(BranchLength::try_new(self.config.initial_length)?)?;
        start.validate()?;

        let mut flags = BTreeSet::new();
        if let Err(err) = optimize_parameters(&mut start, &self.scorer, self.optimizer.as_ref()) {
            if !matches!(err, NetworkError::OptimizerFailure { .. }) {
                return Err(err);
            }
            warn!(%err, "optimizing the start network failed");
            flags.insert(QualityFlag::OptimizerFailed);
        }
        let score = self.scorer.score(&start)?;
        let mut state = SearchState {
            best: start.clone(),
            current: start,
            current_score: score.log_pseudo_likelihood,
            best_score: score.log_pseudo_likelihood,
            iteration: 0,
            stall: 0,
            stats: SearchStats::default(),
            flags,
        };
        state.note_score(&score);
        Ok(state)
    }

    /// Runs one iteration: propose, apply, optimize, score, then commit or
    /// roll back.
    ///
    /// Recoverable errors (illegal targets, invalid results, optimizer
    /// failures) never escape; only malformed input or journal misuse does.
    pub fn step<R: rand::Rng + ?Sized>(
        &self,
        state: &mut SearchState,
        rng: &mut R,
    ) -> Result<StepOutcome, NetworkError> {
        let iteration = state.iteration;
        state.iteration += 1;
        state.stats.proposed += 1;
        let kind = self.kinds[self.weights.sample(rng)];
        let net = &mut state.current;

        let proposal = Move::propose(kind, net, &self.config.moves, rng)
            .and_then(|mv| mv.apply(net, &self.config.moves).map(|_| mv));
        let mv = match proposal {
            Ok(mv) => mv,
            Err(err) if err.is_recoverable() && !matches!(err, NetworkError::JournalState(_)) => {
                debug!(%kind, %err, "no legal candidate");
                state.stats.illegal += 1;
                state.stall += 1;
                return Ok(StepOutcome::Illegal { kind });
            }
            Err(err) => return Err(err),
        };

        match optimize_parameters(net, &self.scorer, self.optimizer.as_ref()) {
            Ok(_) => {}
            Err(NetworkError::OptimizerFailure { evaluations, reason }) => {
                debug!(evaluations, %reason, "optimizer failed, scoring candidate as-is");
                state.stats.optimizer_failures += 1;
                state.flags.insert(QualityFlag::OptimizerFailed);
            }
            Err(err) => {
                net.rollback()?;
                if !err.is_recoverable() {
                    return Err(err);
                }
                state.stats.illegal += 1;
                state.stall += 1;
                return Ok(StepOutcome::Illegal { kind });
            }
        }

        let score = match self.scorer.score(net) {
            Ok(score) => score,
            Err(err) => {
                net.rollback()?;
                return Err(err);
            }
        };
        let delta = score.log_pseudo_likelihood - state.current_score;
        if delta > 0.0 || self.config.schedule.accepts(delta, iteration, rng) {
            net.commit()?;
            state.note_score(&score);
            state.current_score = score.log_pseudo_likelihood;
            state.stats.accepted += 1;
            if state.current_score > state.best_score + self.config.tolerance {
                state.best = state.current.clone();
                state.best_score = state.current_score;
                state.stall = 0;
            } else {
                if state.current_score > state.best_score {
                    state.best = state.current.clone();
                    state.best_score = state.current_score;
                }
                state.stall += 1;
            }
            debug!(%mv, delta, score = state.current_score, "accepted");
            Ok(StepOutcome::Accepted { mv, delta })
        } else {
            net.rollback()?;
            state.stats.rejected += 1;
            state.stall += 1;
            debug!(%mv, delta, "rejected");
            Ok(StepOutcome::Rejected { mv, delta })
        }
    }

    /// Runs a full search from `start` with an RNG seeded from `seed`.
    pub fn run_seeded(&self, start: Network, seed: u64) -> Result<SearchOutcome, NetworkError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = self.init(start)?;
        info!(
            seed,
            score = state.best_score,
            hybrids = state.best.num_hybrids(),
            "search started"
        );

        let mut termination = TerminationReason::IterationBudget;
        while state.iteration < self.config.max_iterations {
            if self.cancel.load(Ordering::Relaxed) {
                termination = TerminationReason::Cancelled;
                break;
            }
            self.step(&mut state, &mut rng)?;
            if state.stall >= self.config.stall_iterations {
                termination = TerminationReason::Converged;
                break;
            }
        }

        info!(
            seed,
            score = state.best_score,
            hybrids = state.best.num_hybrids(),
            iterations = state.iteration,
            ?termination,
            "search finished"
        );
        Ok(SearchOutcome {
            best: state.best,
            best_score: state.best_score,
            iterations: state.iteration,
            stats: state.stats,
            termination,
            flags: state.flags,
            seed,
        })
    }

    /// Runs a search seeded from the configuration (or the OS if unset).
    pub fn run(&self, start: Network) -> Result<SearchOutcome, NetworkError> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        self.run_seeded(start, seed)
    }

    /// Runs `config.restarts` independent searches in parallel, each with
    /// its own copy of `start` and its own RNG stream (`seed + i`), and
    /// returns the one with the best score.
    pub fn run_restarts(&self, start: &Network) -> Result<SearchOutcome, NetworkError> {
        let base = self.config.seed.unwrap_or_else(rand::random);
        let outcomes: Vec<SearchOutcome> = (0..self.config.restarts as u64)
            .into_par_iter()
            .map(|i| self.run_seeded(start.clone(), base.wrapping_add(i)))
            .collect::<Result<_, _>>()?;
        outcomes
            .into_iter()
            .max_by(|a, b| a.best_score.total_cmp(&b.best_score))
            .ok_or_else(|| NetworkError::malformed("at least one restart is required"))
    }
}
