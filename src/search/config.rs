//! Search configuration.

use crate::error::NetworkError;
use crate::moves::{MoveConfig, MoveKind};
use crate::optimize::OptimizerConfig;
use crate::search::AcceptanceSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Search configuration parameters.
///
/// Every field has a default, and fields missing from a JSON document fall
/// back to it:
/// ```
/// use hybridnet::search::{AcceptanceSchedule, SearchConfig};
///
/// let config = SearchConfig::from_json_str(
///     r#"{ "max_iterations": 50, "seed": 7, "schedule": { "kind": "greedy" } }"#,
/// )?;
/// assert_eq!(config.max_iterations, 50);
/// assert_eq!(config.schedule, AcceptanceSchedule::Greedy);
/// assert_eq!(config.restarts, SearchConfig::default().restarts);
/// # Ok::<(), hybridnet::NetworkError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of proposals per search.
    pub max_iterations: usize,
    /// Consecutive iterations without improving the best score by more than
    /// `tolerance` after which the search counts as converged.
    pub stall_iterations: usize,
    /// Minimal improvement of the best score that resets the stall counter.
    pub tolerance: f64,
    /// Base seed; restart `i` uses `seed + i`. `None` draws from the OS.
    pub seed: Option<u64>,
    /// Number of independent searches run by `run_restarts`.
    pub restarts: usize,
    /// Acceptance of non-improving candidates.
    pub schedule: AcceptanceSchedule,
    /// Relative proposal frequency of each move operator.
    pub move_weights: BTreeMap<MoveKind, f64>,
    /// Parameters of the move operators.
    pub moves: MoveConfig,
    /// Budget of the continuous optimizer per candidate.
    pub optimizer: OptimizerConfig,
    /// Length given to edges without one before the search starts.
    pub initial_length: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let move_weights = BTreeMap::from([
            (MoveKind::AddHybrid, 1.0),
            (MoveKind::DeleteHybrid, 1.0),
            (MoveKind::Nni, 2.0),
            (MoveKind::MoveOrigin, 1.0),
            (MoveKind::MoveTarget, 1.0),
        ]);
        Self {
            max_iterations: 1_000,
            stall_iterations: 100,
            tolerance: 1e-5,
            seed: None,
            restarts: 1,
            schedule: AcceptanceSchedule::default(),
            move_weights,
            moves: MoveConfig::default(),
            optimizer: OptimizerConfig::default(),
            initial_length: 1.0,
        }
    }
}

impl SearchConfig {
    /// Parses a configuration from JSON; missing fields take their default.
    ///
    /// # Errors
    /// [NetworkError::MalformedInput] for invalid JSON or inconsistent
    /// values (see [SearchConfig::validate]).
    pub fn from_json_str(json: &str) -> Result<Self, NetworkError> {
        let config: SearchConfig = serde_json::from_str(json)
            .map_err(|e| NetworkError::malformed(format!("search config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, NetworkError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| NetworkError::malformed(format!("search config: {e}")))
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), NetworkError> {
        let bad = |what: &str| Err(NetworkError::malformed(format!("search config: {what}")));
        if self.move_weights.values().any(|w| !w.is_finite() || *w < 0.0) {
            return bad("move weights must be finite and non-negative");
        }
        if self.move_weights.values().sum::<f64>() <= 0.0 {
            return bad("at least one move weight must be positive");
        }
        if !(self.tolerance >= 0.0) {
            return bad("tolerance must be non-negative");
        }
        if !self.schedule.is_valid() {
            return bad("acceptance schedule parameters out of range");
        }
        if !(self.moves.initial_gamma > 0.0 && self.moves.initial_gamma < 1.0) {
            return bad("initial γ must lie in (0, 1)");
        }
        if !(self.moves.initial_hybrid_length >= 0.0 && self.moves.initial_hybrid_length.is_finite()) {
            return bad("initial hybrid length must be finite and non-negative");
        }
        if !(self.initial_length >= 0.0 && self.initial_length.is_finite()) {
            return bad("initial length must be finite and non-negative");
        }
        if self.restarts == 0 {
            return bad("at least one restart is required");
        }
        Ok(())
    }

    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the stall window.
    pub fn with_stall_iterations(mut self, iterations: usize) -> Self {
        self.stall_iterations = iterations;
        self
    }

    /// Sets the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the number of independent restarts.
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    /// Sets the acceptance schedule.
    pub fn with_schedule(mut self, schedule: AcceptanceSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Sets the proposal weight of one operator (0 disables it).
    pub fn with_move_weight(mut self, kind: MoveKind, weight: f64) -> Self {
        self.move_weights.insert(kind, weight);
        self
    }

    pub fn with_moves(mut self, moves: MoveConfig) -> Self {
        self.moves = moves;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }
}
