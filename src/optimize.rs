//! Continuous-parameter optimization seam.
//!
//! The topology search treats the optimizer as a black box behind two traits:
//! an [Objective] maps a parameter vector to a value to minimize, and an
//! [Optimizer] searches the box-constrained parameter space. The crate owns
//! the mapping between parameter vectors and the network ([ParameterMap]),
//! the optimizer only owns the search directions.
//!
//! [CoordinateDescent] is the default optimizer: cyclic golden-section line
//! searches, one coordinate at a time, bounded by a round cap, an evaluation
//! cap and an optional wall-clock cap.

use crate::error::NetworkError;
use crate::model::{BranchLength, EdgeId, Network};
use crate::quartets::PseudoLikelihood;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Bounds for identifiable branch lengths (coalescent units).
pub const LENGTH_BOUNDS: (f64, f64) = (1e-5, 10.0);
/// Bounds for the γ of a minor hybrid edge.
pub const GAMMA_BOUNDS: (f64, f64) = (1e-4, 0.5);

// =#========================================================================#=
// TRAITS
// =#========================================================================#=
/// Function to minimize over a box.
pub trait Objective {
    /// Number of parameters.
    fn dimension(&self) -> usize;
    /// Lower and upper bound of parameter `index`.
    fn bounds(&self, index: usize) -> (f64, f64);
    /// Value at `x` (lower is better).
    fn evaluate(&mut self, x: &[f64]) -> Result<f64, NetworkError>;
}

/// Box-constrained minimizer.
pub trait Optimizer {
    /// Minimizes `objective` starting from `start`.
    ///
    /// # Errors
    /// [NetworkError::OptimizerFailure] if a budget is exhausted before
    /// convergence; errors of the objective are passed through.
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        start: &[f64],
    ) -> Result<OptimizerReport, NetworkError>;
}

/// Outcome of a successful minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerReport {
    pub parameters: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub rounds: usize,
}

// =#========================================================================#=
// PARAMETER MAP
// =#========================================================================#=
/// A single continuous parameter of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Length of an identifiable edge.
    Length(EdgeId),
    /// γ of an identifiable minor hybrid edge (the partner gets 1 − γ).
    Gamma(EdgeId),
}

/// Mapping between a parameter vector and the network's identifiable
/// lengths and inheritance proportions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMap {
    parameters: Vec<Parameter>,
}

impl ParameterMap {
    /// Collects the identifiable parameters of `net` in edge id order.
    pub fn new(net: &Network) -> Self {
        let mut parameters = Vec::new();
        for edge in net.edges().filter(|e| e.is_identifiable()) {
            parameters.push(Parameter::Length(edge.id()));
            if edge.is_hybrid() && !edge.is_major() {
                parameters.push(Parameter::Gamma(edge.id()));
            }
        }
        ParameterMap { parameters }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns `true` if the network has no identifiable parameter.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// The parameters in vector order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Bounds of parameter `index`.
    pub fn bounds(&self, index: usize) -> (f64, f64) {
        match self.parameters.get(index) {
            Some(Parameter::Gamma(_)) => GAMMA_BOUNDS,
            _ => LENGTH_BOUNDS,
        }
    }

    /// Reads the current parameter vector, clamped into the bounds.
    pub fn read(&self, net: &Network) -> Result<Vec<f64>, NetworkError> {
        self.parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                let (lo, hi) = self.bounds(index);
                let value = match *parameter {
                    Parameter::Length(e) => net.edge(e)?.length().map_or(lo, |l| l.value()),
                    Parameter::Gamma(e) => net.edge(e)?.gamma(),
                };
                Ok(value.clamp(lo, hi))
            })
            .collect()
    }

    /// Writes `x` to the network through the journaled setters.
    pub fn write(&self, net: &mut Network, x: &[f64]) -> Result<(), NetworkError> {
        if x.len() != self.parameters.len() {
            return Err(NetworkError::OptimizerFailure {
                evaluations: 0,
                reason: format!("expected {} parameters, got {}", self.parameters.len(), x.len()),
            });
        }
        for (parameter, &value) in self.parameters.iter().zip(x) {
            match *parameter {
                Parameter::Length(e) => net.set_length(e, Some(BranchLength::try_new(value)?))?,
                Parameter::Gamma(e) => net.set_gamma(e, value)?,
            }
        }
        Ok(())
    }
}

// =#========================================================================#=
// NETWORK OBJECTIVE
// =#========================================================================#=
/// Negated log pseudo-likelihood of a network as a function of its
/// identifiable parameters.
pub struct NetworkObjective<'a> {
    net: &'a mut Network,
    map: &'a ParameterMap,
    scorer: &'a PseudoLikelihood,
}

impl<'a> NetworkObjective<'a> {
    pub fn new(net: &'a mut Network, map: &'a ParameterMap, scorer: &'a PseudoLikelihood) -> Self {
        NetworkObjective { net, map, scorer }
    }
}

impl Objective for NetworkObjective<'_> {
    fn dimension(&self) -> usize {
        self.map.len()
    }

    fn bounds(&self, index: usize) -> (f64, f64) {
        self.map.bounds(index)
    }

    fn evaluate(&mut self, x: &[f64]) -> Result<f64, NetworkError> {
        self.map.write(self.net, x)?;
        Ok(-self.scorer.score(self.net)?.log_pseudo_likelihood)
    }
}

/// Optimizes the identifiable parameters of `net` in place.
///
/// On success the best parameters found are written to `net`. On failure the
/// lengths and γ values from before the call are restored exactly and the
/// error is returned.
pub fn optimize_parameters(
    net: &mut Network,
    scorer: &PseudoLikelihood,
    optimizer: &dyn Optimizer,
) -> Result<OptimizerReport, NetworkError> {
    let map = ParameterMap::new(net);
    let start = map.read(net)?;
    if map.is_empty() {
        let value = -scorer.score(net)?.log_pseudo_likelihood;
        return Ok(OptimizerReport { parameters: start, value, evaluations: 1, rounds: 0 });
    }

    let original: Vec<(EdgeId, Option<BranchLength>, f64)> = net
        .edges()
        .filter(|e| e.is_identifiable())
        .map(|e| (e.id(), e.length(), e.gamma()))
        .collect();
    let result = {
        let mut objective = NetworkObjective::new(net, &map, scorer);
        optimizer.minimize(&mut objective, &start)
    };
    match result {
        Ok(report) => {
            map.write(net, &report.parameters)?;
            Ok(report)
        }
        Err(err) => {
            for (edge, length, gamma) in original {
                net.set_length(edge, length)?;
                if net.edge(edge)?.is_hybrid() && net.edge(edge)?.gamma() != gamma {
                    net.set_gamma(edge, gamma)?;
                }
            }
            Err(err)
        }
    }
}

// =#========================================================================#=
// COORDINATE DESCENT
// =#========================================================================#=
/// Budget and tolerances of [CoordinateDescent].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of passes over all coordinates.
    pub max_rounds: usize,
    /// Maximum number of objective evaluations.
    pub max_evaluations: usize,
    /// Optional wall-clock limit per call, in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// A round improving the value by less than this ends the search.
    pub tolerance: f64,
    /// Width at which a golden-section line search stops.
    pub line_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 50,
            max_evaluations: 20_000,
            time_limit_ms: None,
            tolerance: 1e-6,
            line_tolerance: 1e-4,
        }
    }
}

impl OptimizerConfig {
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_max_evaluations(mut self, evaluations: usize) -> Self {
        self.max_evaluations = evaluations;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = Some(limit.as_millis() as u64);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Cyclic coordinate descent with golden-section line searches.
#[derive(Debug, Clone, Default)]
pub struct CoordinateDescent {
    config: OptimizerConfig,
}

/// Counts evaluations and enforces the budget.
struct Budget<'a> {
    config: &'a OptimizerConfig,
    started: Instant,
    evaluations: usize,
}

impl Budget<'_> {
    fn evaluate(&mut self, objective: &mut dyn Objective, x: &[f64]) -> Result<f64, NetworkError> {
        if self.evaluations >= self.config.max_evaluations {
            return Err(self.failure("evaluation budget exhausted"));
        }
        if let Some(limit) = self.config.time_limit_ms {
            if self.started.elapsed() > Duration::from_millis(limit) {
                return Err(self.failure("time limit exceeded"));
            }
        }
        self.evaluations += 1;
        objective.evaluate(x)
    }

    fn probe(
        &mut self,
        objective: &mut dyn Objective,
        x: &mut [f64],
        index: usize,
        value: f64,
    ) -> Result<f64, NetworkError> {
        x[index] = value;
        self.evaluate(objective, x)
    }

    fn failure(&self, reason: &str) -> NetworkError {
        NetworkError::OptimizerFailure {
            evaluations: self.evaluations,
            reason: reason.to_string(),
        }
    }
}

impl CoordinateDescent {
    pub fn new(config: OptimizerConfig) -> Self {
        CoordinateDescent { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Golden-section search on coordinate `index`; keeps the better of the
    /// current and the line optimum.
    fn line_search(
        &self,
        objective: &mut dyn Objective,
        budget: &mut Budget<'_>,
        x: &mut [f64],
        index: usize,
        current: f64,
    ) -> Result<f64, NetworkError> {
        const INV_PHI: f64 = 0.618_033_988_749_894_9;
        let (mut a, mut b) = objective.bounds(index);
        let original = x[index];

        let mut c = b - INV_PHI * (b - a);
        let mut d = a + INV_PHI * (b - a);
        let mut fc = budget.probe(objective, x, index, c)?;
        let mut fd = budget.probe(objective, x, index, d)?;
        while b - a > self.config.line_tolerance {
            if fc < fd {
                b = d;
                d = c;
                fd = fc;
                c = b - INV_PHI * (b - a);
                fc = budget.probe(objective, x, index, c)?;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + INV_PHI * (b - a);
                fd = budget.probe(objective, x, index, d)?;
            }
        }

        let (best, value) = if fc < fd { (c, fc) } else { (d, fd) };
        if value < current {
            x[index] = best;
            Ok(value)
        } else {
            x[index] = original;
            Ok(current)
        }
    }
}

impl Optimizer for CoordinateDescent {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        start: &[f64],
    ) -> Result<OptimizerReport, NetworkError> {
        let mut budget = Budget {
            config: &self.config,
            started: Instant::now(),
            evaluations: 0,
        };
        let mut x: Vec<f64> = start
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let (lo, hi) = objective.bounds(i);
                v.clamp(lo, hi)
            })
            .collect();
        let mut value = budget.evaluate(objective, &x)?;

        for round in 1..=self.config.max_rounds {
            let before = value;
            for index in 0..objective.dimension() {
                value = self.line_search(objective, &mut budget, &mut x, index, value)?;
            }
            trace!(round, value, "coordinate descent round");
            if before - value < self.config.tolerance {
                debug!(rounds = round, evaluations = budget.evaluations, "optimizer converged");
                return Ok(OptimizerReport {
                    parameters: x,
                    value,
                    evaluations: budget.evaluations,
                    rounds: round,
                });
            }
        }
        Err(budget.failure("round limit reached before convergence"))
    }
}
