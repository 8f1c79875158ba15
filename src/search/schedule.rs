//! Acceptance schedules for worse-scoring candidates.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probability with which a candidate that does not improve the current
/// score is accepted, as a function of the score change and the iteration.
///
/// Improvements (`delta > 0`) are always accepted and never consult the
/// schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceptanceSchedule {
    /// Never accept a candidate that does not improve the score.
    Greedy,
    /// Simulated annealing: accept with `exp(delta / T)` where
    /// `T = initial_temperature * cooling_rate^iteration`.
    Metropolis {
        initial_temperature: f64,
        cooling_rate: f64,
    },
    /// Accept with `initial_probability * decay^iteration`, regardless of
    /// how much worse the candidate is.
    Geometric { initial_probability: f64, decay: f64 },
}

impl Default for AcceptanceSchedule {
    fn default() -> Self {
        AcceptanceSchedule::Metropolis {
            initial_temperature: 1.0,
            cooling_rate: 0.995,
        }
    }
}

impl AcceptanceSchedule {
    /// Temperature at `iteration`, for the Metropolis schedule.
    pub fn temperature(&self, iteration: usize) -> Option<f64> {
        match *self {
            AcceptanceSchedule::Metropolis { initial_temperature, cooling_rate } => {
                Some(initial_temperature * cooling_rate.powf(iteration as f64))
            }
            _ => None,
        }
    }

    /// Acceptance probability of a score change `delta` (new − current log
    /// pseudo-likelihood) at `iteration`.
    pub fn probability(&self, delta: f64, iteration: usize) -> f64 {
        if delta > 0.0 {
            return 1.0;
        }
        match *self {
            AcceptanceSchedule::Greedy => 0.0,
            AcceptanceSchedule::Metropolis { .. } => match self.temperature(iteration) {
                Some(t) if t > 0.0 => (delta / t).exp().min(1.0),
                _ => 0.0,
            },
            AcceptanceSchedule::Geometric { initial_probability, decay } => {
                (initial_probability * decay.powf(iteration as f64)).clamp(0.0, 1.0)
            }
        }
    }

    /// Rolls whether to accept a change `delta` at `iteration`.
    pub fn accepts<R: Rng + ?Sized>(&self, delta: f64, iteration: usize, rng: &mut R) -> bool {
        let p = self.probability(delta, iteration);
        if p >= 1.0 {
            true
        } else if p <= 0.0 {
            false
        } else {
            rng.random::<f64>() < p
        }
    }

    /// Checks that the parameters describe probabilities that decay.
    pub(crate) fn is_valid(&self) -> bool {
        match *self {
            AcceptanceSchedule::Greedy => true,
            AcceptanceSchedule::Metropolis { initial_temperature, cooling_rate } => {
                initial_temperature >= 0.0 && (0.0..=1.0).contains(&cooling_rate)
            }
            AcceptanceSchedule::Geometric { initial_probability, decay } => {
                (0.0..=1.0).contains(&initial_probability) && (0.0..=1.0).contains(&decay)
            }
        }
    }
}
