//! Quartet pseudo-likelihood scoring.
//!
//! A [QuartetTable] holds observed concordance factors; binding it to a
//! network with [PseudoLikelihood::bind] resolves taxon labels to leaf ids
//! once, after which any edited version of the network can be scored:
//!
//! ```text
//! log PL = Σ_q w_q Σ_i obs_qi · ln(max(exp_qi, MIN_EXPECTED_CF))
//! ```
//!
//! with `w_q` the row's sample size (1 if absent). Higher is better; a
//! perfect fit of all rows gives the negated summed entropy of the data.
//!
//! ```
//! use hybridnet::model::{BranchLength, Network};
//! use hybridnet::quartets::{PseudoLikelihood, QuartetCF, QuartetTable};
//!
//! # let mut net = Network::new();
//! # let leaves: Vec<_> = ["A", "B", "C", "D"].iter().map(|l| net.add_leaf(*l)).collect();
//! # let (u, v, r) = (net.add_internal(), net.add_internal(), net.add_internal());
//! # let len = Some(BranchLength::new(1.0));
//! # for (parent, leaf) in [(u, 0), (u, 1), (v, 2), (v, 3)] {
//! #     net.connect(parent, leaves[leaf], len)?;
//! # }
//! # net.connect(r, u, Some(BranchLength::new(0.5)))?;
//! # net.connect(r, v, Some(BranchLength::new(0.5)))?;
//! # net.set_root(r)?;
//! # net.finalize()?;
//! let table = QuartetTable::new(vec![QuartetCF::new(["A", "B", "C", "D"], [0.6, 0.3, 0.1])])?;
//! let scorer = PseudoLikelihood::bind(&table, &net)?;
//! let score = scorer.score(&net)?;
//! assert!(score.log_pseudo_likelihood.is_finite());
//! assert_eq!(score.clamped, 0);
//! # Ok::<(), hybridnet::NetworkError>(())
//! ```

/// Expected concordance factors under the network coalescent
pub mod coalescent;
/// Observed concordance factor table
pub mod table;

pub use coalescent::expected_cf;
pub use table::{CF_SUM_TOLERANCE, QuartetCF, QuartetTable};

use crate::error::NetworkError;
use crate::model::{Network, NodeId};
use std::collections::HashMap;
use tracing::trace;

/// Floor applied to expected proportions before taking logarithms.
pub const MIN_EXPECTED_CF: f64 = 1e-10;

// =#========================================================================#=
// SCORE
// =#========================================================================#=
/// Result of scoring a network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Log pseudo-likelihood; higher is better.
    pub log_pseudo_likelihood: f64,
    /// Number of expected proportions raised to [MIN_EXPECTED_CF].
    pub clamped: usize,
    /// Number of quartets scored.
    pub quartets: usize,
}

// =#========================================================================#=
// PSEUDO-LIKELIHOOD
// =#========================================================================#=
#[derive(Debug, Clone, PartialEq)]
struct BoundQuartet {
    leaves: [NodeId; 4],
    observed: [f64; 3],
    weight: f64,
}

/// Quartet table bound to the leaf ids of a network.
///
/// Leaves are never created or removed by moves, so a binding stays valid
/// for every network derived from the bound one.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoLikelihood {
    quartets: Vec<BoundQuartet>,
}

impl PseudoLikelihood {
    /// Resolves the taxa of `table` to leaves of `net`.
    ///
    /// # Errors
    /// [NetworkError::MalformedInput] if a taxon is not a leaf label of `net`.
    pub fn bind(table: &QuartetTable, net: &Network) -> Result<Self, NetworkError> {
        let by_label: HashMap<&str, NodeId> = net
            .leaves()
            .filter_map(|n| n.label().map(|label| (label, n.id())))
            .collect();

        let mut quartets = Vec::with_capacity(table.len());
        for row in table.rows() {
            let mut leaves = [NodeId(0); 4];
            for (slot, taxon) in leaves.iter_mut().zip(&row.taxa) {
                *slot = *by_label.get(taxon.as_str()).ok_or_else(|| {
                    NetworkError::malformed(format!("taxon '{taxon}' is not a leaf of the network"))
                })?;
            }
            quartets.push(BoundQuartet {
                leaves,
                observed: row.cf,
                weight: row.weight(),
            });
        }
        Ok(PseudoLikelihood { quartets })
    }

    /// Number of bound quartets.
    pub fn len(&self) -> usize {
        self.quartets.len()
    }

    /// Returns `true` if no quartet is bound.
    pub fn is_empty(&self) -> bool {
        self.quartets.is_empty()
    }

    /// Scores `net` against the bound table.
    pub fn score(&self, net: &Network) -> Result<Score, NetworkError> {
        let order = net.post_order();
        let mut total = 0.0;
        let mut clamped = 0;
        for quartet in &self.quartets {
            let expected = coalescent::expected_cf_in_order(net, quartet.leaves, &order)?;
            let mut term = 0.0;
            for (obs, exp) in quartet.observed.iter().zip(expected) {
                if exp < MIN_EXPECTED_CF {
                    clamped += 1;
                }
                term += obs * exp.max(MIN_EXPECTED_CF).ln();
            }
            total += quartet.weight * term;
        }
        trace!(score = total, clamped, "scored network");
        Ok(Score {
            log_pseudo_likelihood: total,
            clamped,
            quartets: self.quartets.len(),
        })
    }

    /// Expected concordance factors of every bound quartet, in table order.
    pub fn expected(&self, net: &Network) -> Result<Vec<[f64; 3]>, NetworkError> {
        let order = net.post_order();
        self.quartets
            .iter()
            .map(|q| coalescent::expected_cf_in_order(net, q.leaves, &order))
            .collect()
    }
}
