//! Observed quartet concordance factors.

use crate::error::NetworkError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Maximal deviation of a row's proportion sum from 1.
pub const CF_SUM_TOLERANCE: f64 = 0.01;

// =#========================================================================#=
// QUARTET CF
// =#========================================================================#=
/// Observed concordance factors for one 4-taxon set.
///
/// For `taxa = [a, b, c, d]`, `cf` holds the proportions of gene trees
/// supporting `ab|cd`, `ac|bd` and `ad|bc`, in this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuartetCF {
    pub taxa: [String; 4],
    pub cf: [f64; 3],
    /// Number of genes behind the proportions; weights the row in the score.
    #[serde(default)]
    pub sample_size: Option<f64>,
}

impl QuartetCF {
    /// Creates a row without sample size.
    pub fn new(taxa: [&str; 4], cf: [f64; 3]) -> Self {
        QuartetCF {
            taxa: taxa.map(str::to_string),
            cf,
            sample_size: None,
        }
    }

    /// Sets the number of genes behind this row.
    pub fn with_sample_size(mut self, sample_size: f64) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    /// Weight of this row in the pseudo-likelihood.
    pub fn weight(&self) -> f64 {
        self.sample_size.unwrap_or(1.0)
    }

    fn check(&self) -> Result<(), NetworkError> {
        let distinct: HashSet<&str> = self.taxa.iter().map(String::as_str).collect();
        if distinct.len() != 4 {
            return Err(NetworkError::malformed(format!(
                "quartet {:?} repeats a taxon",
                self.taxa
            )));
        }
        if self.cf.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(NetworkError::malformed(format!(
                "quartet {:?} has invalid proportions {:?}",
                self.taxa, self.cf
            )));
        }
        let sum: f64 = self.cf.iter().sum();
        if (sum - 1.0).abs() > CF_SUM_TOLERANCE {
            return Err(NetworkError::malformed(format!(
                "proportions of quartet {:?} sum to {sum}",
                self.taxa
            )));
        }
        if let Some(n) = self.sample_size {
            if !(n.is_finite() && n > 0.0) {
                return Err(NetworkError::malformed(format!(
                    "quartet {:?} has sample size {n}",
                    self.taxa
                )));
            }
        }
        Ok(())
    }
}

// =#========================================================================#=
// QUARTET TABLE
// =#========================================================================#=
/// Validated table of observed quartet concordance factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QuartetTable {
    rows: Vec<QuartetCF>,
}

impl QuartetTable {
    /// Validates and wraps `rows`.
    ///
    /// # Errors
    /// [NetworkError::MalformedInput] if a row repeats a taxon, has negative
    /// or non-finite proportions, proportions not summing to 1 (within
    /// [CF_SUM_TOLERANCE]) or a non-positive sample size.
    pub fn new(rows: Vec<QuartetCF>) -> Result<Self, NetworkError> {
        for row in &rows {
            row.check()?;
        }
        Ok(QuartetTable { rows })
    }

    /// Parses and validates a JSON array of rows.
    pub fn from_json_str(json: &str) -> Result<Self, NetworkError> {
        let rows: Vec<QuartetCF> = serde_json::from_str(json)
            .map_err(|e| NetworkError::malformed(format!("quartet table: {e}")))?;
        QuartetTable::new(rows)
    }

    /// Rows of the table.
    pub fn rows(&self) -> &[QuartetCF] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All taxa mentioned in the table.
    pub fn taxa(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.taxa.iter().map(String::as_str))
            .collect()
    }
}
