//! Data types produced by the scoring functions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::check::Status;

/// Score of one category, recomputed on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub value: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub grade: String,
    pub breakdown: Breakdown,
}

/// How a [`Score`] was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Breakdown {
    Penalty {
        initial_score: f64,
        checks_evaluated: usize,
        penalties: Vec<PenaltyDetail>,
        total_penalty: f64,
        bonus_applied: f64,
        status_counts: StatusCounts,
    },
    Validity {
        counted: Vec<CheckValidity>,
        excluded: Vec<String>,
    },
    Weighted {
        components: Vec<WeightedComponent>,
    },
    /// No score could be computed (missing or empty file, failed audit).
    Unscored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenaltyDetail {
    pub check: String,
    pub status: Status,
    pub base_penalty: f64,
    pub weight: f64,
    pub weighted_penalty: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub errors: usize,
    pub warnings: usize,
    pub passes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckValidity {
    pub check: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedComponent {
    pub name: String,
    pub weight: f64,
    pub value: f64,
}

/// Settings of the penalty scorer. Every field falls back to its default
/// when absent from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub max_score: f64,
    pub min_score: f64,
    pub error_penalty: f64,
    pub warning_penalty: f64,
    pub bonus_all_pass: f64,
    pub default_weight: f64,
    /// Per check name multiplier applied to its penalty.
    pub weights: BTreeMap<String, f64>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            max_score: 100.0,
            min_score: 0.0,
            error_penalty: 20.0,
            warning_penalty: 5.0,
            bonus_all_pass: 5.0,
            default_weight: 1.0,
            weights: BTreeMap::new(),
        }
    }
}

impl PenaltyConfig {
    pub fn weight(&self, check: &str) -> f64 {
        self.weights.get(check).copied().unwrap_or(self.default_weight)
    }

    pub fn penalty(&self, status: Status) -> f64 {
        match status {
            Status::Error => self.error_penalty,
            Status::Warning => self.warning_penalty,
            _ => 0.0,
        }
    }
}
