//! Check results: the unit every validator returns.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::rules::Genre;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Info,
    Warning,
    Error,
    Critical,
}

impl Status {
    fn rank(self) -> u8 {
        match self {
            Status::Info => 0,
            Status::Pass => 1,
            Status::Warning => 2,
            Status::Error => 3,
            Status::Critical => 4,
        }
    }

    /// Most severe status of a set. `info` only wins when nothing else is
    /// present; an empty set is `pass`.
    pub fn most_severe<I: IntoIterator<Item = Status>>(statuses: I) -> Status {
        statuses
            .into_iter()
            .max_by_key(|s| s.rank())
            .unwrap_or(Status::Pass)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Info => "info",
            Status::Warning => "warning",
            Status::Error => "error",
            Status::Critical => "critical",
        }
    }
}

/// Row counts used by the validity scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub invalid: usize,
    pub empty: usize,
}

impl Statistics {
    pub fn valid(&self) -> usize {
        self.total.saturating_sub(self.invalid + self.empty)
    }

    /// Share of valid rows in percent, `None` for an empty column.
    pub fn validity_percent(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.valid() as f64 / self.total as f64 * 100.0)
        }
    }
}

/// Why a check could not be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    MissingFileOrField,
    MissingCoordinates,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidValue {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum FieldIssue {
    MissingColumn { field: String },
    EmptyValues { field: String, count: usize, affected_ids: Vec<String> },
}

impl FieldIssue {
    pub fn field(&self) -> &str {
        match self {
            FieldIssue::MissingColumn { field } | FieldIssue::EmptyValues { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Duplicate {
    pub key: Vec<String>,
    pub occurrences: usize,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentProblem {
    Dangling,
    WrongType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentReference {
    pub child: String,
    pub parent: String,
    pub problem: ParentProblem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairDistance {
    pub child: String,
    pub parent: String,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceReport {
    pub analyzed: usize,
    pub avg_distance_m: f64,
    pub max_distance_m: f64,
    pub over_500m: usize,
    pub over_1000m: usize,
    pub far_pairs: Vec<PairDistance>,
    pub without_coordinates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub count: usize,
    pub percentage: f64,
    pub label: String,
}

/// Structured payload of a check, one variant per family of checks.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Details {
    #[default]
    None,
    MissingColumn {
        column: String,
    },
    Unavailable {
        reason: Unavailable,
    },
    Format {
        invalid: Vec<InvalidValue>,
        empty_ids: Vec<String>,
    },
    AffectedIds {
        affected_ids: Vec<String>,
    },
    RequiredFields {
        problematic_fields: Vec<String>,
        fields: Vec<FieldIssue>,
    },
    Duplicates {
        duplicates: Vec<Duplicate>,
    },
    Orphans {
        values: Vec<String>,
    },
    Unused {
        values: Vec<String>,
    },
    Hierarchy {
        offending_ids: Vec<String>,
        references: Vec<ParentReference>,
    },
    Cycles {
        cycle_ids: Vec<String>,
    },
    Distances(DistanceReport),
    Repartition {
        shares: BTreeMap<String, Share>,
    },
    Counts {
        counts: BTreeMap<String, f64>,
    },
}

/// Result of one rule applied to one table, column or relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub description: String,
    pub status: Status,
    pub message: String,
    pub details: Details,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Genre>,
}

impl CheckResult {
    /// A passing check with no details; refine it with the `with_*` methods.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: Status::Pass,
            message: String::new(),
            details: Details::None,
            statistics: None,
            genre: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn with_statistics(mut self, statistics: Statistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_genre(mut self, genre: Genre) -> Self {
        self.genre = Some(genre);
        self
    }

    /// Error result for a column absent from its table.
    pub fn missing_column(
        name: impl Into<String>,
        description: impl Into<String>,
        table: &str,
        column: &str,
    ) -> Self {
        Self::new(name, description)
            .with_status(Status::Error)
            .with_message(format!("column {column} is missing from {table}"))
            .with_details(Details::MissingColumn {
                column: column.to_string(),
            })
    }

    pub fn is_missing_column(&self) -> bool {
        matches!(self.details, Details::MissingColumn { .. })
    }
}

/// Severity of a recommendation shown next to a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Critical,
    Error,
    Warning,
    Info,
    Success,
}

/// Human-readable advice derived from check results and metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub level: Level,
    pub message: String,
    pub description: String,
}

impl Recommendation {
    pub fn new(level: Level, message: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_severe_ordering() {
        use Status::*;
        assert_eq!(Status::most_severe([Pass, Warning, Pass]), Warning);
        assert_eq!(Status::most_severe([Warning, Error]), Error);
        assert_eq!(Status::most_severe([Error, Critical]), Critical);
        assert_eq!(Status::most_severe([Pass, Info]), Pass);
        assert_eq!(Status::most_severe([Info]), Info);
        assert_eq!(Status::most_severe([]), Pass);
    }

    #[test]
    fn test_statistics_validity() {
        let stats = Statistics {
            total: 4,
            invalid: 1,
            empty: 1,
        };
        assert_eq!(stats.valid(), 2);
        assert_eq!(stats.validity_percent(), Some(50.0));
        let empty = Statistics {
            total: 0,
            invalid: 0,
            empty: 0,
        };
        assert_eq!(empty.validity_percent(), None);
    }

    #[test]
    fn test_missing_column_result() {
        let check = CheckResult::missing_column("stop_url_valid", "urls", "stops.txt", "stop_url");
        assert_eq!(check.status, Status::Error);
        assert!(check.is_missing_column());
    }

    #[test]
    fn test_serializes_status_lowercase() {
        let check = CheckResult::new("x", "y").with_status(Status::Warning);
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], "warning");
        assert_eq!(json["details"]["kind"], "none");
        assert!(json.get("statistics").is_none());
    }
}
