//! Declarative format rules for single columns.
//!
//! A [`FormatRule`] says what a valid value looks like and whether the column
//! itself is mandatory. Rules are built once per audit module and validated at
//! construction, so a bad pattern surfaces as a [`RuleError`] instead of a
//! silently failing check.

use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default GTFS service date format (`YYYYMMDD`).
pub const GTFS_DATE_FORMAT: &str = "%Y%m%d";

/// Whether a column must be present in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Required,
    Optional,
}

/// Which bound a coordinate column is held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Inclusive `(min, max)` range.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Axis::Latitude => (-90.0, 90.0),
            Axis::Longitude => (-180.0, 180.0),
        }
    }

    pub fn contains(self, value: f64) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&value)
    }
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    Enumeration { allowed: BTreeSet<String> },
    Regex { pattern: Regex },
    Url,
    Coordinate { axis: Axis },
    Date { format: String },
    Time,
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Enumeration { .. } => "enumeration",
            RuleKind::Regex { .. } => "regex",
            RuleKind::Url => "url",
            RuleKind::Coordinate { .. } => "coordinate",
            RuleKind::Date { .. } => "date",
            RuleKind::Time => "time",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid date format `{0}`")]
    InvalidDateFormat(String),
    #[error("enumeration rule `{0}` allows no values")]
    EmptyEnumeration(String),
}

/// How one column is validated.
#[derive(Debug, Clone)]
pub struct FormatRule {
    pub kind: RuleKind,
    pub genre: Genre,
    pub description: String,
}

impl FormatRule {
    pub fn enumeration<I, S>(
        description: impl Into<String>,
        genre: Genre,
        allowed: I,
    ) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let description = description.into();
        let allowed: BTreeSet<String> = allowed.into_iter().map(Into::into).collect();
        if allowed.is_empty() {
            return Err(RuleError::EmptyEnumeration(description));
        }
        Ok(Self {
            kind: RuleKind::Enumeration { allowed },
            genre,
            description,
        })
    }

    /// Regex rule; the pattern must match the whole value.
    pub fn regex(
        description: impl Into<String>,
        genre: Genre,
        pattern: &str,
    ) -> Result<Self, RuleError> {
        let anchored = format!("^(?:{pattern})$");
        let compiled = Regex::new(&anchored).map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            kind: RuleKind::Regex { pattern: compiled },
            genre,
            description: description.into(),
        })
    }

    pub fn url(description: impl Into<String>, genre: Genre) -> Self {
        Self {
            kind: RuleKind::Url,
            genre,
            description: description.into(),
        }
    }

    pub fn coordinate(description: impl Into<String>, genre: Genre, axis: Axis) -> Self {
        Self {
            kind: RuleKind::Coordinate { axis },
            genre,
            description: description.into(),
        }
    }

    /// Date rule using the GTFS `YYYYMMDD` format.
    pub fn date(description: impl Into<String>, genre: Genre) -> Self {
        Self {
            kind: RuleKind::Date {
                format: GTFS_DATE_FORMAT.to_string(),
            },
            genre,
            description: description.into(),
        }
    }

    /// Date rule with a custom chrono `strftime` format.
    pub fn date_with_format(
        description: impl Into<String>,
        genre: Genre,
        format: &str,
    ) -> Result<Self, RuleError> {
        let invalid = format.is_empty()
            || StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
        if invalid {
            return Err(RuleError::InvalidDateFormat(format.to_string()));
        }
        Ok(Self {
            kind: RuleKind::Date {
                format: format.to_string(),
            },
            genre,
            description: description.into(),
        })
    }

    /// Clock time rule (`H:MM:SS` / `HH:MM:SS`, hours may pass 23).
    pub fn time(description: impl Into<String>, genre: Genre) -> Self {
        Self {
            kind: RuleKind::Time,
            genre,
            description: description.into(),
        }
    }
}

/// A rule bound to the column it applies to.
#[derive(Debug, Clone)]
pub struct ColumnRule {
    pub column: String,
    pub rule: FormatRule,
}

impl ColumnRule {
    pub fn new(column: impl Into<String>, rule: FormatRule) -> Self {
        Self {
            column: column.into(),
            rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_bounds_are_inclusive() {
        assert!(Axis::Latitude.contains(90.0));
        assert!(Axis::Latitude.contains(-90.0));
        assert!(!Axis::Latitude.contains(90.0001));
        assert!(Axis::Longitude.contains(-180.0));
        assert!(!Axis::Longitude.contains(180.5));
    }

    #[test]
    fn test_regex_is_anchored() {
        let rule = FormatRule::regex("colour", Genre::Optional, "[0-9A-Fa-f]{6}").unwrap();
        let RuleKind::Regex { pattern } = &rule.kind else {
            panic!("expected a regex rule");
        };
        assert!(pattern.is_match("FFAA00"));
        assert!(!pattern.is_match("FFAA00FF"));
        assert!(!pattern.is_match("xFFAA00"));
    }

    #[test]
    fn test_invalid_regex_is_rule_error() {
        let err = FormatRule::regex("broken", Genre::Optional, "([a-z").unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_enumeration_rejected() {
        let err = FormatRule::enumeration("nothing", Genre::Required, Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, RuleError::EmptyEnumeration(_)));
    }

    #[test]
    fn test_date_format_validation() {
        assert!(FormatRule::date_with_format("iso", Genre::Required, "%Y-%m-%d").is_ok());
        assert!(FormatRule::date_with_format("bad", Genre::Required, "%Q").is_err());
        assert!(FormatRule::date_with_format("empty", Genre::Required, "").is_err());
    }
}
