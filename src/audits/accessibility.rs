//! Wheelchair accessibility analysis shared by stops and trips.
//!
//! Both `stops.wheelchair_boarding` and `trips.wheelchair_accessible` use the
//! same codes: `0` or empty for no information, `1` accessible, `2` not
//! accessible.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::audits::report::{CategoryReport, Insights};
use crate::check::{CheckResult, Details, Level, Recommendation, Share, Status};
use crate::rules::{FormatRule, Genre};
use crate::scoring::{WeightedComponent, round1, weighted_score};
use crate::table::Table;
use crate::validators::format;

/// Share of the combined score taken by the technical format check.
pub const TECHNICAL_WEIGHT: f64 = 0.7;
/// Share of the combined score taken by the completion rate.
pub const COMPLETION_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccessibilityMetrics {
    pub total_records: usize,
    pub no_info: usize,
    pub accessible: usize,
    pub not_accessible: usize,
    pub unknown_values: usize,
    /// Share of records with an explicit `1` or `2`.
    pub completion_rate: f64,
    /// Share of records declared accessible.
    pub accessibility_rate: f64,
}

enum Code {
    NoInfo,
    Accessible,
    NotAccessible,
    Unknown,
}

fn classify(value: &crate::table::Value) -> Code {
    if value.is_truly_empty() {
        return Code::NoInfo;
    }
    match value.as_i64() {
        Some(0) => Code::NoInfo,
        Some(1) => Code::Accessible,
        Some(2) => Code::NotAccessible,
        _ => Code::Unknown,
    }
}

impl AccessibilityMetrics {
    /// Counts each code of `field`; a missing column yields all zero rates.
    pub fn from_table(table: &Table, field: &str) -> Self {
        let mut metrics = Self {
            total_records: table.len(),
            ..Self::default()
        };
        let Some(values) = table.values(field) else {
            return metrics;
        };

        for value in values {
            match classify(value) {
                Code::NoInfo => metrics.no_info += 1,
                Code::Accessible => metrics.accessible += 1,
                Code::NotAccessible => metrics.not_accessible += 1,
                Code::Unknown => metrics.unknown_values += 1,
            }
        }

        if metrics.total_records > 0 {
            let total = metrics.total_records as f64;
            metrics.completion_rate =
                round1((metrics.accessible + metrics.not_accessible) as f64 / total * 100.0);
            metrics.accessibility_rate = round1(metrics.accessible as f64 / total * 100.0);
        }
        metrics
    }

    fn repartition(&self, labels: &[(&str, &str)]) -> BTreeMap<String, Share> {
        let total = self.total_records.max(1) as f64;
        [
            ("0", self.no_info),
            ("1", self.accessible),
            ("2", self.not_accessible),
            ("other", self.unknown_values),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| {
            let label = labels
                .iter()
                .find(|(k, _)| *k == key)
                .map_or_else(|| format!("unknown value ({key})"), |(_, l)| l.to_string());
            let share = Share {
                count,
                percentage: round1(count as f64 / total * 100.0),
                label,
            };
            (key.to_string(), share)
        })
        .collect()
    }
}

/// Advice derived from the accessibility metrics.
pub fn recommendations(metrics: &AccessibilityMetrics) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if metrics.total_records > 0 && metrics.no_info == metrics.total_records {
        out.push(Recommendation::new(
            Level::Critical,
            "wheelchair accessibility is not documented",
            "every record has no accessibility information",
        ));
        return out;
    }

    if metrics.completion_rate < 80.0 {
        out.push(Recommendation::new(
            Level::Warning,
            "improve accessibility coverage",
            format!(
                "only {}% of records state their accessibility",
                metrics.completion_rate
            ),
        ));
    }
    if metrics.accessibility_rate < 50.0 {
        out.push(Recommendation::new(
            Level::Info,
            "review network accessibility",
            format!(
                "only {}% of records are declared accessible",
                metrics.accessibility_rate
            ),
        ));
    }
    if metrics.no_info > 0 && metrics.completion_rate > 20.0 {
        out.push(Recommendation::new(
            Level::Warning,
            "qualify undocumented records",
            format!("{} records carry no accessibility information", metrics.no_info),
        ));
    }
    if metrics.completion_rate >= 90.0 && metrics.accessibility_rate >= 70.0 {
        out.push(Recommendation::new(
            Level::Success,
            "good accessibility coverage",
            format!(
                "coverage {}%, accessible {}%",
                metrics.completion_rate, metrics.accessibility_rate
            ),
        ));
    }
    out
}

/// Full accessibility category for `field` of `table`.
///
/// The score is `0.7 × technical validity + 0.3 × completion rate`.
pub fn analyze(
    table: &Table,
    field: &str,
    id_column: &str,
    labels: &[(&str, &str)],
) -> CategoryReport {
    let rule = FormatRule {
        kind: crate::rules::RuleKind::Enumeration {
            allowed: ["0", "1", "2"].into_iter().map(String::from).collect(),
        },
        genre: Genre::Optional,
        description: format!("{field} uses the 0/1/2 codes"),
    };
    let technical = format::validate(table, field, &rule, id_column);
    let metrics = AccessibilityMetrics::from_table(table, field);

    let technical_pct = match technical.statistics.and_then(|s| s.validity_percent()) {
        Some(p) => p,
        None if technical.status == Status::Error => 0.0,
        None => 100.0,
    };

    let no_info_ids: Vec<String> = table
        .values(field)
        .into_iter()
        .flatten()
        .enumerate()
        .filter(|(_, v)| matches!(classify(v), Code::NoInfo))
        .map(|(i, _)| table.record_id(i, id_column))
        .collect();
    let coverage = CheckResult::new(
        format!("{field}_coverage"),
        format!("records documenting {field}"),
    )
    .with_status(if metrics.completion_rate < 50.0 {
        Status::Warning
    } else {
        Status::Pass
    })
    .with_message(format!("{}% of records are documented", metrics.completion_rate))
    .with_details(Details::AffectedIds {
        affected_ids: no_info_ids,
    });

    let status = if technical.status == Status::Error {
        Status::Error
    } else if metrics.total_records > 0 && metrics.no_info == metrics.total_records {
        Status::Warning
    } else if metrics.completion_rate < 50.0 {
        Status::Warning
    } else {
        technical.status
    };

    let score = weighted_score(vec![
        WeightedComponent {
            name: "technical".into(),
            weight: TECHNICAL_WEIGHT,
            value: round1(technical_pct),
        },
        WeightedComponent {
            name: "completion".into(),
            weight: COMPLETION_WEIGHT,
            value: metrics.completion_rate,
        },
    ]);

    let repartition = metrics.repartition(labels);
    CategoryReport::weighted("accessibility", vec![technical, coverage], score)
        .with_status(status)
        .with_recommendations(recommendations(&metrics))
        .with_insights(Insights::Accessibility {
            field: field.to_string(),
            metrics,
            repartition,
        })
}
