//! Report structures produced by the audit engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::audits::accessibility::AccessibilityMetrics;
use crate::check::{CheckResult, Details, Recommendation, Share, Status};
use crate::registry::AuditError;
use crate::scoring::{self, PenaltyConfig, Score};
use crate::stats::FeedStatistics;
use crate::table::Value;
use crate::validators::hierarchy::HierarchyMetrics;

/// Extra figures some categories carry next to their checks.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insights {
    #[default]
    None,
    Hierarchy {
        metrics: HierarchyMetrics,
        repartition: BTreeMap<String, Share>,
    },
    Accessibility {
        field: String,
        metrics: AccessibilityMetrics,
        repartition: BTreeMap<String, Share>,
    },
}

impl Insights {
    fn is_none(&self) -> bool {
        matches!(self, Insights::None)
    }
}

/// One audit category of one file (`required_fields`, `data_format`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub name: String,
    pub status: Status,
    pub score: Score,
    pub checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Insights::is_none")]
    pub insights: Insights,
}

impl CategoryReport {
    fn new(name: &str, checks: Vec<CheckResult>, score: Score) -> Self {
        Self {
            name: name.to_string(),
            status: scoring::category_status(&checks),
            score,
            checks,
            recommendations: Vec::new(),
            insights: Insights::None,
        }
    }

    /// Category scored in penalty mode.
    pub fn penalty(name: &str, checks: Vec<CheckResult>, config: &PenaltyConfig) -> Self {
        let score = scoring::penalty_score(&checks, config);
        Self::new(name, checks, score)
    }

    /// Category scored by average validity.
    pub fn validity(name: &str, checks: Vec<CheckResult>) -> Self {
        let score = scoring::validity_score(&checks);
        Self::new(name, checks, score)
    }

    /// Category with a score computed by the caller, e.g. a weighted blend.
    pub fn weighted(name: &str, checks: Vec<CheckResult>, score: Score) -> Self {
        Self::new(name, checks, score)
    }

    /// Descriptive category: `info` status, no score.
    pub fn informational(name: &str, checks: Vec<CheckResult>) -> Self {
        Self {
            status: Status::Info,
            ..Self::new(name, checks, scoring::unscored())
        }
    }

    /// A category whose audit function failed.
    pub fn failed(name: &str, error: &AuditError) -> Self {
        let check = CheckResult::new(format!("{name}_failed"), format!("{name} could not run"))
            .with_status(Status::Critical)
            .with_message(error.to_string());
        Self::new(name, vec![check], scoring::unscored())
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_recommendations(mut self, recommendations: Vec<Recommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_insights(mut self, insights: Insights) -> Self {
        self.insights = insights;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Processed,
    Missing,
    NotImplemented,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Processed => "processed",
            FileStatus::Missing => "missing",
            FileStatus::NotImplemented => "not_implemented",
        }
    }
}

/// Check counts of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub overall_status: Status,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub warning_checks: usize,
    pub error_checks: usize,
    pub critical_checks: usize,
}

impl FileSummary {
    /// `critical` when any check is critical or the file is missing, then the
    /// worst of error and warning, else pass.
    pub fn from_categories(categories: &[CategoryReport], status: FileStatus) -> Self {
        let checks = || categories.iter().flat_map(|c| &c.checks);
        let count = |s: Status| checks().filter(|c| c.status == s).count();

        let passed_checks = count(Status::Pass);
        let warning_checks = count(Status::Warning);
        let error_checks = count(Status::Error);
        let critical_checks = count(Status::Critical);

        let overall_status = if critical_checks > 0 || status == FileStatus::Missing {
            Status::Critical
        } else if error_checks > 0 {
            Status::Error
        } else if warning_checks > 0 {
            Status::Warning
        } else {
            Status::Pass
        };

        Self {
            overall_status,
            total_checks: checks().count(),
            passed_checks,
            warning_checks,
            error_checks,
            critical_checks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: FileStatus,
    pub total_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub categories: Vec<CategoryReport>,
    pub summary: FileSummary,
    pub timestamp: DateTime<Utc>,
}

impl FileReport {
    pub fn processed(file: &str, total_rows: usize, categories: Vec<CategoryReport>) -> Self {
        let summary = FileSummary::from_categories(&categories, FileStatus::Processed);
        Self {
            file: file.to_string(),
            status: FileStatus::Processed,
            total_rows,
            message: None,
            categories,
            summary,
            timestamp: Utc::now(),
        }
    }

    pub fn missing(file: &str) -> Self {
        Self {
            file: file.to_string(),
            status: FileStatus::Missing,
            total_rows: 0,
            message: Some(format!("{file} is missing or empty")),
            categories: Vec::new(),
            summary: FileSummary::from_categories(&[], FileStatus::Missing),
            timestamp: Utc::now(),
        }
    }

    pub fn not_implemented(file: &str, total_rows: usize) -> Self {
        Self {
            file: file.to_string(),
            status: FileStatus::NotImplemented,
            total_rows,
            message: Some(format!("no audit is registered for {file}")),
            categories: Vec::new(),
            summary: FileSummary::from_categories(&[], FileStatus::NotImplemented),
            timestamp: Utc::now(),
        }
    }

    pub fn category(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Mean score percentage over the scored categories.
    pub fn mean_score(&self) -> Option<f64> {
        let scored: Vec<f64> = self
            .categories
            .iter()
            .filter(|c| !matches!(c.score.breakdown, scoring::Breakdown::Unscored))
            .map(|c| c.score.percentage)
            .collect();
        (!scored.is_empty()).then(|| scoring::round1(scoring::utility::mean(&scored)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalSummary {
    pub total_files: usize,
    pub files_passed: usize,
    pub files_with_warnings: usize,
    pub files_with_errors: usize,
    pub files_critical: usize,
    pub files_not_implemented: usize,
}

impl GlobalSummary {
    pub fn from_files(files: &[FileReport]) -> Self {
        let mut summary = GlobalSummary {
            total_files: files.len(),
            ..Default::default()
        };
        for file in files {
            if file.status == FileStatus::NotImplemented {
                summary.files_not_implemented += 1;
                continue;
            }
            match file.summary.overall_status {
                Status::Pass | Status::Info => summary.files_passed += 1,
                Status::Warning => summary.files_with_warnings += 1,
                Status::Error => summary.files_with_errors += 1,
                Status::Critical => summary.files_critical += 1,
            }
        }
        summary
    }
}

/// Everything one run produced.
#[derive(Debug, Serialize)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub summary: GlobalSummary,
    pub statistics: FeedStatistics,
}

impl AuditReport {
    pub fn file(&self, name: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.file == name)
    }
}

/// Share of each distinct value of `values`, keyed by the value itself.
pub fn repartition<'a, I>(
    values: I,
    total: usize,
    label: impl Fn(&str) -> String,
) -> BTreeMap<String, Share>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        let key = if value.is_truly_empty() {
            "empty".to_string()
        } else {
            value.as_text().trim().to_string()
        };
        *counts.entry(key).or_default() += 1;
    }
    let total = total.max(1) as f64;
    counts
        .into_iter()
        .map(|(key, count)| {
            let share = Share {
                count,
                percentage: scoring::round1(count as f64 / total * 100.0),
                label: label(&key),
            };
            (key, share)
        })
        .collect()
}

/// Descriptive check carrying a value repartition.
pub fn repartition_check(
    name: &str,
    description: &str,
    shares: BTreeMap<String, Share>,
) -> CheckResult {
    CheckResult::new(name, description)
        .with_status(Status::Info)
        .with_message(format!("{} distinct values", shares.len()))
        .with_details(Details::Repartition { shares })
}

/// Descriptive check carrying a few counters.
pub fn counts_check(name: &str, description: &str, counts: BTreeMap<String, f64>) -> CheckResult {
    CheckResult::new(name, description)
        .with_status(Status::Info)
        .with_details(Details::Counts { counts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(statuses: &[Status]) -> CategoryReport {
        let checks = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| CheckResult::new(format!("c{i}"), "").with_status(*s))
            .collect();
        CategoryReport::validity("data_format", checks)
    }

    #[test]
    fn test_file_summary_counts() {
        let cats = vec![
            category(&[Status::Pass, Status::Warning]),
            category(&[Status::Error, Status::Info]),
        ];
        let summary = FileSummary::from_categories(&cats, FileStatus::Processed);
        assert_eq!(summary.total_checks, 4);
        assert_eq!(summary.passed_checks, 1);
        assert_eq!(summary.warning_checks, 1);
        assert_eq!(summary.error_checks, 1);
        assert_eq!(summary.overall_status, Status::Error);
    }

    #[test]
    fn test_missing_file_is_critical() {
        let report = FileReport::missing("stops.txt");
        assert_eq!(report.summary.overall_status, Status::Critical);
        assert_eq!(report.summary.total_checks, 0);
    }

    #[test]
    fn test_failed_category_is_critical() {
        let cat = CategoryReport::failed("data_format", &AuditError::MissingTable("x.txt".into()));
        assert_eq!(cat.status, Status::Critical);
        let summary = FileSummary::from_categories(&[cat], FileStatus::Processed);
        assert_eq!(summary.overall_status, Status::Critical);
        assert_eq!(summary.critical_checks, 1);
    }

    #[test]
    fn test_global_summary() {
        let files = vec![
            FileReport::processed("agency.txt", 1, vec![category(&[Status::Pass])]),
            FileReport::processed("routes.txt", 1, vec![category(&[Status::Warning])]),
            FileReport::missing("trips.txt"),
            FileReport::not_implemented("shapes.txt", 3),
        ];
        let summary = GlobalSummary::from_files(&files);
        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.files_passed, 1);
        assert_eq!(summary.files_with_warnings, 1);
        assert_eq!(summary.files_critical, 1);
        assert_eq!(summary.files_not_implemented, 1);
    }

    #[test]
    fn test_repartition_counts_empty() {
        let values = [Value::from("1"), Value::Missing, Value::from("1"), Value::from("2")];
        let shares = repartition(&values, values.len(), |k| format!("value {k}"));
        assert_eq!(shares["1"].count, 2);
        assert_eq!(shares["1"].percentage, 50.0);
        assert_eq!(shares["empty"].count, 1);
        assert_eq!(shares["2"].label, "value 2");
    }

    #[test]
    fn test_mean_score_ignores_unscored() {
        let report = FileReport::processed(
            "stops.txt",
            1,
            vec![
                category(&[Status::Pass]),
                CategoryReport::informational("statistics", vec![]),
            ],
        );
        assert_eq!(report.mean_score(), Some(100.0));
    }
}
