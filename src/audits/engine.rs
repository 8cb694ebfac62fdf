//! Runs registered audits over a loaded feed.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::audits::default_registry;
use crate::audits::report::{AuditReport, CategoryReport, FileReport, GlobalSummary};
use crate::config::AuditConfig;
use crate::registry::{AuditContext, Parameters, Registry, RegistryEntry};
use crate::stats::{FeedStatistics, REQUIRED_FILES};
use crate::table::TableSource;

pub struct AuditEngine {
    registry: Registry<CategoryReport>,
    config: AuditConfig,
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::new(default_registry(), AuditConfig::default())
    }
}

impl AuditEngine {
    pub fn new(registry: Registry<CategoryReport>, config: AuditConfig) -> Self {
        Self { registry, config }
    }

    /// Engine with every built-in audit and the given configuration.
    pub fn with_config(config: AuditConfig) -> Self {
        Self::new(default_registry(), config)
    }

    pub fn registry(&self) -> &Registry<CategoryReport> {
        &self.registry
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    fn run_entry(
        &self,
        tables: &dyn TableSource,
        file: &str,
        entry: &RegistryEntry<CategoryReport>,
    ) -> CategoryReport {
        let overrides = self.config.overrides(file, &entry.name);
        let result = Parameters::resolve(&entry.parameters, overrides).and_then(|params| {
            let ctx = AuditContext {
                tables,
                file,
                params: &params,
                scoring: &self.config.scoring,
            };
            entry.call(&ctx)
        });

        match result {
            Ok(report) => {
                debug!(
                    category = %entry.name,
                    status = report.status.as_str(),
                    score = report.score.value,
                    "Audit category done"
                );
                report
            }
            Err(e) => {
                error!(category = %entry.name, error = %e, "Audit category failed");
                CategoryReport::failed(&entry.name, &e)
            }
        }
    }

    /// Audits one file with every entry registered for it, in registration
    /// order.
    ///
    /// A missing or empty file yields a `missing` report; a file with no
    /// registered audit yields `not_implemented`.
    #[tracing::instrument(skip(self, tables))]
    pub fn run_file(&self, tables: &dyn TableSource, file: &str) -> FileReport {
        let table = match tables.table(file) {
            Some(table) if !table.is_empty() => table,
            _ => {
                warn!("File missing or empty");
                return FileReport::missing(file);
            }
        };

        let entries = self.registry.get(file);
        if entries.is_empty() {
            info!(rows = table.len(), "No audit registered");
            return FileReport::not_implemented(file, table.len());
        }

        let categories: Vec<CategoryReport> = entries
            .iter()
            .map(|entry| self.run_entry(tables, file, entry))
            .collect();

        let report = FileReport::processed(file, table.len(), categories);
        info!(
            rows = table.len(),
            checks = report.summary.total_checks,
            status = report.summary.overall_status.as_str(),
            "File audited"
        );
        report
    }

    /// Audits every loaded file plus every required GTFS file.
    #[tracing::instrument(skip_all)]
    pub fn run_all(&self, tables: &dyn TableSource) -> AuditReport {
        let mut files: Vec<&str> = tables.table_names();
        for &required in REQUIRED_FILES {
            if !files.contains(&required) {
                files.push(required);
            }
        }
        self.run_files(tables, &files)
    }

    /// Audits `files` in order, then builds the global summary and feed
    /// statistics.
    #[tracing::instrument(skip_all, fields(files = files.len()))]
    pub fn run_files(&self, tables: &dyn TableSource, files: &[&str]) -> AuditReport {
        let reports: Vec<FileReport> = files
            .iter()
            .map(|file| self.run_file(tables, file))
            .collect();
        let summary = GlobalSummary::from_files(&reports);
        info!(
            files = summary.total_files,
            passed = summary.files_passed,
            warnings = summary.files_with_warnings,
            errors = summary.files_with_errors,
            critical = summary.files_critical,
            "Feed audited"
        );

        AuditReport {
            generated_at: Utc::now(),
            files: reports,
            summary,
            statistics: FeedStatistics::from_store(tables),
        }
    }
}
