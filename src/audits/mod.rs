//! Per-file audits and the engine that runs them.
//!
//! Each GTFS file module declares its rules and registers one entry per audit
//! category (`required_fields`, `data_format`, `data_consistency`, ...) under
//! the file name.

pub mod accessibility;
pub mod agency;
pub mod calendar;
pub mod calendar_dates;
pub mod engine;
pub mod report;
pub mod routes;
pub mod stop_times;
pub mod stops;
pub mod trips;

use std::collections::BTreeMap;

use crate::check::{CheckResult, Details, Status};
use crate::registry::{AuditContext, AuditError, Registry, RegistryBuilder};
use crate::rules::{ColumnRule, FormatRule, Genre};
use crate::table::Table;
use crate::validators::{self, reference};

pub use engine::AuditEngine;
pub use report::{AuditReport, CategoryReport, FileReport, FileStatus, GlobalSummary};

/// Timezone names as used by `agency_timezone` and `stop_timezone`.
pub(crate) const TIMEZONE_PATTERN: &str = r"[A-Za-z_]+(/[A-Za-z0-9_+\-]+){0,2}|UTC";

/// Registry holding every built-in audit.
pub fn default_registry() -> Registry<CategoryReport> {
    let mut builder = Registry::builder();
    register_all(&mut builder);
    builder.build()
}

pub fn register_all(builder: &mut RegistryBuilder<CategoryReport>) {
    agency::register(builder);
    routes::register(builder);
    stops::register(builder);
    trips::register(builder);
    stop_times::register(builder);
    calendar::register(builder);
    calendar_dates::register(builder);
}

/// `data_format` category: every column rule, scored by validity.
pub(crate) fn data_format(
    ctx: &AuditContext<'_>,
    rules: Vec<ColumnRule>,
    id_column: &str,
) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let checks = validators::validate_all(table, &rules, id_column);
    Ok(CategoryReport::validity("data_format", checks))
}

/// Enumeration rule over small integer codes.
pub(crate) fn codes(
    description: &str,
    genre: Genre,
    allowed: &[&str],
) -> Result<FormatRule, AuditError> {
    Ok(FormatRule::enumeration(
        description,
        genre,
        allowed.iter().copied(),
    )?)
}

/// Rows where neither of two alternative columns is filled.
///
/// Passes when at least one of the columns is filled on every row; errors
/// when both columns are absent.
pub(crate) fn either_present(
    table: &Table,
    first: &str,
    second: &str,
    id_column: &str,
    status: Status,
) -> CheckResult {
    let name = format!("{first}_or_{second}");
    let description = format!("{first} or {second} is filled");
    if !table.has_column(first) && !table.has_column(second) {
        return CheckResult::missing_column(name, description, table.name(), first);
    }

    let affected_ids: Vec<String> = table
        .rows()
        .filter(|row| row.get(first).is_truly_empty() && row.get(second).is_truly_empty())
        .map(|row| row.id(id_column))
        .collect();
    if affected_ids.is_empty() {
        return CheckResult::new(name, description)
            .with_message(format!("every row has a {first} or a {second}"));
    }
    CheckResult::new(name, description)
        .with_status(status)
        .with_message(format!(
            "{} rows have neither {first} nor {second}",
            affected_ids.len()
        ))
        .with_details(Details::AffectedIds { affected_ids })
}

/// Checks that every value of `column` is defined by at least one of
/// `sources`, each given as `(file, column)`.
///
/// Sources that are not loaded are skipped; when none is loaded the check is
/// inapplicable.
pub(crate) fn defined_in_any(
    ctx: &AuditContext<'_>,
    column: &str,
    sources: &[(&str, &str)],
) -> Result<CheckResult, AuditError> {
    let table = ctx.table()?;
    let files: Vec<&str> = sources.iter().map(|(f, _)| *f).collect();
    let name = format!("{column}_exists");
    let description = format!("every {column} is defined in {}", files.join(" or "));

    let mut defined = std::collections::BTreeSet::new();
    let mut any_source = false;
    for (file, source_column) in sources {
        if let Some(values) = ctx
            .tables
            .table(file)
            .and_then(|t| reference::distinct_values(t, source_column))
        {
            any_source = true;
            defined.extend(values);
        }
    }

    let referenced = match reference::distinct_values(table, column) {
        Some(values) if any_source => values,
        _ => {
            return Ok(CheckResult::new(name, description)
                .with_status(Status::Info)
                .with_message(format!("{column} cannot be cross-checked"))
                .with_details(Details::Unavailable {
                    reason: crate::check::Unavailable::MissingFileOrField,
                }));
        }
    };

    let values = reference::difference(&referenced, &defined);
    if values.is_empty() {
        return Ok(CheckResult::new(name, description)
            .with_message(format!("all {} values of {column} are defined", referenced.len())));
    }
    Ok(CheckResult::new(name, description)
        .with_status(Status::Error)
        .with_message(format!("{} values of {column} are not defined", values.len()))
        .with_details(Details::Orphans { values }))
}

/// Row count plus the number of distinct values of a few columns.
pub(crate) fn distinct_counts(table: &Table, columns: &[&str]) -> BTreeMap<String, f64> {
    let mut counts = BTreeMap::from([("rows".to_string(), table.len() as f64)]);
    for column in columns {
        if let Some(values) = reference::distinct_values(table, column) {
            counts.insert(format!("distinct_{column}"), values.len() as f64);
        }
    }
    counts
}
