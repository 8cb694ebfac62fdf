//! `calendar.txt` audits.

use chrono::NaiveDate;

use crate::audits::report::{CategoryReport, counts_check};
use crate::audits::{codes, data_format, distinct_counts};
use crate::check::{CheckResult, Details, Status};
use crate::registry::{AuditContext, AuditError, RegistryBuilder};
use crate::rules::{ColumnRule, FormatRule, GTFS_DATE_FORMAT, Genre};
use crate::table::Table;
use crate::validators::{CrossReference, check_required, check_required_fields, check_unique};

pub const FILE: &str = "calendar.txt";
const ID: &str = "service_id";

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "service_id is present and unique; weekdays and dates are filled",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "weekday flags and service dates",
            vec![],
            |ctx| data_format(ctx, format_rules()?, ID),
        )
        .register(
            FILE,
            "data_consistency",
            "service periods and service_id use in trips.txt",
            vec![],
            |ctx| {
                let table = ctx.table()?;
                let trips = CrossReference::lookup(ctx.tables, FILE, ID, "trips.txt");
                Ok(CategoryReport::validity(
                    "data_consistency",
                    vec![check_date_order(table), trips.unused()],
                ))
            },
        )
        .register(
            FILE,
            "statistics",
            "services and active weekdays",
            vec![],
            statistics,
        );
}

fn required_fields(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut fields = WEEKDAYS.to_vec();
    fields.extend(["start_date", "end_date"]);
    let checks = vec![
        check_required(table, ID, ID),
        check_unique(table, &[ID], ID),
        check_required_fields(table, &fields, ID, "required_fields_present"),
    ];
    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    let mut rules = WEEKDAYS
        .iter()
        .map(|day| {
            Ok(ColumnRule::new(
                *day,
                codes(&format!("valid {day} flags"), Genre::Required, &["0", "1"])?,
            ))
        })
        .collect::<Result<Vec<_>, AuditError>>()?;
    rules.push(ColumnRule::new(
        "start_date",
        FormatRule::date("valid start dates", Genre::Required),
    ));
    rules.push(ColumnRule::new(
        "end_date",
        FormatRule::date("valid end dates", Genre::Required),
    ));
    Ok(rules)
}

/// `end_date` must not precede `start_date`. Unparsable dates are left to the
/// format checks.
pub fn check_date_order(table: &Table) -> CheckResult {
    let name = "start_before_end";
    let description = "start_date is not after end_date";
    let date = |v: &crate::table::Value| {
        NaiveDate::parse_from_str(v.as_text().trim(), GTFS_DATE_FORMAT).ok()
    };

    let affected_ids: Vec<String> = table
        .rows()
        .filter(|row| matches!(
            (date(row.get("start_date")), date(row.get("end_date"))),
            (Some(start), Some(end)) if start > end
        ))
        .map(|row| row.id(ID))
        .collect();

    if affected_ids.is_empty() {
        return CheckResult::new(name, description).with_message("all service periods are ordered");
    }
    CheckResult::new(name, description)
        .with_status(Status::Error)
        .with_message(format!("{} services end before they start", affected_ids.len()))
        .with_details(Details::AffectedIds { affected_ids })
}

fn statistics(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut counts = distinct_counts(table, &[ID]);
    for day in WEEKDAYS {
        let active = table
            .values(day)
            .into_iter()
            .flatten()
            .filter(|v| v.as_i64() == Some(1))
            .count();
        counts.insert(format!("active_{day}"), active as f64);
    }
    Ok(CategoryReport::informational(
        "statistics",
        vec![counts_check("service_days", "services running on each weekday", counts)],
    ))
}
