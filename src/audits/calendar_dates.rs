//! `calendar_dates.txt` audits.

use crate::audits::report::{self, CategoryReport, repartition_check};
use crate::audits::{codes, data_format};
use crate::registry::{AuditContext, AuditError, RegistryBuilder};
use crate::rules::{ColumnRule, FormatRule, Genre};
use crate::validators::{CrossReference, check_required_fields, check_unique};

pub const FILE: &str = "calendar_dates.txt";
const ID: &str = "service_id";

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "service_id, date and exception_type are filled; service_id + date is unique",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "exception codes and dates",
            vec![],
            |ctx| data_format(ctx, format_rules()?, ID),
        )
        .register(
            FILE,
            "data_consistency",
            "service_id use in trips.txt",
            vec![],
            |ctx| {
                let trips = CrossReference::lookup(ctx.tables, FILE, ID, "trips.txt");
                Ok(CategoryReport::validity(
                    "data_consistency",
                    vec![trips.unused()],
                ))
            },
        )
        .register(
            FILE,
            "statistics",
            "added and removed service days",
            vec![],
            statistics,
        );
}

fn required_fields(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let checks = vec![
        check_required_fields(
            table,
            &["service_id", "date", "exception_type"],
            ID,
            "required_fields_present",
        ),
        check_unique(table, &["service_id", "date"], ID),
    ];
    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    Ok(vec![
        ColumnRule::new(
            "exception_type",
            codes("valid exception types", Genre::Required, &["1", "2"])?,
        ),
        ColumnRule::new("date", FormatRule::date("valid dates", Genre::Required)),
    ])
}

fn statistics(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut checks = Vec::new();
    if let Some(values) = table.values("exception_type") {
        let shares = report::repartition(values, table.len(), |k| match k {
            "1" => "service added".to_string(),
            "2" => "service removed".to_string(),
            other => format!("exception {other}"),
        });
        checks.push(repartition_check(
            "exception_repartition",
            "calendar exceptions by type",
            shares,
        ));
    }
    Ok(CategoryReport::informational("statistics", checks))
}
