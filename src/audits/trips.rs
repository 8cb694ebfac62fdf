//! `trips.txt` audits.

use crate::audits::report::{self, CategoryReport, counts_check, repartition_check};
use crate::audits::{accessibility, codes, data_format, defined_in_any, distinct_counts, either_present};
use crate::check::Status;
use crate::registry::{AuditContext, AuditError, RegistryBuilder};
use crate::rules::{ColumnRule, Genre};
use crate::validators::{CrossReference, check_required, check_required_fields, check_unique};

pub const FILE: &str = "trips.txt";
const ID: &str = "trip_id";

pub const WHEELCHAIR_ACCESSIBLE: &[(&str, &str)] = &[
    ("0", "no accessibility information"),
    ("1", "vehicle can carry a wheelchair"),
    ("2", "no wheelchair can be carried"),
];

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "trip_id is present and unique; route_id and service_id are filled and defined",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "direction, accessibility, bike and car codes",
            vec![],
            |ctx| data_format(ctx, format_rules()?, ID),
        )
        .register(
            FILE,
            "data_consistency",
            "shape_id references with shapes.txt",
            vec![],
            |ctx| {
                let shapes = CrossReference::lookup(ctx.tables, "shapes.txt", "shape_id", FILE);
                Ok(CategoryReport::validity(
                    "data_consistency",
                    vec![shapes.orphans()],
                ))
            },
        )
        .register(
            FILE,
            "accessibility",
            "wheelchair_accessible coverage",
            vec![],
            |ctx| {
                let table = ctx.table()?;
                Ok(accessibility::analyze(
                    table,
                    "wheelchair_accessible",
                    ID,
                    WHEELCHAIR_ACCESSIBLE,
                ))
            },
        )
        .register(
            FILE,
            "statistics",
            "trip counts and direction repartition",
            vec![],
            statistics,
        );
}

fn required_fields(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let checks = vec![
        check_required(table, ID, ID),
        check_unique(table, &[ID], ID),
        check_required_fields(
            table,
            &["route_id", "service_id"],
            ID,
            "required_fields_present",
        ),
        defined_in_any(ctx, "route_id", &[("routes.txt", "route_id")])?,
        defined_in_any(
            ctx,
            "service_id",
            &[
                ("calendar.txt", "service_id"),
                ("calendar_dates.txt", "service_id"),
            ],
        )?,
        either_present(table, "trip_short_name", "trip_headsign", ID, Status::Warning),
    ];
    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    let three = ["0", "1", "2"];
    Ok(vec![
        ColumnRule::new(
            "cars_allowed",
            codes("valid cars_allowed codes", Genre::Optional, &three)?,
        ),
        ColumnRule::new(
            "bikes_allowed",
            codes("valid bikes_allowed codes", Genre::Optional, &three)?,
        ),
        ColumnRule::new(
            "wheelchair_accessible",
            codes("valid wheelchair_accessible codes", Genre::Optional, &three)?,
        ),
        ColumnRule::new(
            "direction_id",
            codes("valid direction_id", Genre::Optional, &["0", "1"])?,
        ),
    ])
}

fn statistics(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut checks = vec![counts_check(
        "trip_counts",
        "number of trips, routes, services and shapes used",
        distinct_counts(table, &[ID, "route_id", "service_id", "shape_id"]),
    )];
    if let Some(values) = table.values("direction_id") {
        let shares = report::repartition(values, table.len(), |k| match k {
            "0" => "outbound".to_string(),
            "1" => "inbound".to_string(),
            other => format!("direction {other}"),
        });
        checks.push(repartition_check(
            "trip_repartition",
            "trips by direction",
            shares,
        ));
    }
    Ok(CategoryReport::informational("statistics", checks))
}
