//! `stops.txt` audits, including the stop/station hierarchy.

use crate::audits::report::{CategoryReport, Insights, counts_check, repartition_check};
use crate::audits::{TIMEZONE_PATTERN, accessibility, codes, data_format, distinct_counts};
use crate::check::{CheckResult, Details, Status, Unavailable};
use crate::registry::{AuditContext, AuditError, ParameterKind, ParameterSpec, RegistryBuilder};
use crate::rules::{Axis, ColumnRule, FormatRule, Genre};
use crate::validators::hierarchy::{self, HierarchySpec};
use crate::validators::{CrossReference, check_required, check_required_fields, check_unique};

pub const FILE: &str = "stops.txt";
const ID: &str = "stop_id";

pub const LOCATION_TYPES: &[(i64, &str)] = &[
    (0, "stop or platform"),
    (1, "station"),
    (2, "entrance or exit"),
    (3, "generic node"),
    (4, "boarding area"),
];

pub const WHEELCHAIR_BOARDING: &[(&str, &str)] = &[
    ("0", "no accessibility information"),
    ("1", "wheelchair boarding possible"),
    ("2", "wheelchair boarding not possible"),
];

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "stop_id is present and unique; name and coordinates are filled",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "coordinates, timezone, URL and code formats",
            vec![],
            |ctx| data_format(ctx, format_rules()?, ID),
        )
        .register(
            FILE,
            "data_consistency",
            "stop_id references with stop_times.txt and transfers.txt, zone_id with fare_rules.txt",
            vec![],
            data_consistency,
        )
        .register(
            FILE,
            "hierarchy_analysis",
            "location_type / parent_station hierarchy, cycles and station distances",
            vec![ParameterSpec::new(
                "require_stations",
                ParameterKind::Boolean,
                true,
                "fail the analysis when no station (location_type=1) is defined",
            )],
            hierarchy_analysis,
        )
        .register(
            FILE,
            "accessibility",
            "wheelchair_boarding coverage",
            vec![],
            |ctx| {
                let table = ctx.table()?;
                Ok(accessibility::analyze(
                    table,
                    "wheelchair_boarding",
                    ID,
                    WHEELCHAIR_BOARDING,
                ))
            },
        )
        .register(
            FILE,
            "statistics",
            "stop counts and location type repartition",
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
            &["stop_name", "stop_lat", "stop_lon"],
            ID,
            "required_fields_present",
        ),
    ];
    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

fn location_type_rule() -> Result<FormatRule, AuditError> {
    codes(
        "valid location types",
        Genre::Optional,
        &["0", "1", "2", "3", "4"],
    )
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    Ok(vec![
        ColumnRule::new(
            "stop_timezone",
            FormatRule::regex("valid timezones", Genre::Optional, TIMEZONE_PATTERN)?,
        ),
        ColumnRule::new("stop_url", FormatRule::url("valid URLs", Genre::Optional)),
        ColumnRule::new(
            "stop_lat",
            FormatRule::coordinate("valid latitudes", Genre::Required, Axis::Latitude),
        ),
        ColumnRule::new(
            "stop_lon",
            FormatRule::coordinate("valid longitudes", Genre::Required, Axis::Longitude),
        ),
        ColumnRule::new(
            "wheelchair_boarding",
            codes("valid wheelchair boarding codes", Genre::Optional, &["0", "1", "2"])?,
        ),
        ColumnRule::new("location_type", location_type_rule()?),
    ])
}

fn data_consistency(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let stop_times = CrossReference::lookup(ctx.tables, FILE, ID, "stop_times.txt");
    let transfers_from =
        CrossReference::lookup(ctx.tables, FILE, ID, "transfers.txt").field("from_stop_id");
    let transfers_to =
        CrossReference::lookup(ctx.tables, FILE, ID, "transfers.txt").field("to_stop_id");
    let fare_origin =
        CrossReference::lookup(ctx.tables, FILE, "zone_id", "fare_rules.txt").field("origin_id");
    let fare_destination = CrossReference::lookup(ctx.tables, FILE, "zone_id", "fare_rules.txt")
        .field("destination_id");

    let checks = vec![
        stop_times.orphans(),
        stop_times.unused(),
        transfers_from.orphans(),
        transfers_to.orphans(),
        fare_origin.orphans(),
        fare_destination.orphans(),
    ];
    Ok(CategoryReport::validity("data_consistency", checks))
}

const HIERARCHY: &str = "hierarchy_analysis";

fn hierarchy_analysis(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let require_stations = ctx.params.bool("require_stations")?;
    let spec = HierarchySpec::default();

    let Some(mut types) = table.values(&spec.type_column) else {
        let check = CheckResult::new("location_type_present", "location_type column exists")
            .with_status(Status::Info)
            .with_message("location_type is absent; the hierarchy cannot be analysed")
            .with_details(Details::Unavailable {
                reason: Unavailable::MissingFileOrField,
            });
        return Ok(CategoryReport::informational(HIERARCHY, vec![check]));
    };

    if types.all(|v| v.is_truly_empty()) {
        let check = CheckResult::new("location_type_filled", "location_type has values")
            .with_status(Status::Error)
            .with_message("location_type is empty on every row");
        return Ok(CategoryReport::validity(HIERARCHY, vec![check]));
    }

    let analysis = hierarchy::analyze(table, &spec, &location_type_rule()?, LOCATION_TYPES);

    if require_stations && analysis.metrics.parent_count == 0 {
        let check = CheckResult::new("stations_defined", "at least one station is defined")
            .with_status(Status::Error)
            .with_message("no station (location_type=1) is defined");
        return Ok(CategoryReport::validity(HIERARCHY, vec![check])
            .with_recommendations(analysis.recommendations));
    }

    let partial = !table.has_column(&spec.parent_column);
    let mut report = CategoryReport::validity(HIERARCHY, analysis.checks)
        .with_recommendations(analysis.recommendations)
        .with_insights(Insights::Hierarchy {
            metrics: analysis.metrics,
            repartition: analysis.repartition,
        });
    if partial {
        report = report.with_status(Status::Info);
    }
    Ok(report)
}

fn statistics(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut checks = vec![counts_check(
        "stop_counts",
        "number of stops, zones and parent stations",
        distinct_counts(table, &[ID, "zone_id", "parent_station"]),
    )];
    if table.has_column("location_type") {
        checks.push(repartition_check(
            "stop_repartition",
            "stops by location type",
            hierarchy::repartition(table, "location_type", LOCATION_TYPES),
        ));
    }
    Ok(CategoryReport::informational("statistics", checks))
}
