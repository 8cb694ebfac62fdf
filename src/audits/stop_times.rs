//! `stop_times.txt` audits, including temporal consistency.

use std::collections::{BTreeMap, BTreeSet};

use crate::audits::report::{CategoryReport, counts_check};
use crate::audits::{codes, data_format};
use crate::check::{CheckResult, Details, Status, Unavailable};
use crate::registry::{AuditContext, AuditError, ParameterKind, ParameterSpec, RegistryBuilder};
use crate::rules::{ColumnRule, FormatRule, Genre};
use crate::scoring::round1;
use crate::scoring::utility::mean;
use crate::stats::Distribution;
use crate::table::Table;
use crate::validators::format::parse_service_time;
use crate::validators::{CrossReference, check_required_fields, check_unique};

pub const FILE: &str = "stop_times.txt";
const ID: &str = "trip_id";

pub const DEFAULT_MAX_DWELL_MINUTES: f64 = 60.0;

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "trip, stop, sequence and times are filled; trip_id + stop_sequence is unique",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "clock times and pickup/drop-off codes",
            vec![],
            |ctx| data_format(ctx, format_rules()?, ID),
        )
        .register(
            FILE,
            "data_consistency",
            "trip_id references with trips.txt",
            vec![],
            |ctx| {
                let trips = CrossReference::lookup(ctx.tables, "trips.txt", "trip_id", FILE);
                Ok(CategoryReport::validity(
                    "data_consistency",
                    vec![trips.orphans(), trips.unused()],
                ))
            },
        )
        .register(
            FILE,
            "temporal_analysis",
            "arrival before departure, dwell times and time progression along each trip",
            vec![ParameterSpec::new(
                "max_dwell_minutes",
                ParameterKind::Number,
                DEFAULT_MAX_DWELL_MINUTES,
                "dwell time above which a stop is reported",
            )],
            temporal_analysis,
        )
        .register(
            FILE,
            "statistics",
            "stop times per trip",
            vec![],
            statistics,
        );
}

fn required_fields(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let checks = vec![
        check_required_fields(
            table,
            &["trip_id", "stop_sequence", "stop_id", "arrival_time", "departure_time"],
            ID,
            "required_fields_present",
        ),
        check_unique(table, &["trip_id", "stop_sequence"], ID),
    ];
    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    let service = ["0", "1", "2", "3"];
    Ok(vec![
        ColumnRule::new(
            "arrival_time",
            FormatRule::time("valid arrival times", Genre::Required),
        ),
        ColumnRule::new(
            "departure_time",
            FormatRule::time("valid departure times", Genre::Required),
        ),
        ColumnRule::new(
            "pickup_type",
            codes("valid pickup_type codes", Genre::Optional, &service)?,
        ),
        ColumnRule::new(
            "drop_off_type",
            codes("valid drop_off_type codes", Genre::Optional, &service)?,
        ),
        ColumnRule::new(
            "timepoint",
            codes("valid timepoint codes", Genre::Optional, &["0", "1"])?,
        ),
    ])
}

/// One stop time with both clock times parsed, in seconds after midnight.
#[derive(Debug, Clone)]
struct Timed {
    trip: String,
    sequence: Option<i64>,
    arrival: Option<u32>,
    departure: Option<u32>,
}

fn timed_rows(table: &Table) -> Vec<Timed> {
    let seconds = |v: &crate::table::Value| parse_service_time(v.as_text().trim());
    table
        .rows()
        .map(|row| Timed {
            trip: row.id(ID),
            sequence: row.get("stop_sequence").as_i64(),
            arrival: seconds(row.get("arrival_time")),
            departure: seconds(row.get("departure_time")),
        })
        .collect()
}

fn inapplicable(name: &str, description: &str, message: &str) -> CheckResult {
    CheckResult::new(name, description)
        .with_status(Status::Info)
        .with_message(message)
        .with_details(Details::Unavailable {
            reason: Unavailable::MissingFileOrField,
        })
}

fn distinct_trips<'a>(rows: impl Iterator<Item = &'a Timed>) -> Vec<String> {
    rows.map(|r| r.trip.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Arrival must not be later than departure at the same stop.
pub fn check_arrival_before_departure(table: &Table) -> CheckResult {
    let name = "arrival_before_departure";
    let description = "arrival_time is not later than departure_time";
    if !table.has_column("arrival_time") || !table.has_column("departure_time") {
        return inapplicable(name, description, "arrival or departure times are missing");
    }

    let rows = timed_rows(table);
    let inconsistent: Vec<&Timed> = rows
        .iter()
        .filter(|r| matches!((r.arrival, r.departure), (Some(a), Some(d)) if a > d))
        .collect();
    if inconsistent.is_empty() {
        return CheckResult::new(name, description).with_message("all arrivals precede departures");
    }
    CheckResult::new(name, description)
        .with_status(Status::Error)
        .with_message(format!(
            "{} stop times arrive after they depart",
            inconsistent.len()
        ))
        .with_details(Details::AffectedIds {
            affected_ids: distinct_trips(inconsistent.into_iter()),
        })
}

/// Stops whose dwell time exceeds `max_dwell_minutes`.
///
/// Rows arriving after they depart are left to
/// [`check_arrival_before_departure`].
pub fn check_stop_duration(table: &Table, max_dwell_minutes: f64) -> CheckResult {
    let name = "excessive_stop_duration";
    let description = format!("dwell times do not exceed {max_dwell_minutes} minutes");
    if !table.has_column("arrival_time") || !table.has_column("departure_time") {
        return inapplicable(name, &description, "arrival or departure times are missing");
    }

    let rows = timed_rows(table);
    let dwells: Vec<(&Timed, f64)> = rows
        .iter()
        .filter_map(|r| match (r.arrival, r.departure) {
            (Some(a), Some(d)) if a <= d => Some((r, f64::from(d - a) / 60.0)),
            _ => None,
        })
        .collect();
    let minutes: Vec<f64> = dwells.iter().map(|(_, m)| *m).collect();
    let long: Vec<&Timed> = dwells
        .iter()
        .filter(|(_, m)| *m > max_dwell_minutes)
        .map(|(r, _)| *r)
        .collect();

    let max = minutes.iter().copied().fold(0.0, f64::max);
    let message = format!(
        "{} stops dwell longer than {max_dwell_minutes} min (max {} min, mean {} min)",
        long.len(),
        round1(max),
        round1(mean(&minutes))
    );
    if long.is_empty() {
        return CheckResult::new(name, description).with_message(message);
    }
    CheckResult::new(name, description)
        .with_status(Status::Warning)
        .with_message(message)
        .with_details(Details::AffectedIds {
            affected_ids: distinct_trips(long.into_iter()),
        })
}

/// Along each trip ordered by `stop_sequence`, a departure must not be later
/// than the next arrival.
pub fn check_time_progression(table: &Table) -> CheckResult {
    let name = "sequential_time_consistency";
    let description = "times never go backwards along a trip";
    let needed = ["trip_id", "stop_sequence", "arrival_time", "departure_time"];
    if needed.iter().any(|c| !table.has_column(c)) {
        return inapplicable(name, description, "trip, sequence or time columns are missing");
    }

    let mut trips: BTreeMap<String, Vec<Timed>> = BTreeMap::new();
    for row in timed_rows(table) {
        if row.sequence.is_some() {
            trips.entry(row.trip.clone()).or_default().push(row);
        }
    }

    let mut regressions = 0;
    let mut affected_ids = Vec::new();
    for (trip, mut stops) in trips {
        stops.sort_by_key(|s| s.sequence);
        let backwards = stops
            .windows(2)
            .filter(|w| matches!((w[0].departure, w[1].arrival), (Some(d), Some(a)) if d > a))
            .count();
        if backwards > 0 {
            regressions += backwards;
            affected_ids.push(trip);
        }
    }

    if affected_ids.is_empty() {
        return CheckResult::new(name, description).with_message("every trip moves forward in time");
    }
    CheckResult::new(name, description)
        .with_status(Status::Error)
        .with_message(format!(
            "{regressions} backward steps in {} trips",
            affected_ids.len()
        ))
        .with_details(Details::AffectedIds { affected_ids })
}

fn temporal_analysis(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let max_dwell = ctx.params.f64("max_dwell_minutes")?;
    let checks = vec![
        check_arrival_before_departure(table),
        check_stop_duration(table, max_dwell),
        check_time_progression(table),
    ];
    Ok(CategoryReport::validity("temporal_analysis", checks))
}

fn statistics(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut per_trip: BTreeMap<String, usize> = BTreeMap::new();
    for value in table.values(ID).into_iter().flatten() {
        if !value.is_truly_empty() {
            *per_trip.entry(value.as_text().into_owned()).or_default() += 1;
        }
    }
    let sizes: Vec<f64> = per_trip.values().map(|&n| n as f64).collect();
    let distribution = Distribution::from_values(&sizes);

    let counts = BTreeMap::from([
        ("rows".to_string(), table.len() as f64),
        ("trips".to_string(), per_trip.len() as f64),
        ("stops_per_trip_mean".to_string(), distribution.mean),
        ("stops_per_trip_stddev".to_string(), distribution.stddev),
        ("stops_per_trip_min".to_string(), distribution.min),
        ("stops_per_trip_max".to_string(), distribution.max),
    ]);
    Ok(CategoryReport::informational(
        "statistics",
        vec![counts_check(
            "stop_times_repartition",
            "stop times per trip",
            counts,
        )],
    ))
}
