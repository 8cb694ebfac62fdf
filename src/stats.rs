use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::rules::GTFS_DATE_FORMAT;
use crate::scoring::round1;
use crate::scoring::utility::{mean, stddev};
use crate::table::TableSource;

/// Files every GTFS feed must ship.
pub const REQUIRED_FILES: &[&str] = &[
    "agency.txt",
    "routes.txt",
    "trips.txt",
    "stops.txt",
    "stop_times.txt",
];

/// Files the GTFS reference lists as optional or conditionally required.
pub const OPTIONAL_FILES: &[&str] = &[
    "calendar.txt",
    "calendar_dates.txt",
    "fare_attributes.txt",
    "fare_rules.txt",
    "shapes.txt",
    "frequencies.txt",
    "transfers.txt",
    "pathways.txt",
    "levels.txt",
    "feed_info.txt",
    "translations.txt",
    "attributions.txt",
];

#[derive(Debug, Default, Serialize)]
pub struct FileInventory {
    pub present: Vec<String>,
    pub required_present: Vec<String>,
    pub required_missing: Vec<String>,
    pub optional_present: Vec<String>,
    /// Every required file is present.
    pub compliant: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct EntityCounts {
    pub agencies: usize,
    pub routes: usize,
    pub trips: usize,
    pub stops: usize,
    pub stop_times: usize,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let avg = mean(values);
        Self {
            mean: round1(avg),
            stddev: round1(stddev(values, avg)),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ServicePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
    pub sources: Vec<String>,
}

/// Descriptive figures about a whole feed.
#[derive(Debug, Default, Serialize)]
pub struct FeedStatistics {
    pub files: FileInventory,
    pub counts: EntityCounts,
    pub stops_by_location_type: BTreeMap<String, usize>,
    pub stop_times_per_trip: Distribution,
    pub service_period: Option<ServicePeriod>,
}

impl FeedStatistics {
    pub fn from_store(tables: &dyn TableSource) -> Self {
        let present: Vec<String> = tables
            .table_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let has = |name: &str| present.iter().any(|p| p == name);

        let files = FileInventory {
            required_present: REQUIRED_FILES
                .iter()
                .filter(|&&f| has(f))
                .map(|f| f.to_string())
                .collect(),
            required_missing: REQUIRED_FILES
                .iter()
                .filter(|&&f| !has(f))
                .map(|f| f.to_string())
                .collect(),
            optional_present: OPTIONAL_FILES
                .iter()
                .filter(|&&f| has(f))
                .map(|f| f.to_string())
                .collect(),
            compliant: REQUIRED_FILES.iter().all(|&f| has(f)),
            present: present.clone(),
        };

        let count = |name: &str| tables.table(name).map_or(0, |t| t.len());
        let counts = EntityCounts {
            agencies: count("agency.txt"),
            routes: count("routes.txt"),
            trips: count("trips.txt"),
            stops: count("stops.txt"),
            stop_times: count("stop_times.txt"),
        };

        let mut stops_by_location_type = BTreeMap::new();
        if let Some(stops) = tables.table("stops.txt") {
            for row in stops.rows() {
                let ty = row.get("location_type");
                let key = if ty.is_truly_empty() {
                    "0".to_string()
                } else {
                    ty.as_text().trim().to_string()
                };
                *stops_by_location_type.entry(key).or_insert(0) += 1;
            }
        }

        let mut per_trip: BTreeMap<String, usize> = BTreeMap::new();
        if let Some(values) = tables
            .table("stop_times.txt")
            .and_then(|t| t.values("trip_id"))
        {
            for v in values.filter(|v| !v.is_truly_empty()) {
                *per_trip.entry(v.as_text().into_owned()).or_insert(0) += 1;
            }
        }
        let per_trip: Vec<f64> = per_trip.values().map(|&n| n as f64).collect();

        Self {
            files,
            counts,
            stops_by_location_type,
            stop_times_per_trip: Distribution::from_values(&per_trip),
            service_period: service_period(tables),
        }
    }
}

/// First and last service dates over `calendar.txt` and `calendar_dates.txt`.
fn service_period(tables: &dyn TableSource) -> Option<ServicePeriod> {
    let sources = [
        ("calendar.txt", "start_date"),
        ("calendar.txt", "end_date"),
        ("calendar_dates.txt", "date"),
    ];

    let mut range: Option<(NaiveDate, NaiveDate)> = None;
    let mut used: Vec<String> = Vec::new();

    for (file, column) in sources {
        let Some(values) = tables.table(file).and_then(|t| t.values(column)) else {
            continue;
        };
        for value in values {
            let Ok(date) = NaiveDate::parse_from_str(value.as_text().trim(), GTFS_DATE_FORMAT)
            else {
                continue;
            };
            range = Some(match range {
                None => (date, date),
                Some((start, end)) => (start.min(date), end.max(date)),
            });
            if !used.iter().any(|u| u == file) {
                used.push(file.to_string());
            }
        }
    }

    range.map(|(start, end)| ServicePeriod {
        start,
        end,
        days: (end - start).num_days() + 1,
        sources: used,
    })
}
