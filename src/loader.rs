//! Reads a GTFS directory into a [`TableStore`].
//!
//! Every `*.txt` file becomes one [`Table`]. Column types come from
//! [`column_type`]; identifiers always stay text so that `"01"` and `"1"`
//! remain distinct keys.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::table::{Column, ColumnType, Table, TableStore, Value};

const BOM: char = '\u{feff}';

const FLOAT_COLUMNS: &[&str] = &[
    "stop_lat",
    "stop_lon",
    "shape_pt_lat",
    "shape_pt_lon",
    "shape_dist_traveled",
    "price",
    "length",
];

const INTEGER_COLUMNS: &[&str] = &[
    "location_type",
    "wheelchair_boarding",
    "wheelchair_accessible",
    "bikes_allowed",
    "route_type",
    "route_sort_order",
    "direction_id",
    "stop_sequence",
    "pickup_type",
    "drop_off_type",
    "continuous_pickup",
    "continuous_drop_off",
    "timepoint",
    "exception_type",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "shape_pt_sequence",
    "transfer_type",
    "min_transfer_time",
    "payment_method",
    "headway_secs",
    "exact_times",
];

/// Declared type of a GTFS column, by name.
pub fn column_type(column: &str) -> ColumnType {
    if FLOAT_COLUMNS.contains(&column) {
        ColumnType::Float
    } else if INTEGER_COLUMNS.contains(&column) {
        ColumnType::Integer
    } else if column == "date" || column.ends_with("_date") {
        ColumnType::Date
    } else if column.ends_with("_time") && column != "min_transfer_time" {
        ColumnType::Time
    } else {
        ColumnType::String
    }
}

/// Parses one CSV file.
///
/// Header names are trimmed and a leading byte order mark is dropped. Short
/// rows are padded with missing cells and long rows are truncated.
pub fn load_table(name: &str, reader: impl Read) -> Result<Table> {
    let mut csv = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let columns: Vec<Column> = csv
        .headers()
        .with_context(|| format!("reading header of {name}"))?
        .iter()
        .map(|h| h.trim_start_matches(BOM).trim())
        .map(|h| Column::new(h, column_type(h)))
        .collect();
    let types: Vec<ColumnType> = columns.iter().map(|c| c.ty).collect();
    let mut table = Table::new(name, columns);

    let mut ragged = 0usize;
    for (line, record) in csv.records().enumerate() {
        let record = record.with_context(|| format!("reading {name} record {}", line + 1))?;
        if record.len() != types.len() {
            ragged += 1;
        }
        let row = types
            .iter()
            .enumerate()
            .map(|(i, ty)| record.get(i).map_or(Value::Missing, |raw| Value::parse(raw, *ty)))
            .collect();
        table.push_row(row)?;
    }

    if ragged > 0 {
        warn!(file = name, ragged, "Rows with a field count different from the header");
    }
    debug!(file = name, rows = table.len(), columns = types.len(), "Table loaded");
    Ok(table)
}

/// Loads every `*.txt` file of a GTFS directory.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_dir(path: impl AsRef<Path>) -> Result<TableStore> {
    let path = path.as_ref();
    let mut entries: Vec<_> = std::fs::read_dir(path)
        .with_context(|| format!("reading feed directory {}", path.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut store = TableStore::new();
    for entry in entries {
        let file_path = entry.path();
        let is_txt = file_path.extension().is_some_and(|ext| ext == "txt");
        if !is_txt || !file_path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let file = std::fs::File::open(&file_path)
            .with_context(|| format!("opening {}", file_path.display()))?;
        store.insert(load_table(&name, file)?);
    }

    info!(tables = store.len(), "Feed loaded");
    Ok(store)
}
