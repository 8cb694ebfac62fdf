//! In-memory tables handed to the audit engine.
//!
//! A [`Table`] holds one GTFS file as typed rows. Tables are built once by a
//! loader and only read afterwards; nothing in the engine mutates them.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Tokens treated as "no value" when they show up as text in a cell.
const EMPTY_TOKENS: &[&str] = &["nan", "none", "null", "n/a", "na", "#n/a"];

/// Identifier reported when a record has no usable id.
pub const UNKNOWN_ID: &str = "N/A";

static MISSING: Value = Value::Missing;

/// Declared semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Date,
    Time,
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    /// Builds a cell from raw CSV text, parsing it according to `ty`.
    ///
    /// Text that does not parse as the declared numeric type is kept verbatim
    /// so that format checks can report it.
    pub fn parse(raw: &str, ty: ColumnType) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match ty {
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnType::String | ColumnType::Date | ColumnType::Time => Value::Text(raw.to_string()),
        }
    }

    /// True for a missing cell, blank text, or a NaN float.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Float(f) => f.is_nan(),
            Value::Integer(_) => false,
        }
    }

    /// [`Value::is_null`] plus the textual placeholders spreadsheets leave
    /// behind (`nan`, `n/a`, `#N/A`, ...), compared case-insensitively.
    pub fn is_truly_empty(&self) -> bool {
        if self.is_null() {
            return true;
        }
        match self {
            Value::Text(s) => {
                let lowered = s.trim().to_lowercase();
                EMPTY_TOKENS.contains(&lowered.as_str())
            }
            _ => false,
        }
    }

    /// String rendering used for comparisons and reporting. Missing cells
    /// render as the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Missing => Cow::Borrowed(""),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
            Value::Integer(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(f.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    /// Integer view of the cell; integral floats and numeric text qualify.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("row {row} of {table} has {found} values, expected {expected}")]
    RowArity {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// A named GTFS file: a schema plus rows that all follow it.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Convenience constructor used heavily by tests and small callers.
    pub fn from_rows(
        name: impl Into<String>,
        columns: &[(&str, ColumnType)],
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut table = Table::new(
            name,
            columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
        );
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowArity {
                table: self.name.clone(),
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// All values of one column in row order, or `None` if the column is absent.
    pub fn values(&self, column: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(move |(index, values)| Row {
            table: self,
            index,
            values,
        })
    }

    /// Identifier of row `index` taken from `id_column`, or [`UNKNOWN_ID`].
    pub fn record_id(&self, index: usize, id_column: &str) -> String {
        match (self.column_index(id_column), self.rows.get(index)) {
            (Some(idx), Some(row)) if !row[idx].is_null() => row[idx].as_text().into_owned(),
            _ => UNKNOWN_ID.to_string(),
        }
    }
}

/// Borrowed view of one record.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of `column`; an absent column reads as [`Value::Missing`].
    pub fn get(&self, column: &str) -> &'a Value {
        match self.table.column_index(column) {
            Some(idx) => &self.values[idx],
            None => &MISSING,
        }
    }

    pub fn id(&self, id_column: &str) -> String {
        let value = self.get(id_column);
        if value.is_null() {
            UNKNOWN_ID.to_string()
        } else {
            value.as_text().into_owned()
        }
    }
}

/// Lookup of tables by GTFS file name (`"stops.txt"`, ...).
pub trait TableSource {
    fn table(&self, name: &str) -> Option<&Table>;

    /// Names of every table available, sorted.
    fn table_names(&self) -> Vec<&str>;
}

/// The default [`TableSource`]: all tables of one feed, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    tables: BTreeMap<String, Table>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableSource for TableStore {
    fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}
