//! Referential integrity between two GTFS files.
//!
//! A [`CrossReference`] links a defining column (`source`, e.g.
//! `agency.txt:agency_id`) to a referencing column (`target`, e.g.
//! `routes.txt:agency_id`). Orphans are referenced values nobody defines;
//! unused values are defined but never referenced.

use std::collections::BTreeSet;

use crate::check::{CheckResult, Details, Status, Unavailable};
use crate::table::{Table, TableSource};

#[derive(Debug, Clone, Copy)]
pub struct CrossReference<'a> {
    source_file: &'a str,
    source: Option<&'a Table>,
    column: &'a str,
    target_file: &'a str,
    target: Option<&'a Table>,
    field: &'a str,
}

impl<'a> CrossReference<'a> {
    /// Links `source.column` to the column of the same name in `target`.
    pub fn new(source: &'a Table, column: &'a str, target: &'a Table) -> Self {
        Self {
            source_file: source.name(),
            source: Some(source),
            column,
            target_file: target.name(),
            target: Some(target),
            field: column,
        }
    }

    /// Same as [`CrossReference::new`] but resolves both tables by name;
    /// either side may be absent.
    pub fn lookup(
        tables: &'a dyn TableSource,
        source_file: &'a str,
        column: &'a str,
        target_file: &'a str,
    ) -> Self {
        Self {
            source_file,
            source: tables.table(source_file),
            column,
            target_file,
            target: tables.table(target_file),
            field: column,
        }
    }

    /// Use a differently named column on the target side.
    pub fn field(mut self, field: &'a str) -> Self {
        self.field = field;
        self
    }

    /// Values of `target.field` with no match in `source.column`.
    pub fn orphans(&self) -> CheckResult {
        let name = format!("no_orphan_{}_in_{}", self.field, stem(self.target_file));
        let description = format!(
            "every {}:{} exists in {}:{}",
            self.target_file, self.field, self.source_file, self.column
        );

        let Some((defined, referenced)) = self.value_sets() else {
            return self.unavailable(name, description);
        };

        let values = difference(&referenced, &defined);
        if values.is_empty() {
            return CheckResult::new(name, description).with_message(format!(
                "all {} referenced values are defined",
                referenced.len()
            ));
        }
        CheckResult::new(name, description)
            .with_status(Status::Error)
            .with_message(format!(
                "{} values of {} are not defined in {}",
                values.len(),
                self.field,
                self.source_file
            ))
            .with_details(Details::Orphans { values })
    }

    /// Values of `source.column` never used by `target.field`.
    pub fn unused(&self) -> CheckResult {
        let name = format!("unused_{}_in_{}", self.column, stem(self.source_file));
        let description = format!(
            "every {}:{} is used by {}:{}",
            self.source_file, self.column, self.target_file, self.field
        );

        let Some((defined, referenced)) = self.value_sets() else {
            return self.unavailable(name, description);
        };

        let values = difference(&defined, &referenced);
        if values.is_empty() {
            return CheckResult::new(name, description).with_message(format!(
                "all {} defined values are used",
                defined.len()
            ));
        }
        CheckResult::new(name, description)
            .with_status(Status::Warning)
            .with_message(format!(
                "{} values of {} are never used in {}",
                values.len(),
                self.column,
                self.target_file
            ))
            .with_details(Details::Unused { values })
    }

    fn value_sets(&self) -> Option<(BTreeSet<String>, BTreeSet<String>)> {
        let defined = distinct_values(self.source?, self.column)?;
        let referenced = distinct_values(self.target?, self.field)?;
        Some((defined, referenced))
    }

    fn unavailable(&self, name: String, description: String) -> CheckResult {
        CheckResult::new(name, description)
            .with_status(Status::Info)
            .with_message(format!(
                "{}:{} or {}:{} is not available",
                self.source_file, self.column, self.target_file, self.field
            ))
            .with_details(Details::Unavailable {
                reason: Unavailable::MissingFileOrField,
            })
    }
}

/// Distinct non-empty values of `column`, or `None` if it is absent.
pub fn distinct_values(table: &Table, column: &str) -> Option<BTreeSet<String>> {
    let values = table.values(column)?;
    Some(
        values
            .filter(|v| !v.is_truly_empty())
            .map(|v| v.as_text().trim().to_string())
            .collect(),
    )
}

/// Sorted `left \ right`.
pub fn difference(left: &BTreeSet<String>, right: &BTreeSet<String>) -> Vec<String> {
    left.difference(right).cloned().collect()
}

fn stem(file: &str) -> &str {
    file.strip_suffix(".txt").unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, TableStore, Value};
    use proptest::prelude::*;

    fn id_table(name: &str, column: &str, ids: &[&str]) -> Table {
        Table::from_rows(
            name,
            &[(column, ColumnType::String)],
            ids.iter().map(|id| vec![Value::from(*id)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_orphan_agency_reference() {
        let agency = id_table("agency.txt", "agency_id", &["A1"]);
        let routes = id_table("routes.txt", "agency_id", &["A1", "A2"]);

        let check = CrossReference::new(&agency, "agency_id", &routes).orphans();

        assert_eq!(check.status, Status::Error);
        assert_eq!(
            check.details,
            Details::Orphans {
                values: vec!["A2".to_string()]
            }
        );
        assert_eq!(check.name, "no_orphan_agency_id_in_routes");
    }

    #[test]
    fn test_unused_is_warning() {
        let agency = id_table("agency.txt", "agency_id", &["A1", "A3"]);
        let routes = id_table("routes.txt", "agency_id", &["A1"]);
        let check = CrossReference::new(&agency, "agency_id", &routes).unused();
        assert_eq!(check.status, Status::Warning);
        assert_eq!(
            check.details,
            Details::Unused {
                values: vec!["A3".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let agency = id_table("agency.txt", "agency_id", &["A1", ""]);
        let routes = id_table("routes.txt", "agency_id", &["A1", "", "nan"]);
        let xref = CrossReference::new(&agency, "agency_id", &routes);
        assert_eq!(xref.orphans().status, Status::Pass);
        assert_eq!(xref.unused().status, Status::Pass);
    }

    #[test]
    fn test_missing_target_is_info_not_error() {
        let store = TableStore::new().with_table(id_table("stops.txt", "zone_id", &["Z1"]));
        let xref = CrossReference::lookup(&store, "stops.txt", "zone_id", "fare_rules.txt")
            .field("origin_id");
        for check in [xref.orphans(), xref.unused()] {
            assert_eq!(check.status, Status::Info);
            assert_eq!(
                check.details,
                Details::Unavailable {
                    reason: Unavailable::MissingFileOrField
                }
            );
        }
    }

    #[test]
    fn test_missing_field_is_info() {
        let stops = id_table("stops.txt", "stop_id", &["S1"]);
        let times = id_table("stop_times.txt", "trip_id", &["T1"]);
        let check = CrossReference::new(&stops, "stop_id", &times).orphans();
        assert_eq!(check.status, Status::Info);
    }

    #[test]
    fn test_integer_and_text_values_compare_as_text() {
        let defining = Table::from_rows(
            "calendar.txt",
            &[("service_id", ColumnType::Integer)],
            vec![vec![1i64.into()]],
        )
        .unwrap();
        let referencing = id_table("trips.txt", "service_id", &["1"]);
        let check = CrossReference::new(&defining, "service_id", &referencing).orphans();
        assert_eq!(check.status, Status::Pass);
    }

    fn value_set() -> impl Strategy<Value = BTreeSet<String>> {
        proptest::collection::btree_set("[a-d][0-3]", 0..10)
    }

    fn table_of(name: &str, values: &BTreeSet<String>) -> Table {
        let ids: Vec<&str> = values.iter().map(String::as_str).collect();
        id_table(name, "id", &ids)
    }

    fn listed(check: &CheckResult) -> Vec<String> {
        match &check.details {
            Details::Orphans { values } | Details::Unused { values } => values.clone(),
            _ => Vec::new(),
        }
    }

    proptest! {
        #[test]
        fn prop_swapping_sides_swaps_orphans_and_unused(a in value_set(), b in value_set()) {
            let ta = table_of("a.txt", &a);
            let tb = table_of("b.txt", &b);
            let orphans_ab = CrossReference::new(&ta, "id", &tb).orphans();
            let unused_ba = CrossReference::new(&tb, "id", &ta).unused();
            prop_assert_eq!(listed(&orphans_ab), listed(&unused_ba));
        }

        #[test]
        fn prop_orphans_and_unused_are_disjoint(a in value_set(), b in value_set()) {
            let ta = table_of("a.txt", &a);
            let tb = table_of("b.txt", &b);
            let xref = CrossReference::new(&ta, "id", &tb);
            let orphans: BTreeSet<String> = listed(&xref.orphans()).into_iter().collect();
            let unused: BTreeSet<String> = listed(&xref.unused()).into_iter().collect();
            prop_assert!(orphans.is_disjoint(&unused));
        }
    }
}
