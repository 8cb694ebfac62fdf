//! Presence checks for mandatory columns and key uniqueness.

use std::collections::{BTreeMap, BTreeSet};

use crate::check::{CheckResult, Details, Duplicate, FieldIssue, Status, Unavailable};
use crate::table::Table;

/// Checks that `field` exists in `table` and is filled on every row.
pub fn check_required(table: &Table, field: &str, id_column: &str) -> CheckResult {
    let name = format!("{field}_present");
    let description = format!("{field} is present and filled in {}", table.name());

    match field_issue(table, field, id_column) {
        None => CheckResult::new(name, description)
            .with_message(format!("{field} is filled on all {} rows", table.len())),
        Some(FieldIssue::MissingColumn { .. }) => {
            CheckResult::missing_column(name, description, table.name(), field)
        }
        Some(FieldIssue::EmptyValues {
            count,
            affected_ids,
            ..
        }) => CheckResult::new(name, description)
            .with_status(Status::Error)
            .with_message(format!("{count} rows have no {field}"))
            .with_details(Details::AffectedIds { affected_ids }),
    }
}

/// Batch variant of [`check_required`]: one result covering every field.
///
/// The breakdown lists every problematic field and every affected id, in the
/// order the fields were given.
pub fn check_required_fields(
    table: &Table,
    fields: &[&str],
    id_column: &str,
    name: &str,
) -> CheckResult {
    let description = format!("required fields of {}", table.name());
    let issues: Vec<FieldIssue> = fields
        .iter()
        .filter_map(|field| field_issue(table, field, id_column))
        .collect();

    if issues.is_empty() {
        return CheckResult::new(name, description).with_message(format!(
            "all {} required fields are present and filled",
            fields.len()
        ));
    }

    let problematic_fields: Vec<String> = issues.iter().map(|i| i.field().to_string()).collect();
    CheckResult::new(name, description)
        .with_status(Status::Error)
        .with_message(format!(
            "problematic required fields: {}",
            problematic_fields.join(", ")
        ))
        .with_details(Details::RequiredFields {
            problematic_fields,
            fields: issues,
        })
}

fn field_issue(table: &Table, field: &str, id_column: &str) -> Option<FieldIssue> {
    let Some(values) = table.values(field) else {
        return Some(FieldIssue::MissingColumn {
            field: field.to_string(),
        });
    };

    let affected_ids: Vec<String> = values
        .enumerate()
        .filter(|(_, v)| v.is_null())
        .map(|(i, _)| table.record_id(i, id_column))
        .collect();

    if affected_ids.is_empty() {
        None
    } else {
        Some(FieldIssue::EmptyValues {
            field: field.to_string(),
            count: affected_ids.len(),
            affected_ids,
        })
    }
}

/// Checks that the combination of `key_columns` is unique across rows.
///
/// Rows whose key is entirely empty are not compared. A missing key column
/// makes the check inapplicable.
pub fn check_unique(table: &Table, key_columns: &[&str], id_column: &str) -> CheckResult {
    let name = format!("{}_unique", key_columns.join("_"));
    let description = format!("{} is unique in {}", key_columns.join(" + "), table.name());

    let missing: Vec<&str> = key_columns
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        return CheckResult::new(name, description)
            .with_status(Status::Info)
            .with_message(format!("key column missing: {}", missing.join(", ")))
            .with_details(Details::Unavailable {
                reason: Unavailable::MissingFileOrField,
            });
    }

    let mut seen: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for row in table.rows() {
        let key: Vec<String> = key_columns
            .iter()
            .map(|c| row.get(c).as_text().trim().to_string())
            .collect();
        if key.iter().all(String::is_empty) {
            continue;
        }
        seen.entry(key).or_default().push(row.index());
    }

    let duplicates: Vec<Duplicate> = seen
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, rows)| Duplicate {
            key,
            occurrences: rows.len(),
            rows,
        })
        .collect();

    if duplicates.is_empty() {
        return CheckResult::new(name, description).with_message("no duplicated keys");
    }

    let ids: BTreeSet<String> = duplicates
        .iter()
        .flat_map(|d| d.rows.iter().map(|&r| table.record_id(r, id_column)))
        .collect();
    CheckResult::new(name, description)
        .with_status(Status::Error)
        .with_message(format!(
            "{} duplicated keys over {} records",
            duplicates.len(),
            ids.len()
        ))
        .with_details(Details::Duplicates { duplicates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Value};
    use proptest::prelude::*;

    fn agency(rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(
            "agency.txt",
            &[
                ("agency_id", ColumnType::String),
                ("agency_name", ColumnType::String),
                ("agency_url", ColumnType::String),
            ],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_single_required_pass() {
        let table = agency(vec![vec!["A1".into(), "Metro".into(), "https://m.example".into()]]);
        let check = check_required(&table, "agency_name", "agency_id");
        assert_eq!(check.name, "agency_name_present");
        assert_eq!(check.status, Status::Pass);
    }

    #[test]
    fn test_single_required_empty_values() {
        let table = agency(vec![
            vec!["A1".into(), Value::Missing, "https://m.example".into()],
            vec!["A2".into(), "Bus".into(), "https://b.example".into()],
        ]);
        let check = check_required(&table, "agency_name", "agency_id");
        assert_eq!(check.status, Status::Error);
        assert_eq!(
            check.details,
            Details::AffectedIds {
                affected_ids: vec!["A1".to_string()]
            }
        );
    }

    #[test]
    fn test_single_required_missing_column() {
        let table = agency(vec![]);
        let check = check_required(&table, "agency_timezone", "agency_id");
        assert_eq!(check.status, Status::Error);
        assert!(check.is_missing_column());
    }

    #[test]
    fn test_batch_reports_every_problem() {
        let table = agency(vec![
            vec!["A1".into(), Value::Missing, "https://m.example".into()],
            vec!["A2".into(), Value::from(" "), Value::Missing],
        ]);
        let check = check_required_fields(
            &table,
            &["agency_name", "agency_url", "agency_timezone"],
            "agency_id",
            "required_fields",
        );
        assert_eq!(check.status, Status::Error);
        let Details::RequiredFields {
            problematic_fields,
            fields,
        } = &check.details
        else {
            panic!("expected required-field details");
        };
        assert_eq!(
            problematic_fields,
            &["agency_name", "agency_url", "agency_timezone"]
        );
        assert_eq!(
            fields[0],
            FieldIssue::EmptyValues {
                field: "agency_name".into(),
                count: 2,
                affected_ids: vec!["A1".into(), "A2".into()],
            }
        );
        assert!(matches!(fields[2], FieldIssue::MissingColumn { .. }));
    }

    #[test]
    fn test_batch_does_not_truncate_ids() {
        let rows = (0..250)
            .map(|i| vec![Value::Text(format!("A{i}")), Value::Missing, "https://x.example".into()])
            .collect();
        let check = check_required_fields(&agency(rows), &["agency_name"], "agency_id", "r");
        let Details::RequiredFields { fields, .. } = &check.details else {
            panic!("expected required-field details");
        };
        let FieldIssue::EmptyValues { affected_ids, .. } = &fields[0] else {
            panic!("expected empty values");
        };
        assert_eq!(affected_ids.len(), 250);
    }

    #[test]
    fn test_unique_single_key() {
        let table = agency(vec![
            vec!["A1".into(), "x".into(), "y".into()],
            vec!["A1".into(), "x".into(), "y".into()],
            vec!["A2".into(), "x".into(), "y".into()],
        ]);
        let check = check_unique(&table, &["agency_id"], "agency_id");
        assert_eq!(check.name, "agency_id_unique");
        assert_eq!(check.status, Status::Error);
        assert_eq!(
            check.details,
            Details::Duplicates {
                duplicates: vec![Duplicate {
                    key: vec!["A1".into()],
                    occurrences: 2,
                    rows: vec![0, 1],
                }]
            }
        );
    }

    #[test]
    fn test_unique_composite_key() {
        let table = Table::from_rows(
            "stop_times.txt",
            &[
                ("trip_id", ColumnType::String),
                ("stop_sequence", ColumnType::Integer),
            ],
            vec![
                vec!["T1".into(), 1i64.into()],
                vec!["T1".into(), 2i64.into()],
                vec!["T2".into(), 1i64.into()],
            ],
        )
        .unwrap();
        let check = check_unique(&table, &["trip_id", "stop_sequence"], "trip_id");
        assert_eq!(check.name, "trip_id_stop_sequence_unique");
        assert_eq!(check.status, Status::Pass);
    }

    #[test]
    fn test_unique_missing_key_is_info() {
        let table = agency(vec![]);
        let check = check_unique(&table, &["route_id"], "agency_id");
        assert_eq!(check.status, Status::Info);
    }

    proptest! {
        #[test]
        fn prop_fully_populated_passes(names in proptest::collection::vec("[a-z]{1,8}", 0..20)) {
            let rows = names
                .iter()
                .enumerate()
                .map(|(i, n)| vec![Value::Text(format!("A{i}")), Value::from(n.as_str()), "u".into()])
                .collect();
            let table = agency(rows);
            let check = check_required_fields(&table, &["agency_id", "agency_name", "agency_url"], "agency_id", "r");
            prop_assert_eq!(check.status, Status::Pass);
        }
    }
}
