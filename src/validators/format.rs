//! Column format validation against a [`FormatRule`].

use chrono::NaiveDate;

use crate::check::{CheckResult, Details, InvalidValue, Statistics, Status};
use crate::rules::{ColumnRule, FormatRule, GTFS_DATE_FORMAT, RuleKind};
use crate::table::{Table, Value};

/// Validates every value of `column` in `table` against `rule`.
///
/// Each row is classified as empty, invalid or valid. A missing column yields
/// an `error` result flagged as such; whether that counts against the score
/// depends on the rule's genre (see the validity scorer).
pub fn validate(table: &Table, column: &str, rule: &FormatRule, id_column: &str) -> CheckResult {
    let name = format!("{column}_valid");

    let Some(values) = table.values(column) else {
        return CheckResult::missing_column(name, rule.description.clone(), table.name(), column)
            .with_genre(rule.genre);
    };

    let mut invalid = Vec::new();
    let mut empty_ids = Vec::new();

    for (index, value) in values.enumerate() {
        if value.is_truly_empty() {
            empty_ids.push(table.record_id(index, id_column));
        } else if !is_valid(value, &rule.kind) {
            invalid.push(InvalidValue {
                id: table.record_id(index, id_column),
                value: value.as_text().into_owned(),
            });
        }
    }

    let statistics = Statistics {
        total: table.len(),
        invalid: invalid.len(),
        empty: empty_ids.len(),
    };

    let check = CheckResult::new(name, rule.description.clone())
        .with_genre(rule.genre)
        .with_statistics(statistics);

    if invalid.is_empty() && empty_ids.is_empty() {
        check.with_message(format!("all {column} values are valid"))
    } else {
        check
            .with_status(Status::Warning)
            .with_message(format!(
                "{} rows with an invalid {} and {} empty rows",
                invalid.len(),
                rule.kind.label(),
                empty_ids.len()
            ))
            .with_details(Details::Format { invalid, empty_ids })
    }
}

/// Runs [`validate`] for each rule in order.
pub fn validate_all(table: &Table, rules: &[ColumnRule], id_column: &str) -> Vec<CheckResult> {
    rules
        .iter()
        .map(|r| validate(table, &r.column, &r.rule, id_column))
        .collect()
}

/// The GTFS format also needs exactly eight digits; chrono alone accepts
/// `2024011`.
fn is_valid_date(text: &str, format: &str) -> bool {
    if format == GTFS_DATE_FORMAT && !(text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }
    NaiveDate::parse_from_str(text, format).is_ok()
}

/// Whether a non-empty value satisfies `kind`.
pub fn is_valid(value: &Value, kind: &RuleKind) -> bool {
    let text = value.as_text();
    let text = text.trim();
    match kind {
        RuleKind::Enumeration { allowed } => allowed.contains(text),
        RuleKind::Regex { pattern } => pattern.is_match(text),
        RuleKind::Url => is_valid_url(text),
        RuleKind::Coordinate { axis } => value.as_f64().is_some_and(|v| axis.contains(v)),
        RuleKind::Date { format } => is_valid_date(text, format),
        RuleKind::Time => parse_service_time(text).is_some(),
    }
}

/// A URL needs both a scheme and a host.
fn is_valid_url(text: &str) -> bool {
    url::Url::parse(text)
        .map(|u| u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Parses a GTFS clock time (`H:MM:SS` or `HH:MM:SS`) into seconds after
/// midnight of the service day. Hours past 23 are allowed.
pub fn parse_service_time(text: &str) -> Option<u32> {
    let mut parts = text.trim().split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let digits = |p: &str, min: usize, max: usize| {
        (min..=max).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(h, 1, 2) || !digits(m, 2, 2) || !digits(s, 2, 2) {
        return None;
    }

    let (hours, minutes, seconds): (u32, u32, u32) = (h.parse().ok()?, m.parse().ok()?, s.parse().ok()?);
    if minutes > 59 || seconds > 59 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Axis, Genre};
    use crate::table::ColumnType;
    use proptest::prelude::*;

    fn single_column(column: &str, ty: ColumnType, values: Vec<Value>) -> Table {
        let rows = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| vec![Value::Text(format!("S{}", i + 1)), v])
            .collect();
        Table::from_rows("stops.txt", &[("stop_id", ColumnType::String), (column, ty)], rows)
            .unwrap()
    }

    fn latitude_rule() -> FormatRule {
        FormatRule::coordinate("latitudes", Genre::Required, Axis::Latitude)
    }

    #[test]
    fn test_latitude_out_of_range_is_invalid() {
        let table = Table::from_rows(
            "stops.txt",
            &[
                ("id", ColumnType::String),
                ("lat", ColumnType::Float),
                ("lon", ColumnType::Float),
            ],
            vec![vec!["S1".into(), 91.0.into(), 0.0.into()]],
        )
        .unwrap();

        let check = validate(&table, "lat", &latitude_rule(), "id");

        assert_eq!(check.status, Status::Warning);
        assert_eq!(
            check.statistics,
            Some(Statistics {
                total: 1,
                invalid: 1,
                empty: 0
            })
        );
        let Details::Format { invalid, empty_ids } = &check.details else {
            panic!("expected format details, got {:?}", check.details);
        };
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].id, "S1");
        assert_eq!(invalid[0].value, "91");
        assert!(empty_ids.is_empty());
    }

    #[test]
    fn test_coordinate_boundaries_are_valid() {
        let table = single_column(
            "lat",
            ColumnType::Float,
            vec![(-90.0).into(), 90.0.into(), 0.0.into()],
        );
        let check = validate(&table, "lat", &latitude_rule(), "stop_id");
        assert_eq!(check.status, Status::Pass);

        let lon_rule = FormatRule::coordinate("lon", Genre::Required, Axis::Longitude);
        let table = single_column("lon", ColumnType::Float, vec![(-180.0).into(), 180.0.into()]);
        assert_eq!(validate(&table, "lon", &lon_rule, "stop_id").status, Status::Pass);
    }

    #[test]
    fn test_unparsable_coordinate_is_invalid() {
        let table = single_column("lat", ColumnType::Float, vec![Value::from("north")]);
        let check = validate(&table, "lat", &latitude_rule(), "stop_id");
        assert_eq!(check.statistics.unwrap().invalid, 1);
    }

    #[test]
    fn test_missing_column_keeps_genre() {
        let table = single_column("lat", ColumnType::Float, vec![1.0.into()]);
        let rule = FormatRule::url("urls", Genre::Optional);
        let check = validate(&table, "stop_url", &rule, "stop_id");
        assert_eq!(check.status, Status::Error);
        assert!(check.is_missing_column());
        assert_eq!(check.genre, Some(Genre::Optional));
        assert!(check.statistics.is_none());
    }

    #[test]
    fn test_empty_tokens_counted_as_empty() {
        let table = single_column(
            "stop_url",
            ColumnType::String,
            vec![
                Value::Missing,
                "N/A".into(),
                "https://example.org/stop".into(),
                "not a url".into(),
            ],
        );
        let rule = FormatRule::url("urls", Genre::Optional);
        let check = validate(&table, "stop_url", &rule, "stop_id");
        let stats = check.statistics.unwrap();
        assert_eq!((stats.total, stats.invalid, stats.empty), (4, 1, 2));
        assert_eq!(check.status, Status::Warning);
    }

    #[test]
    fn test_enumeration_accepts_integer_cells() {
        let rule = FormatRule::enumeration("location types", Genre::Optional, ["0", "1", "2", "3", "4"])
            .unwrap();
        let table = single_column(
            "location_type",
            ColumnType::Integer,
            vec![0i64.into(), 1i64.into(), 7i64.into()],
        );
        let check = validate(&table, "location_type", &rule, "stop_id");
        assert_eq!(check.statistics.unwrap().invalid, 1);
    }

    #[test]
    fn test_url_requires_scheme_and_host() {
        assert!(is_valid_url("https://example.org"));
        assert!(is_valid_url("http://example.org/path?q=1"));
        assert!(!is_valid_url("www.example.org"));
        assert!(!is_valid_url("mailto:someone@example.org"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_date_rule() {
        let rule = FormatRule::date("dates", Genre::Required);
        assert!(is_valid(&"20240229".into(), &rule.kind));
        assert!(!is_valid(&"20230229".into(), &rule.kind));
        assert!(!is_valid(&"2024-01-01".into(), &rule.kind));
    }

    #[test]
    fn test_short_dates_are_invalid() {
        let rule = FormatRule::date("dates", Genre::Required);
        assert!(!is_valid(&"2024011".into(), &rule.kind));
        assert!(!is_valid(&"202415".into(), &rule.kind));
        assert!(is_valid(&"20240115".into(), &rule.kind));

        let table = single_column(
            "start_date",
            ColumnType::String,
            vec!["20240115".into(), "2024011".into()],
        );
        let check = validate(&table, "start_date", &rule, "stop_id");
        assert_eq!(check.status, Status::Warning);
        assert_eq!(check.statistics.unwrap().invalid, 1);

        let custom = FormatRule::date_with_format("dates", Genre::Required, "%d/%m/%Y").unwrap();
        assert!(is_valid(&"5/1/2024".into(), &custom.kind));
    }

    #[test]
    fn test_service_time_parsing() {
        assert_eq!(parse_service_time("8:05:00"), Some(8 * 3600 + 5 * 60));
        assert_eq!(parse_service_time("25:30:00"), Some(25 * 3600 + 30 * 60));
        assert_eq!(parse_service_time("08:60:00"), None);
        assert_eq!(parse_service_time("08:00:61"), None);
        assert_eq!(parse_service_time("-1:00:00"), None);
        assert_eq!(parse_service_time("8:5:00"), None);
        assert_eq!(parse_service_time("123:00:00"), None);
        assert_eq!(parse_service_time("08:00"), None);
        assert_eq!(parse_service_time("08:00:00:00"), None);
    }

    proptest! {
        #[test]
        fn prop_latitude_classification(lat in -500.0f64..500.0) {
            let table = single_column("lat", ColumnType::Float, vec![lat.into()]);
            let stats = validate(&table, "lat", &latitude_rule(), "stop_id").statistics.unwrap();
            let expected = usize::from(!(-90.0..=90.0).contains(&lat));
            prop_assert_eq!(stats.invalid, expected);
        }

        #[test]
        fn prop_valid_clock_times_parse(h in 0u32..48, m in 0u32..60, s in 0u32..60) {
            let text = format!("{h}:{m:02}:{s:02}");
            prop_assert_eq!(parse_service_time(&text), Some(h * 3600 + m * 60 + s));
        }
    }
}
