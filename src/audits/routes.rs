//! `routes.txt` audits.

use std::collections::BTreeMap;

use crate::audits::report::{self, CategoryReport, counts_check, repartition_check};
use crate::audits::{codes, data_format, defined_in_any, distinct_counts, either_present};
use crate::check::{CheckResult, Details, Duplicate, InvalidValue, Statistics, Status, Unavailable};
use crate::registry::{AuditContext, AuditError, RegistryBuilder};
use crate::rules::{ColumnRule, FormatRule, Genre};
use crate::scoring::round1;
use crate::table::Table;
use crate::validators::{CrossReference, check_required, check_unique};

pub const FILE: &str = "routes.txt";
const ID: &str = "route_id";

/// Minimum contrast ratio between route and text colours (WCAG AA).
pub const MIN_CONTRAST_RATIO: f64 = 4.5;

/// Basic and extended route types.
const ROUTE_TYPES: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "11", "12", "100", "101", "102", "103", "104", "105",
    "106", "107", "108", "109", "200", "201", "202", "203", "204", "205", "206", "207", "208",
    "209", "300", "301", "302", "400", "401", "402", "403", "404", "405", "406", "407", "408",
    "409", "410", "411", "412", "413", "414", "415", "416", "417", "500", "600", "601", "602",
    "603", "604", "605", "606", "607", "700", "701", "702", "703", "704", "705", "706", "800",
    "900", "1000", "1100", "1200", "1300", "1400", "1500", "1600", "1700",
];

const COLOR_PATTERN: &str = "[0-9A-Fa-f]{6}";

pub fn register(builder: &mut RegistryBuilder<CategoryReport>) {
    builder
        .register(
            FILE,
            "required_fields",
            "route_id, route_type and a route name are present; agency_id resolves",
            vec![],
            required_fields,
        )
        .register(
            FILE,
            "data_format",
            "route type, colours, URL and continuous service codes; colour contrast",
            vec![],
            |ctx| {
                let mut report = data_format(ctx, format_rules()?, ID)?;
                report.checks.push(check_color_contrast(ctx.table()?));
                Ok(CategoryReport::validity("data_format", report.checks))
            },
        )
        .register(
            FILE,
            "data_consistency",
            "route_id references with trips.txt and duplicated route names",
            vec![],
            data_consistency,
        )
        .register(
            FILE,
            "statistics",
            "route type repartition and sort order gaps",
            vec![],
            statistics,
        );
}

fn required_fields(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut checks = vec![
        check_required(table, ID, ID),
        check_unique(table, &[ID], ID),
        check_required(table, "route_type", ID),
        either_present(table, "route_short_name", "route_long_name", ID, Status::Error),
    ];

    let agencies = ctx.tables.table("agency.txt").map_or(0, Table::len);
    if agencies > 1 {
        let mut check = check_required(table, "agency_id", ID);
        check.name = "agency_id_present_if_multiple".into();
        checks.push(check);
    }
    if table.has_column("agency_id") {
        checks.push(defined_in_any(ctx, "agency_id", &[("agency.txt", "agency_id")])?);
    }

    Ok(CategoryReport::penalty("required_fields", checks, ctx.scoring))
}

pub fn format_rules() -> Result<Vec<ColumnRule>, AuditError> {
    let service = ["0", "1", "2", "3"];
    Ok(vec![
        ColumnRule::new(
            "route_type",
            codes("valid route types", Genre::Required, ROUTE_TYPES)?,
        ),
        ColumnRule::new(
            "route_color",
            FormatRule::regex("valid route colours", Genre::Optional, COLOR_PATTERN)?,
        ),
        ColumnRule::new(
            "route_text_color",
            FormatRule::regex("valid route text colours", Genre::Optional, COLOR_PATTERN)?,
        ),
        ColumnRule::new("route_url", FormatRule::url("valid URLs", Genre::Optional)),
        ColumnRule::new(
            "continuous_pickup",
            codes("valid continuous_pickup", Genre::Optional, &service)?,
        ),
        ColumnRule::new(
            "continuous_drop_off",
            codes("valid continuous_drop_off", Genre::Optional, &service)?,
        ),
    ])
}

fn parse_hex_color(text: &str) -> Option<[u8; 3]> {
    let text = text.trim();
    if text.len() != 6 || !text.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&text[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn relative_luminance(rgb: [u8; 3]) -> f64 {
    let linear = |c: u8| {
        let c = f64::from(c) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(rgb[0]) + 0.7152 * linear(rgb[1]) + 0.0722 * linear(rgb[2])
}

/// WCAG contrast ratio between two colours, from 1 to 21.
pub fn contrast_ratio(a: [u8; 3], b: [u8; 3]) -> f64 {
    let (la, lb) = (relative_luminance(a), relative_luminance(b));
    let (light, dark) = if la >= lb { (la, lb) } else { (lb, la) };
    (light + 0.05) / (dark + 0.05)
}

/// Contrast between `route_color` and `route_text_color`.
///
/// Rows where either colour is empty or malformed count as empty; rows below
/// [`MIN_CONTRAST_RATIO`] are invalid.
pub fn check_color_contrast(table: &Table) -> CheckResult {
    let name = "color_contrast";
    let description = "route_text_color is readable on route_color";
    if !table.has_column("route_color") || !table.has_column("route_text_color") {
        return CheckResult::missing_column(name, description, table.name(), "route_color")
            .with_genre(Genre::Optional);
    }

    let mut invalid = Vec::new();
    let mut empty_ids = Vec::new();
    for row in table.rows() {
        let background = parse_hex_color(&row.get("route_color").as_text());
        let text = parse_hex_color(&row.get("route_text_color").as_text());
        match (background, text) {
            (Some(bg), Some(fg)) => {
                let ratio = contrast_ratio(bg, fg);
                if ratio < MIN_CONTRAST_RATIO {
                    invalid.push(InvalidValue {
                        id: row.id(ID),
                        value: format!(
                            "{}/{} ({}:1)",
                            row.get("route_color"),
                            row.get("route_text_color"),
                            round1(ratio)
                        ),
                    });
                }
            }
            _ => empty_ids.push(row.id(ID)),
        }
    }

    let statistics = Statistics {
        total: table.len(),
        invalid: invalid.len(),
        empty: empty_ids.len(),
    };
    let status = if invalid.is_empty() {
        Status::Pass
    } else {
        Status::Warning
    };
    CheckResult::new(name, description)
        .with_status(status)
        .with_genre(Genre::Optional)
        .with_statistics(statistics)
        .with_message(format!(
            "{} routes below {MIN_CONTRAST_RATIO}:1, {} without usable colours",
            invalid.len(),
            empty_ids.len()
        ))
        .with_details(Details::Format { invalid, empty_ids })
}

/// Routes of one agency sharing a short or long name under different ids.
pub fn check_duplicate_names(table: &Table) -> CheckResult {
    let name = "duplicate_route_names";
    let description = "route names are unique within an agency";
    if !table.has_column("agency_id") {
        return CheckResult::new(name, description)
            .with_status(Status::Info)
            .with_message("no agency_id column to group routes by")
            .with_details(Details::Unavailable {
                reason: Unavailable::MissingFileOrField,
            });
    }

    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for row in table.rows() {
        let agency = row.get("agency_id").as_text().trim().to_string();
        for column in ["route_short_name", "route_long_name"] {
            let value = row.get(column);
            if value.is_truly_empty() {
                continue;
            }
            let key = vec![agency.clone(), column.to_string(), value.as_text().trim().to_string()];
            groups.entry(key).or_default().push(row.index());
        }
    }

    let duplicates: Vec<Duplicate> = groups
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, rows)| Duplicate {
            key,
            occurrences: rows.len(),
            rows,
        })
        .collect();
    if duplicates.is_empty() {
        return CheckResult::new(name, description).with_message("no duplicated route names");
    }
    CheckResult::new(name, description)
        .with_status(Status::Warning)
        .with_message(format!("{} route names are used more than once", duplicates.len()))
        .with_details(Details::Duplicates { duplicates })
}

fn data_consistency(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let link = CrossReference::lookup(ctx.tables, FILE, ID, "trips.txt");
    let checks = vec![link.orphans(), link.unused(), check_duplicate_names(table)];
    Ok(CategoryReport::validity("data_consistency", checks))
}

pub fn route_type_label(code: &str) -> String {
    let label = match code.parse::<u32>() {
        Ok(0) => "tram",
        Ok(1) => "subway",
        Ok(2) => "rail",
        Ok(3) => "bus",
        Ok(4) => "ferry",
        Ok(5) => "cable tram",
        Ok(6) => "aerial lift",
        Ok(7) => "funicular",
        Ok(11) => "trolleybus",
        Ok(12) => "monorail",
        Ok(100..=199) => "railway service",
        Ok(200..=299) => "coach service",
        Ok(300..=399) => "suburban railway",
        Ok(400..=499) => "urban railway",
        Ok(500..=699) => "metro",
        Ok(700..=799) => "bus service",
        Ok(800..=899) => "trolleybus service",
        Ok(900..=999) => "tram service",
        Ok(1000..=1299) => "water transport",
        Ok(1300..=1399) => "aerial lift service",
        Ok(1400..=1499) => "funicular service",
        Ok(1500..=1599) => "taxi service",
        Ok(1600..=1799) => "miscellaneous service",
        _ => return format!("unknown route type {code}"),
    };
    label.to_string()
}

/// Gaps in the `route_sort_order` sequence.
pub fn check_sort_order_gaps(table: &Table) -> CheckResult {
    let mut orders: Vec<i64> = table
        .values("route_sort_order")
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_i64())
        .collect();
    orders.sort_unstable();
    orders.dedup();

    let gaps = orders
        .windows(2)
        .filter(|w| w[1].checked_sub(w[0]).is_none_or(|d| d > 1))
        .count();

    let mut counts = BTreeMap::from([
        ("distinct_orders".to_string(), orders.len() as f64),
        ("gaps".to_string(), gaps as f64),
    ]);
    if let (Some(min), Some(max)) = (orders.first(), orders.last()) {
        counts.insert("min_order".into(), *min as f64);
        counts.insert("max_order".into(), *max as f64);
    }
    counts_check(
        "sort_order_gaps",
        "gaps in the route_sort_order sequence",
        counts,
    )
    .with_message(format!("{gaps} gaps in route_sort_order"))
}

fn statistics(ctx: &AuditContext<'_>) -> Result<CategoryReport, AuditError> {
    let table = ctx.table()?;
    let mut checks = vec![counts_check(
        "route_counts",
        "number of routes and agencies",
        distinct_counts(table, &[ID, "agency_id"]),
    )];
    if let Some(values) = table.values("route_type") {
        let shares = report::repartition(values, table.len(), route_type_label);
        checks.push(repartition_check(
            "route_repartition",
            "routes by route type",
            shares,
        ));
    }
    if table.has_column("route_sort_order") {
        checks.push(check_sort_order_gaps(table));
    }
    Ok(CategoryReport::informational("statistics", checks))
}
