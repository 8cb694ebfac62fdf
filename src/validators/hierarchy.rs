//! Parent/child consistency of a self-referencing table.
//!
//! GTFS stops form a two-level hierarchy: stops and platforms (type `0`, the
//! leaves) point to the station (type `1`) they belong to through
//! `parent_station`. Other location types (entrances, generic nodes, boarding
//! areas) are valid but take no part in the leaf/parent rules.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::check::{
    CheckResult, Details, DistanceReport, Level, PairDistance, ParentProblem, ParentReference,
    Recommendation, Share, Status, Unavailable,
};
use crate::geo::{Coordinate, haversine_m};
use crate::rules::{Axis, FormatRule};
use crate::scoring::round1;
use crate::table::Table;
use crate::validators::format;

/// Distance from its parent above which a leaf is suspicious.
pub const WARNING_DISTANCE_M: f64 = 500.0;
/// Distance from its parent above which a leaf is an error.
pub const ERROR_DISTANCE_M: f64 = 1000.0;

/// Column names describing the hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchySpec {
    pub id_column: String,
    pub type_column: String,
    pub parent_column: String,
    pub lat_column: String,
    pub lon_column: String,
}

impl Default for HierarchySpec {
    fn default() -> Self {
        Self {
            id_column: "stop_id".to_string(),
            type_column: "location_type".to_string(),
            parent_column: "parent_station".to_string(),
            lat_column: "stop_lat".to_string(),
            lon_column: "stop_lon".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Parent,
    Other,
}

/// One record seen as a hierarchy node.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub parent: Option<String>,
    pub coordinate: Option<Coordinate>,
}

/// Reads every row of `table` as a [`Node`]. An empty type is a leaf, as
/// GTFS defaults `location_type` to `0`.
pub fn nodes(table: &Table, spec: &HierarchySpec) -> Vec<Node> {
    table
        .rows()
        .map(|row| {
            let ty = row.get(&spec.type_column);
            let kind = if ty.is_truly_empty() {
                NodeKind::Leaf
            } else {
                match ty.as_i64() {
                    Some(0) => NodeKind::Leaf,
                    Some(1) => NodeKind::Parent,
                    _ => NodeKind::Other,
                }
            };

            let parent = row.get(&spec.parent_column);
            let parent = (!parent.is_truly_empty()).then(|| parent.as_text().trim().to_string());

            // out of range or non-finite positions count as missing
            let lat = row
                .get(&spec.lat_column)
                .as_f64()
                .filter(|v| Axis::Latitude.contains(*v));
            let lon = row
                .get(&spec.lon_column)
                .as_f64()
                .filter(|v| Axis::Longitude.contains(*v));
            let coordinate = lat.zip(lon).map(|(lat, lon)| Coordinate::new(lat, lon));

            Node {
                id: row.id(&spec.id_column),
                kind,
                parent,
                coordinate,
            }
        })
        .collect()
}

fn index(nodes: &[Node]) -> HashMap<&str, &Node> {
    nodes.iter().map(|n| (n.id.as_str(), n)).collect()
}

fn leaves_with_parent(nodes: &[Node]) -> impl Iterator<Item = (&Node, &str)> {
    nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Leaf)
        .filter_map(|n| n.parent.as_deref().map(|p| (n, p)))
}

/// A parent entity must not itself declare a parent.
pub fn check_parents_have_no_parent(nodes: &[Node]) -> CheckResult {
    let offending: Vec<String> = nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Parent && n.parent.is_some())
        .map(|n| n.id.clone())
        .collect();

    let check = CheckResult::new("parent_has_no_parent", "stations leave parent_station empty");
    if offending.is_empty() {
        return check.with_message("no station declares a parent");
    }
    check
        .with_status(Status::Error)
        .with_message(format!("{} stations declare a parent", offending.len()))
        .with_details(Details::Hierarchy {
            offending_ids: offending,
            references: Vec::new(),
        })
}

/// Every parent reference of a leaf resolves to an existing parent entity.
pub fn check_parent_references(nodes: &[Node]) -> CheckResult {
    let by_id = index(nodes);
    let references: Vec<ParentReference> = leaves_with_parent(nodes)
        .filter_map(|(leaf, parent)| {
            let problem = match by_id.get(parent) {
                None => ParentProblem::Dangling,
                Some(p) if p.kind != NodeKind::Parent => ParentProblem::WrongType,
                Some(_) => return None,
            };
            Some(ParentReference {
                child: leaf.id.clone(),
                parent: parent.to_string(),
                problem,
            })
        })
        .collect();

    let check = CheckResult::new(
        "valid_parent_references",
        "parent_station points to an existing station",
    );
    if references.is_empty() {
        return check.with_message("every parent reference is valid");
    }
    check
        .with_status(Status::Error)
        .with_message(format!("{} invalid parent references", references.len()))
        .with_details(Details::Hierarchy {
            offending_ids: references.iter().map(|r| r.child.clone()).collect(),
            references,
        })
}

/// A leaf must not use another leaf as its parent.
pub fn check_no_leaf_to_leaf(nodes: &[Node]) -> CheckResult {
    let by_id = index(nodes);
    let references: Vec<ParentReference> = leaves_with_parent(nodes)
        .filter(|(_, parent)| by_id.get(parent).is_some_and(|p| p.kind == NodeKind::Leaf))
        .map(|(leaf, parent)| ParentReference {
            child: leaf.id.clone(),
            parent: parent.to_string(),
            problem: ParentProblem::WrongType,
        })
        .collect();

    let check = CheckResult::new("no_leaf_to_leaf", "parent_station never points to a stop");
    if references.is_empty() {
        return check.with_message("no stop points to another stop");
    }
    check
        .with_status(Status::Error)
        .with_message(format!("{} stops point to another stop", references.len()))
        .with_details(Details::Hierarchy {
            offending_ids: references.iter().map(|r| r.child.clone()).collect(),
            references,
        })
}

/// Parent entities no leaf refers to.
pub fn check_unused_parents(nodes: &[Node]) -> CheckResult {
    let used: BTreeSet<&str> = leaves_with_parent(nodes).map(|(_, p)| p).collect();
    let unused: Vec<String> = nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Parent && !used.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    let check = CheckResult::new("unused_parents", "every station is used by a stop");
    if unused.is_empty() {
        return check.with_message("every station is used");
    }
    check
        .with_status(Status::Warning)
        .with_message(format!("{} stations are not used by any stop", unused.len()))
        .with_details(Details::AffectedIds {
            affected_ids: unused,
        })
}

/// Haversine distance between each leaf and its parent.
///
/// Pairs missing coordinates on either end are listed but left out of the
/// numbers; if no pair can be measured the result is `info`.
pub fn check_distances(nodes: &[Node], has_coordinates: bool) -> CheckResult {
    let check = CheckResult::new("geographic_distances", "distance between stops and their station");
    if !has_coordinates {
        return check
            .with_status(Status::Info)
            .with_message("coordinate columns are missing")
            .with_details(Details::Unavailable {
                reason: Unavailable::MissingFileOrField,
            });
    }

    let by_id = index(nodes);
    let mut distances = Vec::new();
    let mut far_pairs = Vec::new();
    let mut without_coordinates = Vec::new();

    for (leaf, parent_id) in leaves_with_parent(nodes) {
        let Some(parent) = by_id.get(parent_id).filter(|p| p.kind == NodeKind::Parent) else {
            continue;
        };
        let (Some(from), Some(to)) = (leaf.coordinate, parent.coordinate) else {
            without_coordinates.push(leaf.id.clone());
            continue;
        };
        let distance = haversine_m(from, to);
        distances.push(distance);
        if distance > WARNING_DISTANCE_M {
            far_pairs.push(PairDistance {
                child: leaf.id.clone(),
                parent: parent.id.clone(),
                distance_m: round1(distance),
            });
        }
    }

    if distances.is_empty() {
        let (message, reason) = if without_coordinates.is_empty() {
            ("no stop is attached to a station", Unavailable::NotApplicable)
        } else {
            ("no stop/station pair has coordinates", Unavailable::MissingCoordinates)
        };
        return check
            .with_status(Status::Info)
            .with_message(message)
            .with_details(Details::Unavailable { reason });
    }

    far_pairs.sort_by(|a, b| b.distance_m.total_cmp(&a.distance_m));
    let over_500m = distances.iter().filter(|&&d| d > WARNING_DISTANCE_M).count();
    let over_1000m = distances.iter().filter(|&&d| d > ERROR_DISTANCE_M).count();
    let report = DistanceReport {
        analyzed: distances.len(),
        avg_distance_m: round1(distances.iter().sum::<f64>() / distances.len() as f64),
        max_distance_m: round1(distances.iter().copied().fold(0.0, f64::max)),
        over_500m,
        over_1000m,
        far_pairs,
        without_coordinates,
    };

    let check = if over_1000m > 0 {
        check
            .with_status(Status::Error)
            .with_message(format!("{over_1000m} stops are more than 1 km from their station"))
    } else if over_500m > 0 {
        check
            .with_status(Status::Warning)
            .with_message(format!("{over_500m} stops are more than 500 m from their station"))
    } else {
        check.with_message("every stop is close to its station")
    };
    check.with_details(Details::Distances(report))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub has_cycle: bool,
    pub cycle_ids: Vec<String>,
}

#[derive(Clone, Copy)]
enum Visit {
    /// On the current walk, at this position of the path.
    Visiting(usize),
    Done,
}

/// Finds every node lying on a cycle of the `child -> parent` map.
///
/// Each node is walked at most once; the walk is iterative so long chains
/// cannot overflow the stack. Self references count as cycles.
pub fn detect_cycles(parents: &HashMap<String, String>) -> CycleReport {
    let mut state: HashMap<&str, Visit> = HashMap::with_capacity(parents.len());
    let mut members: BTreeSet<&str> = BTreeSet::new();

    let mut starts: Vec<&str> = parents.keys().map(String::as_str).collect();
    starts.sort_unstable();

    for start in starts {
        let mut path: Vec<&str> = Vec::new();
        let mut current = start;
        loop {
            match state.get(current).copied() {
                Some(Visit::Visiting(pos)) => {
                    members.extend(&path[pos..]);
                    break;
                }
                Some(Visit::Done) => break,
                None => {
                    state.insert(current, Visit::Visiting(path.len()));
                    path.push(current);
                    match parents.get(current) {
                        Some(parent) if !parent.is_empty() => current = parent.as_str(),
                        _ => break,
                    }
                }
            }
        }
        for node in path {
            state.insert(node, Visit::Done);
        }
    }

    CycleReport {
        has_cycle: !members.is_empty(),
        cycle_ids: members.into_iter().map(str::to_string).collect(),
    }
}

/// No chain of parent references loops back on itself.
pub fn check_cycles(nodes: &[Node]) -> CheckResult {
    let parents: HashMap<String, String> = nodes
        .iter()
        .filter_map(|n| n.parent.clone().map(|p| (n.id.clone(), p)))
        .collect();
    let report = detect_cycles(&parents);

    let check = CheckResult::new("no_parent_cycles", "parent references contain no cycle");
    if !report.has_cycle {
        return check.with_message("no cycle in parent references");
    }
    check
        .with_status(Status::Error)
        .with_message(format!("{} entities are part of a parent cycle", report.cycle_ids.len()))
        .with_details(Details::Cycles {
            cycle_ids: report.cycle_ids,
        })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyMetrics {
    pub total_records: usize,
    pub leaf_count: usize,
    pub parent_count: usize,
    pub leaves_with_parent: usize,
    pub parent_completion_rate: f64,
    pub used_parents: usize,
    pub unused_parents: usize,
    pub leaves_per_parent: f64,
    pub hierarchy_usage_rate: f64,
}

impl HierarchyMetrics {
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let leaf_count = nodes.iter().filter(|n| n.kind == NodeKind::Leaf).count();
        let parents: BTreeSet<&str> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Parent)
            .map(|n| n.id.as_str())
            .collect();
        let parent_count = nodes.iter().filter(|n| n.kind == NodeKind::Parent).count();

        let with_parent: Vec<&str> = leaves_with_parent(nodes).map(|(_, p)| p).collect();
        let used: BTreeSet<&str> = with_parent
            .iter()
            .copied()
            .filter(|p| parents.contains(p))
            .collect();

        let rate = |part: usize, whole: usize| {
            if whole == 0 {
                0.0
            } else {
                round1(part as f64 / whole as f64 * 100.0)
            }
        };

        Self {
            total_records: nodes.len(),
            leaf_count,
            parent_count,
            leaves_with_parent: with_parent.len(),
            parent_completion_rate: rate(with_parent.len(), leaf_count),
            used_parents: used.len(),
            unused_parents: parent_count.saturating_sub(used.len()),
            leaves_per_parent: if parent_count == 0 {
                0.0
            } else {
                round1(leaf_count as f64 / parent_count as f64)
            },
            hierarchy_usage_rate: rate(used.len(), parent_count),
        }
    }
}

/// Counts of each value of the type column, labelled with `labels`.
pub fn repartition(
    table: &Table,
    type_column: &str,
    labels: &[(i64, &str)],
) -> BTreeMap<String, Share> {
    let Some(values) = table.values(type_column) else {
        return BTreeMap::new();
    };
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values.filter(|v| !v.is_truly_empty()) {
        *counts.entry(value.as_text().trim().to_string()).or_default() += 1;
    }

    let total = table.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(key, count)| {
            let label = key
                .parse::<i64>()
                .ok()
                .and_then(|code| labels.iter().find(|(c, _)| *c == code))
                .map(|(_, l)| l.to_string())
                .unwrap_or_else(|| format!("type {key}"));
            let share = Share {
                count,
                percentage: round1(count as f64 / total * 100.0),
                label,
            };
            (key, share)
        })
        .collect()
}

/// Advice derived from the metrics and the consistency results.
pub fn recommendations(metrics: &HierarchyMetrics, checks: &[CheckResult]) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if metrics.parent_count == 0 {
        out.push(Recommendation::new(
            Level::Critical,
            "no station defined",
            "add stations (location_type=1) to group stops",
        ));
    } else if metrics.parent_completion_rate < 50.0 {
        out.push(Recommendation::new(
            Level::Warning,
            format!(
                "low use of parent_station ({}%)",
                metrics.parent_completion_rate
            ),
            "attach more stops to their station",
        ));
    }

    if metrics.unused_parents > 0 {
        out.push(Recommendation::new(
            Level::Warning,
            format!("{} unused stations", metrics.unused_parents),
            "no stop refers to these stations; check whether they are needed",
        ));
    }

    let consistency_error = checks
        .iter()
        .any(|c| c.name != "geographic_distances" && c.status == Status::Error);
    if consistency_error {
        out.push(Recommendation::new(
            Level::Critical,
            "hierarchy consistency errors",
            "fix invalid parent_station references",
        ));
    }

    let distances = checks.iter().find_map(|c| match &c.details {
        Details::Distances(report) => Some(report),
        _ => None,
    });
    match distances {
        Some(d) if d.over_1000m > 0 => out.push(Recommendation::new(
            Level::Error,
            "stops very far from their station",
            "check station coordinates or parent assignments",
        )),
        Some(d) if d.over_500m > 0 => out.push(Recommendation::new(
            Level::Warning,
            "stops far from their station",
            "check coordinate precision",
        )),
        _ => {}
    }

    if metrics.leaves_per_parent > 20.0 {
        out.push(Recommendation::new(
            Level::Info,
            "crowded stations",
            format!(
                "{} stops per station on average; consider splitting stations",
                metrics.leaves_per_parent
            ),
        ));
    }

    out
}

/// Full analysis of one hierarchical table.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyAnalysis {
    pub checks: Vec<CheckResult>,
    pub metrics: HierarchyMetrics,
    pub repartition: BTreeMap<String, Share>,
    pub recommendations: Vec<Recommendation>,
}

/// Runs the type format check, every consistency rule, the cycle check and
/// the distance analysis over `table`.
///
/// Without a parent column only the type format check is run.
pub fn analyze(
    table: &Table,
    spec: &HierarchySpec,
    type_rule: &FormatRule,
    labels: &[(i64, &str)],
) -> HierarchyAnalysis {
    let nodes = nodes(table, spec);
    let metrics = HierarchyMetrics::from_nodes(&nodes);
    let repartition = repartition(table, &spec.type_column, labels);

    let mut checks = vec![format::validate(
        table,
        &spec.type_column,
        type_rule,
        &spec.id_column,
    )];

    if !table.has_column(&spec.parent_column) {
        return HierarchyAnalysis {
            checks,
            metrics,
            repartition,
            recommendations: vec![Recommendation::new(
                Level::Warning,
                format!("column {} is missing", spec.parent_column),
                "stop/station relations cannot be checked without it",
            )],
        };
    }

    let has_coordinates = table.has_column(&spec.lat_column) && table.has_column(&spec.lon_column);
    checks.extend([
        check_parents_have_no_parent(&nodes),
        check_parent_references(&nodes),
        check_no_leaf_to_leaf(&nodes),
        check_unused_parents(&nodes),
        check_cycles(&nodes),
        check_distances(&nodes, has_coordinates),
    ]);

    let recommendations = recommendations(&metrics, &checks[1..]);
    HierarchyAnalysis {
        checks,
        metrics,
        repartition,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Genre;
    use crate::table::ColumnType;
    use proptest::prelude::*;

    fn stops(rows: Vec<(&str, Option<i64>, Option<&str>, Option<(f64, f64)>)>) -> Table {
        Table::from_rows(
            "stops.txt",
            &[
                ("stop_id", ColumnType::String),
                ("location_type", ColumnType::Integer),
                ("parent_station", ColumnType::String),
                ("stop_lat", ColumnType::Float),
                ("stop_lon", ColumnType::Float),
            ],
            rows.into_iter()
                .map(|(id, ty, parent, coord)| {
                    vec![
                        id.into(),
                        ty.into(),
                        parent.into(),
                        coord.map(|c| c.0).into(),
                        coord.map(|c| c.1).into(),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    fn type_rule() -> FormatRule {
        FormatRule::enumeration("location types", Genre::Optional, ["0", "1", "2", "3", "4"])
            .unwrap()
    }

    fn by_name<'a>(analysis: &'a HierarchyAnalysis, name: &str) -> &'a CheckResult {
        analysis.checks.iter().find(|c| c.name == name).unwrap()
    }

    fn chain(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(c, p)| (c.to_string(), p.to_string()))
            .collect()
    }

    #[test]
    fn test_clean_hierarchy_passes() {
        let table = stops(vec![
            ("ST1", Some(1), None, Some((48.8566, 2.3522))),
            ("S1", Some(0), Some("ST1"), Some((48.8567, 2.3523))),
            ("S2", None, Some("ST1"), Some((48.8565, 2.3521))),
        ]);
        let analysis = analyze(&table, &HierarchySpec::default(), &type_rule(), &[]);
        for check in &analysis.checks {
            assert!(
                matches!(check.status, Status::Pass | Status::Warning),
                "{} is {:?}",
                check.name,
                check.status
            );
        }
        assert_eq!(by_name(&analysis, "geographic_distances").status, Status::Pass);
        assert_eq!(analysis.metrics.leaf_count, 2);
        assert_eq!(analysis.metrics.parent_completion_rate, 100.0);
        assert_eq!(analysis.metrics.hierarchy_usage_rate, 100.0);
    }

    #[test]
    fn test_station_with_parent_is_error() {
        let table = stops(vec![
            ("ST1", Some(1), Some("ST2"), None),
            ("ST2", Some(1), None, None),
        ]);
        let nodes = nodes(&table, &HierarchySpec::default());
        let check = check_parents_have_no_parent(&nodes);
        assert_eq!(check.status, Status::Error);
        assert_eq!(
            check.details,
            Details::Hierarchy {
                offending_ids: vec!["ST1".into()],
                references: vec![]
            }
        );
    }

    #[test]
    fn test_dangling_and_wrong_type_references() {
        let table = stops(vec![
            ("S1", Some(0), Some("NOPE"), None),
            ("S2", Some(0), Some("S3"), None),
            ("S3", Some(0), None, None),
            ("E1", Some(2), None, None),
            ("S4", Some(0), Some("E1"), None),
        ]);
        let nodes = nodes(&table, &HierarchySpec::default());

        let refs = check_parent_references(&nodes);
        assert_eq!(refs.status, Status::Error);
        let Details::Hierarchy { references, .. } = &refs.details else {
            panic!("expected hierarchy details");
        };
        let problems: Vec<(&str, ParentProblem)> = references
            .iter()
            .map(|r| (r.child.as_str(), r.problem))
            .collect();
        assert_eq!(
            problems,
            vec![
                ("S1", ParentProblem::Dangling),
                ("S2", ParentProblem::WrongType),
                ("S4", ParentProblem::WrongType),
            ]
        );

        let leaf_to_leaf = check_no_leaf_to_leaf(&nodes);
        assert_eq!(leaf_to_leaf.status, Status::Error);
        let Details::Hierarchy { offending_ids, .. } = &leaf_to_leaf.details else {
            panic!("expected hierarchy details");
        };
        assert_eq!(offending_ids, &["S2"]);
    }

    #[test]
    fn test_unused_station_is_warning() {
        let table = stops(vec![
            ("ST1", Some(1), None, None),
            ("ST2", Some(1), None, None),
            ("S1", Some(0), Some("ST1"), None),
        ]);
        let check = check_unused_parents(&nodes(&table, &HierarchySpec::default()));
        assert_eq!(check.status, Status::Warning);
        assert_eq!(
            check.details,
            Details::AffectedIds {
                affected_ids: vec!["ST2".into()]
            }
        );
    }

    #[test]
    fn test_distance_thresholds() {
        // 0.001 degree of latitude is about 111 m
        let table = stops(vec![
            ("ST1", Some(1), None, Some((45.0, 5.0))),
            ("NEAR", Some(0), Some("ST1"), Some((45.001, 5.0))),
            ("MID", Some(0), Some("ST1"), Some((45.006, 5.0))),
        ]);
        let check = check_distances(&nodes(&table, &HierarchySpec::default()), true);
        assert_eq!(check.status, Status::Warning);

        let table = stops(vec![
            ("ST1", Some(1), None, Some((45.0, 5.0))),
            ("FAR", Some(0), Some("ST1"), Some((45.02, 5.0))),
        ]);
        let check = check_distances(&nodes(&table, &HierarchySpec::default()), true);
        assert_eq!(check.status, Status::Error);
        let Details::Distances(report) = &check.details else {
            panic!("expected a distance report");
        };
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.over_1000m, 1);
        assert_eq!(report.far_pairs[0].child, "FAR");
    }

    fn pair_at(distance_m: f64) -> Vec<Node> {
        // along a meridian, one degree of latitude spans R * pi / 180 metres
        let lat = distance_m / (crate::geo::EARTH_RADIUS_M * std::f64::consts::PI / 180.0);
        vec![
            Node {
                id: "ST1".into(),
                kind: NodeKind::Parent,
                parent: None,
                coordinate: Some(Coordinate::new(0.0, 0.0)),
            },
            Node {
                id: "S1".into(),
                kind: NodeKind::Leaf,
                parent: Some("ST1".into()),
                coordinate: Some(Coordinate::new(lat, 0.0)),
            },
        ]
    }

    #[test]
    fn test_distance_threshold_edges() {
        for (distance, expected) in [
            (499.9, Status::Pass),
            (500.1, Status::Warning),
            (999.9, Status::Warning),
            (1000.1, Status::Error),
        ] {
            let pair = pair_at(distance);
            let actual = haversine_m(pair[0].coordinate.unwrap(), pair[1].coordinate.unwrap());
            assert!((actual - distance).abs() < 1e-6, "{distance} m came out as {actual}");

            let check = check_distances(&pair, true);
            assert_eq!(check.status, expected, "{distance} m");
        }
    }

    #[test]
    fn test_unusable_coordinates_count_as_missing() {
        let table = stops(vec![
            ("ST1", Some(1), None, Some((45.0, 5.0))),
            ("S1", Some(0), Some("ST1"), Some((f64::INFINITY, 5.0))),
        ]);
        let parsed = nodes(&table, &HierarchySpec::default());
        assert!(parsed[1].coordinate.is_none());
        let check = check_distances(&parsed, true);
        assert_eq!(check.status, Status::Info);
        assert_eq!(
            check.details,
            Details::Unavailable {
                reason: Unavailable::MissingCoordinates
            }
        );

        let table = stops(vec![
            ("ST1", Some(1), None, Some((45.0, 5.0))),
            ("S1", Some(0), Some("ST1"), Some((45.0, 190.0))),
            ("S2", Some(0), Some("ST1"), Some((45.0001, 5.0))),
        ]);
        let check = check_distances(&nodes(&table, &HierarchySpec::default()), true);
        assert_eq!(check.status, Status::Pass);
        let Details::Distances(report) = &check.details else {
            panic!("expected a distance report");
        };
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.without_coordinates, vec!["S1".to_string()]);
    }

    #[test]
    fn test_pairs_without_coordinates_are_excluded() {
        let table = stops(vec![
            ("ST1", Some(1), None, None),
            ("S1", Some(0), Some("ST1"), Some((45.0, 5.0))),
        ]);
        let check = check_distances(&nodes(&table, &HierarchySpec::default()), true);
        assert_eq!(check.status, Status::Info);
        assert_eq!(
            check.details,
            Details::Unavailable {
                reason: Unavailable::MissingCoordinates
            }
        );

        let table = stops(vec![
            ("ST1", Some(1), None, Some((45.0, 5.0))),
            ("S1", Some(0), Some("ST1"), None),
            ("S2", Some(0), Some("ST1"), Some((45.0001, 5.0))),
        ]);
        let check = check_distances(&nodes(&table, &HierarchySpec::default()), true);
        assert_eq!(check.status, Status::Pass);
        let Details::Distances(report) = &check.details else {
            panic!("expected a distance report");
        };
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.without_coordinates, vec!["S1".to_string()]);
    }

    #[test]
    fn test_three_node_cycle() {
        let report = detect_cycles(&chain(&[("A", "B"), ("B", "C"), ("C", "A")]));
        assert!(report.has_cycle);
        assert_eq!(report.cycle_ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_cycle_members_exclude_tail() {
        let report = detect_cycles(&chain(&[("T", "A"), ("A", "B"), ("B", "A"), ("S", "S")]));
        assert_eq!(report.cycle_ids, vec!["A", "B", "S"]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let pairs: HashMap<String, String> = (0..200_000)
            .map(|i| (format!("N{i}"), format!("N{}", i + 1)))
            .collect();
        let report = detect_cycles(&pairs);
        assert!(!report.has_cycle);
    }

    #[test]
    fn test_cycle_check_on_table() {
        let table = stops(vec![
            ("A", Some(1), Some("B"), None),
            ("B", Some(1), Some("A"), None),
        ]);
        let check = check_cycles(&nodes(&table, &HierarchySpec::default()));
        assert_eq!(check.status, Status::Error);
    }

    #[test]
    fn test_missing_parent_column_runs_format_only() {
        let table = Table::from_rows(
            "stops.txt",
            &[
                ("stop_id", ColumnType::String),
                ("location_type", ColumnType::Integer),
            ],
            vec![vec!["S1".into(), 0i64.into()], vec!["ST1".into(), 1i64.into()]],
        )
        .unwrap();
        let analysis = analyze(&table, &HierarchySpec::default(), &type_rule(), &[]);
        assert_eq!(analysis.checks.len(), 1);
        assert_eq!(analysis.recommendations[0].level, Level::Warning);
    }

    #[test]
    fn test_repartition_labels() {
        let table = stops(vec![
            ("ST1", Some(1), None, None),
            ("S1", Some(0), None, None),
            ("S2", Some(0), None, None),
            ("S3", None, None, None),
        ]);
        let shares = repartition(&table, "location_type", &[(0, "stop"), (1, "station")]);
        assert_eq!(shares["0"].count, 2);
        assert_eq!(shares["0"].percentage, 50.0);
        assert_eq!(shares["1"].label, "station");
        assert!(!shares.contains_key(""));
    }

    #[test]
    fn test_recommendations_flag_low_completion() {
        let table = stops(vec![
            ("ST1", Some(1), None, None),
            ("S1", Some(0), Some("ST1"), None),
            ("S2", Some(0), None, None),
            ("S3", Some(0), None, None),
        ]);
        let analysis = analyze(&table, &HierarchySpec::default(), &type_rule(), &[]);
        assert!(
            analysis
                .recommendations
                .iter()
                .any(|r| r.level == Level::Warning && r.message.contains("33.3%"))
        );
    }

    #[test]
    fn test_other_types_are_ignored() {
        let table = stops(vec![(
            "E1",
            Some(2),
            Some("ST9"),
            Some((0.0, 0.0)),
        )]);
        let nodes = nodes(&table, &HierarchySpec::default());
        assert_eq!(check_parent_references(&nodes).status, Status::Pass);
        assert_eq!(nodes[0].kind, NodeKind::Other);
    }

    proptest! {
        #[test]
        fn prop_forest_has_no_cycle(parents in proptest::collection::vec(0usize..50, 1..50)) {
            // node i points to a strictly smaller index, so the map is acyclic
            let map: HashMap<String, String> = parents
                .iter()
                .enumerate()
                .filter(|(i, _)| *i > 0)
                .map(|(i, p)| (format!("N{i}"), format!("N{}", p % i)))
                .collect();
            let report = detect_cycles(&map);
            prop_assert!(!report.has_cycle);
            prop_assert!(report.cycle_ids.is_empty());
        }

        #[test]
        fn prop_ring_reports_every_member(n in 1usize..30) {
            let map: HashMap<String, String> = (0..n)
                .map(|i| (format!("N{i}"), format!("N{}", (i + 1) % n)))
                .collect();
            let report = detect_cycles(&map);
            prop_assert!(report.has_cycle);
            prop_assert_eq!(report.cycle_ids.len(), n);
        }
    }
}
