//! Route classification: resolves each trip to a route label and decides
//! which lines are in scope for the graph.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::feed::{RouteColumns, TripColumns};
use crate::parser::{Field, RawRow};

/// Canonical label of an in-scope line.
///
/// Numeric labels order before named ones, so a mixed label set
/// materializes deterministically. Serializes untagged: numeric labels as
/// JSON numbers, named lines as strings, matching the renderer's tooltip
/// format.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum RouteLabel {
    Line(i64),
    Named(String),
}

impl std::fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteLabel::Line(n) => write!(f, "{n}"),
            RouteLabel::Named(s) => f.write_str(s),
        }
    }
}

/// The in-scope predicate for route labels.
///
/// The exact route universe is deployment-specific, so the thresholds are
/// plain data injected into the pipeline rather than constants baked into
/// the aggregation code. The default matches a tram-and-subway city
/// network: numeric lines below 100 plus the named lines A, B and C.
#[derive(Debug, Clone)]
pub struct RouteScope {
    /// Integral numeric labels strictly below this value are in scope.
    pub max_numeric: i64,
    /// Named line codes in scope.
    pub named_lines: Vec<String>,
    /// Suffix appended (at most once) to the names of stations served by a
    /// named line.
    pub station_marker: Option<String>,
}

impl Default for RouteScope {
    fn default() -> Self {
        Self {
            max_numeric: 100,
            named_lines: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            station_marker: Some(" (M)".to_string()),
        }
    }
}

impl RouteScope {
    /// Classifies a raw route label. `None` means the route is out of
    /// scope and its trips contribute nothing to the graph.
    pub fn classify(&self, label: &Field) -> Option<RouteLabel> {
        match label {
            Field::Number(n) if is_safe_integer(*n) && (*n as i64) < self.max_numeric => {
                Some(RouteLabel::Line(*n as i64))
            }
            Field::Text(t) if self.named_lines.iter().any(|line| line == t) => {
                Some(RouteLabel::Named(t.clone()))
            }
            _ => None,
        }
    }
}

fn is_safe_integer(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0
}

/// Trip id → raw route label, resolved through the routes table.
#[derive(Debug, Default)]
pub struct TripRoutes {
    labels: HashMap<String, Field>,
    /// Trips whose route id was absent from the routes table.
    pub unrouted_trips: usize,
}

impl TripRoutes {
    /// Builds the trip→label map. Trip rows without a usable trip id are
    /// skipped; trips referencing an unknown route are counted and
    /// excluded rather than failing the run, since feeds routinely carry
    /// soft-deleted entities.
    pub fn from_rows(
        routes: &[RawRow],
        trips: &[RawRow],
        route_cols: &RouteColumns,
        trip_cols: &TripColumns,
    ) -> Self {
        let mut route_labels: HashMap<String, Field> = HashMap::new();
        for row in routes {
            let (Some(id), Some(label)) = (row.get(route_cols.id), row.get(route_cols.label))
            else {
                continue;
            };
            route_labels.insert(id.key(), label.clone());
        }

        let mut resolved = TripRoutes::default();
        for row in trips {
            let Some(trip_id) = row.get(trip_cols.trip_id) else {
                continue;
            };
            if !trip_id.is_truthy() {
                continue;
            }

            let route_id = row
                .get(trip_cols.route_id)
                .map(|f| f.key())
                .unwrap_or_default();
            match route_labels.get(&route_id) {
                Some(label) => {
                    resolved.labels.insert(trip_id.key(), label.clone());
                }
                None => {
                    debug!(trip_id = %trip_id, route_id = %route_id, "Trip references unknown route, excluding");
                    resolved.unrouted_trips += 1;
                }
            }
        }

        resolved
    }

    /// The raw route label of a trip, if the trip is known.
    pub fn label(&self, trip_id: &str) -> Option<&Field> {
        self.labels.get(trip_id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_labels_below_threshold_are_in_scope() {
        let scope = RouteScope::default();
        assert_eq!(scope.classify(&Field::Number(9.0)), Some(RouteLabel::Line(9)));
        assert_eq!(scope.classify(&Field::Number(99.0)), Some(RouteLabel::Line(99)));
        assert_eq!(scope.classify(&Field::Number(100.0)), None);
        assert_eq!(scope.classify(&Field::Number(99999.0)), None);
    }

    #[test]
    fn test_non_integral_labels_are_out_of_scope() {
        let scope = RouteScope::default();
        assert_eq!(scope.classify(&Field::Number(9.5)), None);
    }

    #[test]
    fn test_named_lines_are_in_scope() {
        let scope = RouteScope::default();
        assert_eq!(
            scope.classify(&Field::Text("A".into())),
            Some(RouteLabel::Named("A".into()))
        );
        assert_eq!(scope.classify(&Field::Text("S9".into())), None);
    }

    #[test]
    fn test_scope_is_configurable() {
        let scope = RouteScope {
            max_numeric: 10,
            named_lines: vec!["U1".to_string()],
            station_marker: None,
        };
        assert_eq!(scope.classify(&Field::Number(9.0)), Some(RouteLabel::Line(9)));
        assert_eq!(scope.classify(&Field::Number(22.0)), None);
        assert_eq!(scope.classify(&Field::Text("A".into())), None);
        assert_eq!(
            scope.classify(&Field::Text("U1".into())),
            Some(RouteLabel::Named("U1".into()))
        );
    }

    #[test]
    fn test_label_ordering_is_numeric_then_named() {
        let mut labels = vec![
            RouteLabel::Named("A".into()),
            RouteLabel::Line(22),
            RouteLabel::Line(9),
        ];
        labels.sort();
        assert_eq!(
            labels,
            vec![
                RouteLabel::Line(9),
                RouteLabel::Line(22),
                RouteLabel::Named("A".into()),
            ]
        );
    }

    fn route_row(id: &str, label: Field) -> RawRow {
        vec![Field::Text(id.into()), Field::Text("agency".into()), label]
    }

    fn trip_row(route_id: &str, trip_id: Field) -> RawRow {
        vec![Field::Text(route_id.into()), Field::Text("svc".into()), trip_id]
    }

    #[test]
    fn test_trip_resolution_through_route_table() {
        let routes = vec![route_row("R1", Field::Number(9.0))];
        let trips = vec![trip_row("R1", Field::Text("T1".into()))];

        let resolved = TripRoutes::from_rows(
            &routes,
            &trips,
            &RouteColumns::default(),
            &TripColumns::default(),
        );

        assert_eq!(resolved.label("T1"), Some(&Field::Number(9.0)));
        assert_eq!(resolved.unrouted_trips, 0);
    }

    #[test]
    fn test_trip_without_id_is_skipped() {
        let routes = vec![route_row("R1", Field::Number(9.0))];
        let trips = vec![trip_row("R1", Field::Text(String::new()))];

        let resolved = TripRoutes::from_rows(
            &routes,
            &trips,
            &RouteColumns::default(),
            &TripColumns::default(),
        );

        assert!(resolved.is_empty());
    }

    #[test]
    fn test_trip_with_unknown_route_is_counted_and_excluded() {
        let routes = vec![route_row("R1", Field::Number(9.0))];
        let trips = vec![
            trip_row("R1", Field::Text("T1".into())),
            trip_row("GHOST", Field::Text("T2".into())),
        ];

        let resolved = TripRoutes::from_rows(
            &routes,
            &trips,
            &RouteColumns::default(),
            &TripColumns::default(),
        );

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.label("T2"), None);
        assert_eq!(resolved.unrouted_trips, 1);
    }
}
