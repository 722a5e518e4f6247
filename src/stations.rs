//! Station resolution: collapses platform-level stops onto their parent
//! station and reduces per-platform accessibility.

use std::collections::{BTreeSet, HashMap};

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::feed::StopColumns;
use crate::parser::RawRow;
use crate::routes::RouteLabel;

/// Wheelchair accessibility of a station, ordered least-accessible first.
///
/// Source feeds code this as 0 = unknown, 1 = accessible, 2 = partially
/// accessible; the remapped wire coding (0 none / 1 partial / 2 full) is
/// what the renderer's glyph scale expects. A station with several
/// platforms is only as accessible as its least accessible platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Accessibility {
    #[default]
    None,
    Partial,
    Full,
}

impl Accessibility {
    pub fn from_feed_code(code: Option<f64>) -> Self {
        match code {
            Some(c) if c == 1.0 => Accessibility::Full,
            Some(c) if c == 2.0 => Accessibility::Partial,
            _ => Accessibility::None,
        }
    }

    /// The less accessible of the two values. Commutative and associative,
    /// so platform rows may be folded in any order.
    pub fn least(self, other: Self) -> Self {
        self.min(other)
    }

    pub fn wire_code(self) -> u8 {
        match self {
            Accessibility::None => 0,
            Accessibility::Partial => 1,
            Accessibility::Full => 2,
        }
    }
}

impl Serialize for Accessibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.wire_code())
    }
}

/// A canonical station: one physical site, possibly aliased by several
/// platform-level stop ids.
#[derive(Debug, Clone)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub accessibility: Accessibility,
    /// Labels of the in-scope lines serving this station, filled during
    /// adjacency aggregation.
    pub route_labels: BTreeSet<RouteLabel>,
}

/// Lookup tables built from the stops table: raw stop id → canonical id,
/// and canonical id → station metadata.
#[derive(Debug, Default)]
pub struct StationIndex {
    alias: HashMap<String, String>,
    stations: HashMap<String, Station>,
}

impl StationIndex {
    /// Builds the alias and station maps from raw stop rows.
    ///
    /// The canonical id is the parent-station field when present, the
    /// stop's own id otherwise. Name and coordinates are last-write-wins
    /// across the rows of one station; accessibility is reduced to the
    /// least accessible value seen. Rows without numeric coordinates are
    /// excluded and logged.
    pub fn from_rows(rows: &[RawRow], cols: &StopColumns) -> Self {
        let mut index = StationIndex::default();

        for row in rows {
            let Some(id) = row.get(cols.id).map(|f| f.key()) else {
                continue;
            };
            if id.is_empty() {
                continue;
            }

            let coords = row
                .get(cols.lat)
                .and_then(|f| f.as_number())
                .zip(row.get(cols.lon).and_then(|f| f.as_number()));
            let Some((lat, lon)) = coords else {
                warn!(stop_id = %id, "Stop row has no numeric coordinates, excluding");
                continue;
            };

            let canonical = match row.get(cols.parent) {
                Some(parent) if parent.is_truthy() => parent.key(),
                _ => id.clone(),
            };
            index.alias.insert(id, canonical.clone());

            let name = row
                .get(cols.name)
                .map(|f| f.key())
                .unwrap_or_default();
            let accessibility =
                Accessibility::from_feed_code(row.get(cols.wheelchair).and_then(|f| f.as_number()));

            index
                .stations
                .entry(canonical.clone())
                .and_modify(|station| {
                    station.name = name.clone();
                    station.lat = lat;
                    station.lon = lon;
                    station.accessibility = station.accessibility.least(accessibility);
                })
                .or_insert_with(|| Station {
                    id: canonical,
                    name,
                    lat,
                    lon,
                    accessibility,
                    route_labels: BTreeSet::new(),
                });
        }

        index
    }

    /// Resolves a raw stop id to its canonical station id.
    pub fn resolve(&self, raw_stop_id: &str) -> Option<&str> {
        self.alias.get(raw_stop_id).map(String::as_str)
    }

    pub fn get(&self, canonical_id: &str) -> Option<&Station> {
        self.stations.get(canonical_id)
    }

    /// Number of canonical stations.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Records that an in-scope line serves the station: accumulates the
    /// route label and, for marked (named) lines, appends the station-name
    /// marker at most once.
    pub fn record_service(&mut self, canonical_id: &str, label: &RouteLabel, marker: Option<&str>) {
        let Some(station) = self.stations.get_mut(canonical_id) else {
            return;
        };

        station.route_labels.insert(label.clone());

        if let (RouteLabel::Named(_), Some(marker)) = (label, marker) {
            if !station.name.ends_with(marker) {
                station.name.push_str(marker);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Field;

    fn stop_row(id: &str, name: &str, lat: f64, lon: f64, parent: &str, wheelchair: &str) -> RawRow {
        let field = |s: &str| {
            if s.is_empty() {
                Field::Text(String::new())
            } else {
                s.parse::<f64>().map(Field::Number).unwrap_or_else(|_| Field::Text(s.to_string()))
            }
        };
        vec![
            field(id),
            Field::Text(name.to_string()),
            Field::Number(lat),
            Field::Number(lon),
            Field::Text(String::new()),
            field(parent),
            field(wheelchair),
        ]
    }

    fn index(rows: &[RawRow]) -> StationIndex {
        StationIndex::from_rows(rows, &StopColumns::default())
    }

    #[test]
    fn test_stop_without_parent_is_its_own_station() {
        let idx = index(&[stop_row("B", "Brod", 50.0, 14.4, "", "1")]);
        assert_eq!(idx.resolve("B"), Some("B"));
        assert_eq!(idx.get("B").unwrap().name, "Brod");
    }

    #[test]
    fn test_platforms_collapse_onto_parent() {
        let idx = index(&[
            stop_row("A1", "Anděl", 50.07, 14.40, "A", "1"),
            stop_row("A2", "Anděl", 50.071, 14.401, "A", "1"),
            stop_row("A", "Anděl", 50.07, 14.40, "", "1"),
        ]);

        assert_eq!(idx.resolve("A1"), Some("A"));
        assert_eq!(idx.resolve("A2"), Some("A"));
        assert_eq!(idx.resolve("A"), Some("A"));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let idx = index(&[stop_row("A1", "Anděl", 50.07, 14.40, "A", "2")]);
        let first = (idx.resolve("A1").map(str::to_string), idx.get("A").unwrap().accessibility);
        let second = (idx.resolve("A1").map(str::to_string), idx.get("A").unwrap().accessibility);
        assert_eq!(first, second);
    }

    #[test]
    fn test_accessibility_remap() {
        assert_eq!(Accessibility::from_feed_code(Some(0.0)), Accessibility::None);
        assert_eq!(Accessibility::from_feed_code(Some(1.0)), Accessibility::Full);
        assert_eq!(Accessibility::from_feed_code(Some(2.0)), Accessibility::Partial);
        assert_eq!(Accessibility::from_feed_code(Some(7.0)), Accessibility::None);
        assert_eq!(Accessibility::from_feed_code(None), Accessibility::None);
    }

    #[test]
    fn test_least_accessible_platform_wins_in_any_order() {
        let forward = index(&[
            stop_row("A1", "Anděl", 50.07, 14.40, "A", "1"),
            stop_row("A2", "Anděl", 50.07, 14.40, "A", "2"),
            stop_row("A3", "Anděl", 50.07, 14.40, "A", "1"),
        ]);
        let backward = index(&[
            stop_row("A3", "Anděl", 50.07, 14.40, "A", "1"),
            stop_row("A2", "Anděl", 50.07, 14.40, "A", "2"),
            stop_row("A1", "Anděl", 50.07, 14.40, "A", "1"),
        ]);

        assert_eq!(forward.get("A").unwrap().accessibility, Accessibility::Partial);
        assert_eq!(backward.get("A").unwrap().accessibility, Accessibility::Partial);
    }

    #[test]
    fn test_wire_coding() {
        assert_eq!(Accessibility::None.wire_code(), 0);
        assert_eq!(Accessibility::Partial.wire_code(), 1);
        assert_eq!(Accessibility::Full.wire_code(), 2);
    }

    #[test]
    fn test_row_without_coordinates_is_excluded() {
        let mut row = stop_row("A1", "Anděl", 0.0, 0.0, "", "1");
        row[2] = Field::Text(String::new());

        let idx = index(&[row]);
        assert_eq!(idx.resolve("A1"), None);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_numeric_ids_share_one_key_space() {
        let idx = index(&[vec![
            Field::Number(1001.0),
            Field::Text("Main".into()),
            Field::Number(50.0),
            Field::Number(14.0),
        ]]);
        assert_eq!(idx.resolve("1001"), Some("1001"));
    }

    #[test]
    fn test_marker_appended_once() {
        let mut idx = index(&[stop_row("A", "Anděl", 50.07, 14.40, "", "1")]);
        let line = RouteLabel::Named("A".into());

        idx.record_service("A", &line, Some(" (M)"));
        idx.record_service("A", &line, Some(" (M)"));

        assert_eq!(idx.get("A").unwrap().name, "Anděl (M)");
    }

    #[test]
    fn test_marker_not_applied_for_numeric_lines() {
        let mut idx = index(&[stop_row("A", "Anděl", 50.07, 14.40, "", "1")]);
        idx.record_service("A", &RouteLabel::Line(9), Some(" (M)"));
        assert_eq!(idx.get("A").unwrap().name, "Anděl");
        assert!(idx.get("A").unwrap().route_labels.contains(&RouteLabel::Line(9)));
    }
}
