//! Adjacency aggregation: walks stop-time rows in (trip, sequence) order
//! and counts every consecutive in-scope station pair as one edge
//! increment.
//!
//! The previous-row pointer is function-local fold state, not a shared
//! accumulator, so the pass could be partitioned per trip and merged by
//! summing counts.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::feed::StopTimeColumns;
use crate::parser::RawRow;
use crate::routes::{RouteScope, TripRoutes};
use crate::stations::StationIndex;

/// Canonical (lexicographically sorted) station pair → accumulated trip
/// count. Ordered so downstream output is deterministic.
pub type EdgeCounts = BTreeMap<(String, String), u64>;

/// Result of one aggregation pass.
#[derive(Debug, Default)]
pub struct Adjacency {
    pub edges: EdgeCounts,
    /// Canonical ids of stations visited by at least one in-scope trip;
    /// only these appear in the output graph.
    pub stations: BTreeSet<String>,
    /// Distinct trips that contributed at least one in-scope row.
    pub scoped_trips: usize,
    /// Rows excluded because their trip has no in-scope route label.
    pub out_of_scope_rows: usize,
    /// Rows excluded because their stop id resolved to no known station.
    pub missing_stop_rows: usize,
}

/// One typed stop-time row, extracted before sorting.
struct StopTime {
    trip_id: String,
    raw_stop_id: String,
    sequence: Option<f64>,
}

/// The previous in-scope row, carried across the fold.
struct PrevStop {
    trip_id: String,
    station: String,
    sequence: Option<f64>,
}

/// Aggregates consecutive-station adjacency over the stop_times table.
///
/// Rows are sorted by (trip id, sequence) first, so unsorted feeds
/// aggregate identically to sorted ones. An edge is recorded when the
/// current and previous rows share a trip, both sequences are truthy, and
/// the sequence strictly increased; the pair key is canonicalized by
/// sorting, so both travel directions merge into one edge. Every in-scope
/// row advances the previous-row state whether or not an edge was
/// recorded; excluded rows do not touch it.
///
/// Side effects on `stations`: every in-scope visit accumulates the
/// trip's route label on the station (and the name marker for named
/// lines).
pub fn aggregate(
    stop_times: &[RawRow],
    cols: &StopTimeColumns,
    trips: &TripRoutes,
    scope: &RouteScope,
    stations: &mut StationIndex,
) -> Adjacency {
    let mut rows: Vec<StopTime> = stop_times
        .iter()
        .map(|row| StopTime {
            trip_id: row.get(cols.trip_id).map(|f| f.key()).unwrap_or_default(),
            raw_stop_id: row.get(cols.stop_id).map(|f| f.key()).unwrap_or_default(),
            sequence: row.get(cols.sequence).and_then(|f| f.as_number()),
        })
        .collect();

    rows.sort_by(|a, b| {
        a.trip_id.cmp(&b.trip_id).then_with(|| {
            a.sequence
                .unwrap_or(0.0)
                .total_cmp(&b.sequence.unwrap_or(0.0))
        })
    });

    let mut result = Adjacency::default();
    let mut trips_seen: BTreeSet<String> = BTreeSet::new();
    let marker = scope.station_marker.as_deref();

    let mut prev: Option<PrevStop> = None;
    for row in rows {
        let label = trips
            .label(&row.trip_id)
            .and_then(|raw| scope.classify(raw));
        let Some(label) = label else {
            result.out_of_scope_rows += 1;
            continue;
        };

        let Some(station) = stations.resolve(&row.raw_stop_id).map(str::to_string) else {
            debug!(stop_id = %row.raw_stop_id, trip_id = %row.trip_id, "Stop time references unknown stop, excluding");
            result.missing_stop_rows += 1;
            continue;
        };

        result.stations.insert(station.clone());
        trips_seen.insert(row.trip_id.clone());
        stations.record_service(&station, &label, marker);

        if let Some(p) = &prev {
            let consecutive = p.trip_id == row.trip_id
                && match (p.sequence, row.sequence) {
                    (Some(prev_seq), Some(seq)) => {
                        prev_seq != 0.0 && seq != 0.0 && seq > prev_seq
                    }
                    _ => false,
                };
            if consecutive {
                let key = if p.station <= station {
                    (p.station.clone(), station.clone())
                } else {
                    (station.clone(), p.station.clone())
                };
                *result.edges.entry(key).or_insert(0) += 1;
            }
        }

        prev = Some(PrevStop {
            trip_id: row.trip_id,
            station,
            sequence: row.sequence,
        });
    }

    result.scoped_trips = trips_seen.len();
    result
}
