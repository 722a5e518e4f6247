//! Run summary records for conversion reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adjacency::Adjacency;
use crate::feed::FeedTables;
use crate::routes::TripRoutes;
use crate::stations::StationIndex;

/// One conversion run, flattened for CSV report rows.
#[derive(Debug, Default, Serialize)]
pub struct ConversionStats {
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,

    // input tables
    pub stop_rows: usize,
    pub route_rows: usize,
    pub trip_rows: usize,
    pub stop_time_rows: usize,

    // pipeline results
    pub stations: usize,
    pub graph_stations: usize,
    pub scoped_trips: usize,
    pub distinct_edges: usize,
    pub edge_increments: u64,
    /// Sum of per-station throughput; always 2× `edge_increments`, since
    /// every edge contributes to exactly two stations.
    pub total_throughput: u64,

    // excluded records
    pub out_of_scope_rows: usize,
    pub missing_stop_rows: usize,
    pub unrouted_trips: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl ConversionStats {
    pub fn from_run(
        tables: &FeedTables,
        stations: &StationIndex,
        trips: &TripRoutes,
        adjacency: &Adjacency,
    ) -> Self {
        let edge_increments: u64 = adjacency.edges.values().sum();

        ConversionStats {
            timestamp: Utc::now(),
            source: None,
            stop_rows: tables.stops.len(),
            route_rows: tables.routes.len(),
            trip_rows: tables.trips.len(),
            stop_time_rows: tables.stop_times.len(),
            stations: stations.len(),
            graph_stations: adjacency.stations.len(),
            scoped_trips: adjacency.scoped_trips,
            distinct_edges: adjacency.edges.len(),
            edge_increments,
            total_throughput: edge_increments * 2,
            out_of_scope_rows: adjacency.out_of_scope_rows,
            missing_stop_rows: adjacency.missing_stop_rows,
            unrouted_trips: trips.unrouted_trips,
            error_type: None,
            error_message: None,
        }
    }

    /// Creates an error record for a failed run, so report files keep one
    /// row per attempt.
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        ConversionStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Attaches the feed source (path or URL) to the record.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}
