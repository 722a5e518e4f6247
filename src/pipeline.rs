//! End-to-end graph construction over one loaded feed snapshot.
//!
//! A single pure pass: no state survives between runs, so concurrent
//! conversions of different snapshots need no coordination.

use tracing::info;

use crate::adjacency::aggregate;
use crate::feed::{FeedColumns, FeedTables};
use crate::graph::{Graph, normalize};
use crate::routes::{RouteScope, TripRoutes};
use crate::stations::StationIndex;
use crate::stats::ConversionStats;

/// The pipeline's output: the renderable graph plus a run summary.
#[derive(Debug)]
pub struct GraphBuild {
    pub graph: Graph,
    pub stats: ConversionStats,
}

/// Runs the five pipeline stages over parsed tables: station resolution,
/// route classification, adjacency aggregation, and normalization.
pub fn build_graph(tables: &FeedTables, columns: &FeedColumns, scope: &RouteScope) -> GraphBuild {
    let mut stations = StationIndex::from_rows(&tables.stops, &columns.stops);
    info!(stations = stations.len(), "Stations resolved");

    let trip_routes = TripRoutes::from_rows(
        &tables.routes,
        &tables.trips,
        &columns.routes,
        &columns.trips,
    );
    info!(
        trips = trip_routes.len(),
        unrouted = trip_routes.unrouted_trips,
        "Trips classified"
    );

    let adjacency = aggregate(
        &tables.stop_times,
        &columns.stop_times,
        &trip_routes,
        scope,
        &mut stations,
    );
    info!(
        edges = adjacency.edges.len(),
        stations = adjacency.stations.len(),
        scoped_trips = adjacency.scoped_trips,
        out_of_scope_rows = adjacency.out_of_scope_rows,
        missing_stop_rows = adjacency.missing_stop_rows,
        "Adjacency aggregated"
    );

    let graph = normalize(&stations, &adjacency);
    let stats = ConversionStats::from_run(tables, &stations, &trip_routes, &adjacency);

    GraphBuild { graph, stats }
}
