//! Graph assembly: folds edge counts into per-station throughput,
//! normalizes both value families onto [0, 1], and emits the wire
//! document the renderer consumes.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use crate::adjacency::Adjacency;
use crate::routes::RouteLabel;
use crate::stations::{Accessibility, StationIndex};

/// A station record in the output document. Serde renames pin the wire
/// field names the renderer consumes; `route_labels` ships as `edges`,
/// the renderer's tooltip source.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Throughput normalized onto [0, 1].
    pub value: f64,
    #[serde(rename = "edges")]
    pub route_labels: Vec<RouteLabel>,
    pub wheelchair: Accessibility,
}

/// One undirected station adjacency with its normalized weight.
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Trip count normalized onto [0, 1].
    pub value: f64,
}

/// The complete output document. Field names and nesting are the wire
/// contract with the renderer and must stay stable.
#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(rename = "latRange")]
    pub lat_range: [f64; 2],
    #[serde(rename = "lonRange")]
    pub lon_range: [f64; 2],
}

/// Running [min, max] accumulator.
#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn observe(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Rescales a raw value onto [0, 1]. A degenerate range (max == min)
    /// normalizes everything to 0.0, so a single-valued graph renders at
    /// minimum mark size instead of dividing by zero.
    fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            0.0
        } else {
            (value - self.min) / span
        }
    }

    fn as_pair(&self) -> [f64; 2] {
        [self.min, self.max]
    }
}

/// Builds the final graph from the aggregated adjacency.
///
/// Each edge count is added to both endpoint throughput accumulators;
/// ranges are taken over final edge counts, final throughput sums, and
/// the coordinates of participating stations. Nodes sort descending by
/// normalized throughput, edges descending by normalized weight; both
/// sorts are stable, so ties keep the aggregation maps' id order.
pub fn normalize(index: &StationIndex, adjacency: &Adjacency) -> Graph {
    let mut throughput: BTreeMap<&str, u64> = adjacency
        .stations
        .iter()
        .map(|id| (id.as_str(), 0))
        .collect();

    let mut edge_range = Range::new();
    for ((source, target), count) in &adjacency.edges {
        edge_range.observe(*count as f64);
        if let Some(total) = throughput.get_mut(source.as_str()) {
            *total += count;
        }
        if let Some(total) = throughput.get_mut(target.as_str()) {
            *total += count;
        }
    }

    let mut node_range = Range::new();
    let mut lat_range = Range::new();
    let mut lon_range = Range::new();
    for (id, total) in &throughput {
        node_range.observe(*total as f64);
        if let Some(station) = index.get(id) {
            lat_range.observe(station.lat);
            lon_range.observe(station.lon);
        }
    }

    let nodes: Vec<GraphNode> = throughput
        .iter()
        .filter_map(|(id, total)| {
            let station = index.get(id)?;
            Some(GraphNode {
                id: station.id.clone(),
                name: station.name.clone(),
                lat: station.lat,
                lon: station.lon,
                value: node_range.normalize(*total as f64),
                route_labels: station.route_labels.iter().cloned().collect(),
                wheelchair: station.accessibility,
            })
        })
        .sorted_by(|a, b| b.value.total_cmp(&a.value))
        .collect();

    let edges: Vec<GraphEdge> = adjacency
        .edges
        .iter()
        .map(|((source, target), count)| GraphEdge {
            source: source.clone(),
            target: target.clone(),
            value: edge_range.normalize(*count as f64),
        })
        .sorted_by(|a, b| b.value.total_cmp(&a.value))
        .collect();

    info!(
        nodes = nodes.len(),
        edges = edges.len(),
        "Graph assembled"
    );

    Graph {
        nodes,
        edges,
        lat_range: lat_range.as_pair(),
        lon_range: lon_range.as_pair(),
    }
}
