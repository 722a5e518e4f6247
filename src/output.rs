//! Output formatting and persistence: the graph JSON document and CSV
//! conversion reports.

use anyhow::Result;
use tracing::{debug, info};

use crate::graph::Graph;
use crate::stats::ConversionStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Writes the graph document as compact JSON, the form the renderer
/// fetches.
pub fn write_graph(path: &str, graph: &Graph) -> Result<()> {
    let body = serde_json::to_vec(graph)?;
    std::fs::write(path, body)?;

    info!(
        path,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Graph document written"
    );
    Ok(())
}

/// Logs a run summary as pretty-printed JSON.
pub fn print_json(stats: &ConversionStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Appends a [`ConversionStats`] record as a row to a CSV report file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, stats: &ConversionStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}
