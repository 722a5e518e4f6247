//! CLI entry point for the GTFS graph converter.
//!
//! Provides subcommands for converting a schedule feed into the renderer's
//! graph document and for inspecting a feed without writing anything.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use gtfs_graph::feed::{FeedColumns, FeedTables};
use gtfs_graph::fetch::{ApiKey, BasicClient, UrlParam, fetch_bytes};
use gtfs_graph::output::{append_record, print_json, write_graph};
use gtfs_graph::pipeline::build_graph;
use gtfs_graph::routes::RouteScope;
use gtfs_graph::stats::ConversionStats;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_graph")]
#[command(about = "Converts a GTFS schedule feed into a station adjacency graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a feed into a graph JSON document
    Convert {
        /// Feed directory, zip archive, or URL of a zip archive
        #[arg(value_name = "DIR_ZIP_OR_URL")]
        source: String,

        /// Path of the graph document to write
        #[arg(short, long, default_value = "graph.json")]
        output: String,

        /// Field delimiter of the feed tables
        #[arg(long, default_value_t = ',')]
        delimiter: char,

        /// Numeric route labels strictly below this are in scope
        #[arg(long, default_value_t = 100)]
        max_numeric_route: i64,

        /// Named line code in scope (repeatable; defaults to A, B, C)
        #[arg(long = "line", value_name = "CODE")]
        lines: Vec<String>,

        /// Suffix appended to names of stations served by a named line
        #[arg(long, default_value = " (M)")]
        marker: String,

        /// Disable the station-name marker entirely
        #[arg(long, default_value_t = false)]
        no_marker: bool,

        /// CSV file to append a run summary row to
        #[arg(long)]
        report: Option<String>,

        /// API key for protected feed URLs
        #[arg(long)]
        api_key: Option<String>,

        /// Send the API key as this URL query parameter
        #[arg(long)]
        api_key_param: Option<String>,

        /// Send the API key in this HTTP header (default: bearer token)
        #[arg(long)]
        api_key_header: Option<String>,
    },
    /// Run the pipeline and log the run summary without writing anything
    Inspect {
        /// Feed directory, zip archive, or URL of a zip archive
        #[arg(value_name = "DIR_ZIP_OR_URL")]
        source: String,

        /// Field delimiter of the feed tables
        #[arg(long, default_value_t = ',')]
        delimiter: char,

        /// Numeric route labels strictly below this are in scope
        #[arg(long, default_value_t = 100)]
        max_numeric_route: i64,

        /// Named line code in scope (repeatable; defaults to A, B, C)
        #[arg(long = "line", value_name = "CODE")]
        lines: Vec<String>,

        /// API key for protected feed URLs
        #[arg(long)]
        api_key: Option<String>,

        /// Send the API key as this URL query parameter
        #[arg(long)]
        api_key_param: Option<String>,

        /// Send the API key in this HTTP header (default: bearer token)
        #[arg(long)]
        api_key_header: Option<String>,
    },
}

struct Auth {
    key: Option<String>,
    param: Option<String>,
    header: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_graph.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_graph.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            source,
            output,
            delimiter,
            max_numeric_route,
            lines,
            marker,
            no_marker,
            report,
            api_key,
            api_key_param,
            api_key_header,
        } => {
            let marker = if no_marker { None } else { Some(marker) };
            let scope = route_scope(max_numeric_route, lines, marker);
            let auth = Auth {
                key: api_key,
                param: api_key_param,
                header: api_key_header,
            };

            let result = run_convert(&source, &output, delimiter, &scope, &auth).await;

            if let Some(report) = &report {
                match &result {
                    Ok(stats) => append_record(report, stats)?,
                    Err(e) => {
                        error!(error = %e, "Conversion failed, recording error row");
                        let error_stats = ConversionStats::from_error(
                            "conversion_error",
                            &e.to_string(),
                        )
                        .with_source(&source);
                        append_record(report, &error_stats)?;
                    }
                }
            }

            result?;
        }
        Commands::Inspect {
            source,
            delimiter,
            max_numeric_route,
            lines,
            api_key,
            api_key_param,
            api_key_header,
        } => {
            let scope = route_scope(max_numeric_route, lines, None);
            let auth = Auth {
                key: api_key,
                param: api_key_param,
                header: api_key_header,
            };

            let tables = load_tables(&source, field_delimiter(delimiter)?, &auth).await?;
            let build = build_graph(&tables, &FeedColumns::default(), &scope);
            print_json(&build.stats.with_source(&source))?;
        }
    }

    Ok(())
}

fn route_scope(max_numeric: i64, lines: Vec<String>, marker: Option<String>) -> RouteScope {
    let defaults = RouteScope::default();
    RouteScope {
        max_numeric,
        named_lines: if lines.is_empty() {
            defaults.named_lines
        } else {
            lines
        },
        station_marker: marker,
    }
}

fn field_delimiter(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    Ok(delimiter as u8)
}

async fn run_convert(
    source: &str,
    output: &str,
    delimiter: char,
    scope: &RouteScope,
    auth: &Auth,
) -> Result<ConversionStats> {
    let tables = load_tables(source, field_delimiter(delimiter)?, auth).await?;
    let build = build_graph(&tables, &FeedColumns::default(), scope);
    write_graph(output, &build.graph)?;

    info!(source, output, "Conversion complete");
    Ok(build.stats.with_source(source))
}

/// Loads the feed tables from a local directory, a local zip archive, or
/// a zip archive fetched over HTTP.
#[tracing::instrument(skip(auth))]
async fn load_tables(source: &str, delimiter: u8, auth: &Auth) -> Result<FeedTables> {
    let tables = if source.starts_with("http") {
        let bytes = fetch_archive(source, auth).await?;
        FeedTables::from_zip_bytes(&bytes, delimiter)?
    } else if source.ends_with(".zip") {
        let bytes = std::fs::read(source)?;
        FeedTables::from_zip_bytes(&bytes, delimiter)?
    } else {
        FeedTables::from_dir(source, delimiter)?
    };
    Ok(tables)
}

async fn fetch_archive(url: &str, auth: &Auth) -> Result<Vec<u8>> {
    match (&auth.key, &auth.param, &auth.header) {
        (Some(key), Some(param), _) => {
            let client = UrlParam {
                inner: BasicClient::new(),
                param_name: param.clone(),
                key: key.clone(),
            };
            fetch_bytes(&client, url).await
        }
        (Some(key), None, Some(header)) => {
            let client = ApiKey {
                inner: BasicClient::new(),
                header_name: header.clone(),
                key: key.clone(),
            };
            fetch_bytes(&client, url).await
        }
        (Some(key), None, None) => {
            let client = ApiKey::bearer(BasicClient::new(), key.clone());
            fetch_bytes(&client, url).await
        }
        (None, _, _) => fetch_bytes(&BasicClient::new(), url).await,
    }
}
