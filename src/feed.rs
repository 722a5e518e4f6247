//! Feed loading: reads the four schedule tables out of a directory of
//! GTFS text files or a zip archive, the standard distribution form.
//!
//! Column positions are a loader concern, not a pipeline one; the
//! `*Columns` layouts below default to the conventional GTFS ordering and
//! can be remapped for feeds that deviate from it.

use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::parser::{ParseError, RawRow, parse_table};

const STOPS_TABLE: &str = "stops.txt";
const ROUTES_TABLE: &str = "routes.txt";
const TRIPS_TABLE: &str = "trips.txt";
const STOP_TIMES_TABLE: &str = "stop_times.txt";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("feed archive could not be opened: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("feed is missing the {0} table")]
    MissingTable(&'static str),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Column positions in the stops table.
#[derive(Debug, Clone)]
pub struct StopColumns {
    pub id: usize,
    pub name: usize,
    pub lat: usize,
    pub lon: usize,
    pub parent: usize,
    pub wheelchair: usize,
}

impl Default for StopColumns {
    fn default() -> Self {
        Self {
            id: 0,
            name: 1,
            lat: 2,
            lon: 3,
            parent: 5,
            wheelchair: 6,
        }
    }
}

/// Column positions in the routes table.
#[derive(Debug, Clone)]
pub struct RouteColumns {
    pub id: usize,
    pub label: usize,
}

impl Default for RouteColumns {
    fn default() -> Self {
        Self { id: 0, label: 2 }
    }
}

/// Column positions in the trips table.
#[derive(Debug, Clone)]
pub struct TripColumns {
    pub route_id: usize,
    pub trip_id: usize,
}

impl Default for TripColumns {
    fn default() -> Self {
        Self {
            route_id: 0,
            trip_id: 2,
        }
    }
}

/// Column positions in the stop_times table.
#[derive(Debug, Clone)]
pub struct StopTimeColumns {
    pub trip_id: usize,
    pub stop_id: usize,
    pub sequence: usize,
}

impl Default for StopTimeColumns {
    fn default() -> Self {
        Self {
            trip_id: 0,
            stop_id: 3,
            sequence: 4,
        }
    }
}

/// Column layouts for all four tables.
#[derive(Debug, Clone, Default)]
pub struct FeedColumns {
    pub stops: StopColumns,
    pub routes: RouteColumns,
    pub trips: TripColumns,
    pub stop_times: StopTimeColumns,
}

/// One complete feed snapshot, parsed into typed rows.
#[derive(Debug)]
pub struct FeedTables {
    pub stops: Vec<RawRow>,
    pub routes: Vec<RawRow>,
    pub trips: Vec<RawRow>,
    pub stop_times: Vec<RawRow>,
}

impl FeedTables {
    /// Reads the four tables from a directory of GTFS text files.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::MissingTable`] when one of the files is absent
    /// and [`FeedError::Parse`] when a table cannot be tokenized.
    pub fn from_dir(dir: impl AsRef<Path>, delimiter: u8) -> Result<Self, FeedError> {
        let dir = dir.as_ref();
        let read = |table: &'static str| -> Result<String, FeedError> {
            let path = dir.join(table);
            std::fs::read_to_string(&path).map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    FeedError::MissingTable(table)
                } else {
                    FeedError::Io {
                        path: path.display().to_string(),
                        source,
                    }
                }
            })
        };

        Self::from_texts(
            &read(STOPS_TABLE)?,
            &read(ROUTES_TABLE)?,
            &read(TRIPS_TABLE)?,
            &read(STOP_TIMES_TABLE)?,
            delimiter,
        )
    }

    /// Reads the four tables out of a zip archive held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Archive`] for an unreadable archive,
    /// [`FeedError::MissingTable`] when an entry is absent, and
    /// [`FeedError::Parse`] when a table cannot be tokenized.
    pub fn from_zip_bytes(bytes: &[u8], delimiter: u8) -> Result<Self, FeedError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

        let mut read = |table: &'static str| -> Result<String, FeedError> {
            let mut entry = match archive.by_name(table) {
                Ok(entry) => entry,
                Err(zip::result::ZipError::FileNotFound) => {
                    return Err(FeedError::MissingTable(table));
                }
                Err(e) => return Err(FeedError::Archive(e)),
            };
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(|source| FeedError::Io {
                path: table.to_string(),
                source,
            })?;
            Ok(text)
        };

        let stops = read(STOPS_TABLE)?;
        let routes = read(ROUTES_TABLE)?;
        let trips = read(TRIPS_TABLE)?;
        let stop_times = read(STOP_TIMES_TABLE)?;

        Self::from_texts(&stops, &routes, &trips, &stop_times, delimiter)
    }

    fn from_texts(
        stops: &str,
        routes: &str,
        trips: &str,
        stop_times: &str,
        delimiter: u8,
    ) -> Result<Self, FeedError> {
        let tables = Self {
            stops: parse_table(stops, delimiter, STOPS_TABLE)?,
            routes: parse_table(routes, delimiter, ROUTES_TABLE)?,
            trips: parse_table(trips, delimiter, TRIPS_TABLE)?,
            stop_times: parse_table(stop_times, delimiter, STOP_TIMES_TABLE)?,
        };

        info!(
            stops = tables.stops.len(),
            routes = tables.routes.len(),
            trips = tables.trips.len(),
            stop_times = tables.stop_times.len(),
            "Feed tables loaded"
        );

        Ok(tables)
    }
}
