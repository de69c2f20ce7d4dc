//! Error types shared by the library modules.
//!
//! The binaries wrap these in `anyhow` with context; the library keeps them
//! typed so callers can tell an unresolvable address from a broken store.

use std::path::PathBuf;

use thiserror::Error;

/// A latitude/longitude pair outside the WGS84 ranges.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// Raw geometry text that is not well-formed for its declared format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid geometry at offset {offset}: {message}")]
pub struct GeometryParseError {
    /// Byte offset into the raw text where parsing stopped.
    pub offset: usize,
    pub message: String,
}

impl GeometryParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// A region that violates the model invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("region {field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("region geometry must contain at least one polygon")]
    EmptyGeometry,
}

/// Failures of the region store. Never retried by the library.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted record could not be turned back into a region.
    #[error("corrupt region record {id}: {message}")]
    Corrupt { id: u64, message: String },

    #[error(transparent)]
    InvalidRegion(#[from] RegionError),

    /// A batch insert returned a different number of ids than it was given.
    #[error("batch of {expected} regions returned {returned} ids")]
    IdCountMismatch { expected: usize, returned: usize },
}

/// Errors that abort an ingestion run. Nothing from the run is committed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no source found at '{}'", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record {record}: {source}")]
    GeometryParse {
        /// 1-based record number in the source, header included.
        record: u64,
        #[source]
        source: GeometryParseError,
    },

    #[error("record {record} has no {column} value in column {index}")]
    RecordIncomplete {
        record: u64,
        column: &'static str,
        index: usize,
    },

    #[error("failed to read source: {0}")]
    Read(#[from] csv::Error),

    #[error(transparent)]
    InvalidRegion(#[from] RegionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures talking to the external geocoding service.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid geocoder url: {0}")]
    Url(#[from] url::ParseError),

    #[error("geocoder returned an unusable coordinate: {0}")]
    Coordinate(#[from] CoordinateError),
}

/// Failures while answering a submitted address.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
