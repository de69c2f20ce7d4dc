//! Canonical geometry handling.
//!
//! Boundaries are held as `geo::MultiPolygon<f64>` with x = longitude and
//! y = latitude, whatever encoding they were loaded from.

mod contains;
mod json;
mod wkt;

use geo::{Coord, LineString, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::GeometryParseError;

pub use contains::{contains, polygon_contains};
pub use json::GeoJsonParser;
pub use wkt::{parse_wkt, to_wkt, WktParser};

/// Decodes one raw geometry value into the canonical multi-polygon.
///
/// The ingestion pipeline only sees this trait, so a new source encoding is a
/// new implementation and a new [`GeometryFormat`] variant.
pub trait GeometryParser: Send + Sync {
    fn format(&self) -> GeometryFormat;

    fn parse(&self, raw: &str) -> Result<MultiPolygon<f64>, GeometryParseError>;
}

/// Geometry encodings a source can declare.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    /// Well-known text, e.g. `MULTIPOLYGON(((x y, ...)))`
    #[default]
    Wkt,
    /// GeoJSON geometry, feature, or single-feature collection
    #[value(name = "geojson")]
    GeoJson,
}

impl GeometryFormat {
    pub fn parser(self) -> Box<dyn GeometryParser> {
        match self {
            GeometryFormat::Wkt => Box::new(WktParser),
            GeometryFormat::GeoJson => Box::new(GeoJsonParser),
        }
    }
}

impl std::fmt::Display for GeometryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryFormat::Wkt => write!(f, "wkt"),
            GeometryFormat::GeoJson => write!(f, "geojson"),
        }
    }
}

/// Check a decoded ring against the model invariants: lon/lat ranges, at
/// least four points, first point equal to last.
pub(crate) fn validate_ring(
    coords: Vec<Coord<f64>>,
    offset: usize,
) -> Result<LineString<f64>, GeometryParseError> {
    for c in &coords {
        if !c.x.is_finite() || !(-180.0..=180.0).contains(&c.x) {
            return Err(GeometryParseError::new(
                offset,
                format!("longitude {} is outside [-180, 180]", c.x),
            ));
        }
        if !c.y.is_finite() || !(-90.0..=90.0).contains(&c.y) {
            return Err(GeometryParseError::new(
                offset,
                format!("latitude {} is outside [-90, 90]", c.y),
            ));
        }
    }

    if coords.len() < 4 {
        return Err(GeometryParseError::new(
            offset,
            format!("ring has {} points, at least 4 required", coords.len()),
        ));
    }
    if coords.first() != coords.last() {
        return Err(GeometryParseError::new(offset, "ring is not closed"));
    }

    Ok(LineString::new(coords))
}
