//! GeoJSON boundary decoding.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{GeoJson, Geometry, Value};

use super::{validate_ring, GeometryFormat, GeometryParser};
use crate::error::GeometryParseError;

/// Parser for GeoJSON `Polygon` / `MultiPolygon` values. The text may be a
/// bare geometry, a feature, or a collection holding exactly one feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonParser;

impl GeometryParser for GeoJsonParser {
    fn format(&self) -> GeometryFormat {
        GeometryFormat::GeoJson
    }

    fn parse(&self, raw: &str) -> Result<MultiPolygon<f64>, GeometryParseError> {
        let geojson: GeoJson = raw
            .parse()
            .map_err(|e: geojson::Error| GeometryParseError::new(0, e.to_string()))?;

        let geometry = match geojson {
            GeoJson::Geometry(g) => g,
            GeoJson::Feature(f) => f
                .geometry
                .ok_or_else(|| GeometryParseError::new(0, "feature has no geometry"))?,
            GeoJson::FeatureCollection(fc) => {
                let count = fc.features.len();
                let mut features = fc.features.into_iter();
                match (features.next(), count) {
                    (Some(feature), 1) => feature
                        .geometry
                        .ok_or_else(|| GeometryParseError::new(0, "feature has no geometry"))?,
                    _ => {
                        return Err(GeometryParseError::new(
                            0,
                            format!("expected a single feature, found {}", count),
                        ))
                    }
                }
            }
        };

        to_multipolygon(geometry)
    }
}

fn to_multipolygon(geometry: Geometry) -> Result<MultiPolygon<f64>, GeometryParseError> {
    match geometry.value {
        Value::Polygon(rings) => Ok(MultiPolygon::new(vec![to_polygon(rings)?])),
        Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(GeometryParseError::new(0, "empty geometry has no polygons"));
            }
            let polygons = polygons
                .into_iter()
                .map(to_polygon)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MultiPolygon::new(polygons))
        }
        other => {
            let name = match other {
                Value::Point(_) => "Point",
                Value::MultiPoint(_) => "MultiPoint",
                Value::LineString(_) => "LineString",
                Value::MultiLineString(_) => "MultiLineString",
                Value::GeometryCollection(_) => "GeometryCollection",
                _ => "unknown",
            };
            Err(GeometryParseError::new(
                0,
                format!("unsupported geometry type '{}'", name),
            ))
        }
    }
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>, GeometryParseError> {
    let mut rings = rings.into_iter().map(to_ring);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => return Err(GeometryParseError::new(0, "polygon has no rings")),
    };
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn to_ring(positions: Vec<Vec<f64>>) -> Result<LineString<f64>, GeometryParseError> {
    let coords = positions
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y] => Ok(Coord { x: *x, y: *y }),
            other => Err(GeometryParseError::new(
                0,
                format!("position has {} ordinates, expected 2", other.len()),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    validate_ring(coords, 0)
}
