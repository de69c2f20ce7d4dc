//! Named region with a multi-polygon boundary.

use geo::{BoundingRect, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::RegionError;
use crate::geometry;
use crate::models::Coordinate;

/// Store-assigned identifier. Ids grow with insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u64);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "region/{}", self.0)
    }
}

/// A validated region that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewRegion {
    name: String,
    city: String,
    state: String,
    geometry: MultiPolygon<f64>,
}

impl NewRegion {
    pub fn new(
        name: impl AsRef<str>,
        city: impl AsRef<str>,
        state: impl AsRef<str>,
        geometry: MultiPolygon<f64>,
    ) -> Result<Self, RegionError> {
        let name = name.as_ref().trim().to_string();
        let city = city.as_ref().trim().to_string();
        let state = state.as_ref().trim().to_string();

        for (field, value) in [("name", &name), ("city", &city), ("state", &state)] {
            if value.is_empty() {
                return Err(RegionError::EmptyField { field });
            }
        }
        if geometry.0.is_empty() {
            return Err(RegionError::EmptyGeometry);
        }

        Ok(Self {
            name,
            city,
            state,
            geometry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Attach the id the store assigned.
    pub fn into_region(self, id: RegionId) -> Region {
        Region {
            id,
            name: self.name,
            city: self.city,
            state: self.state,
            geometry: self.geometry,
        }
    }
}

/// A stored region. Immutable once created; shared behind `Arc` by the stores.
#[derive(Debug, Clone)]
pub struct Region {
    id: RegionId,
    name: String,
    city: String,
    state: String,
    geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Get the bounding box of this region as (min_x, min_y, max_x, max_y)
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Exact containment, boundary excluded.
    pub fn contains(&self, point: Coordinate) -> bool {
        geometry::contains(&self.geometry, point)
    }

    pub fn summary(&self) -> RegionSummary {
        RegionSummary {
            id: self.id,
            name: self.name.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            bbox: self
                .bbox()
                .map(|(min_x, min_y, max_x, max_y)| [min_x, min_y, max_x, max_y]),
        }
    }
}

/// Geometry-free view of a region for listings and API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub id: RegionId,
    pub name: String,
    pub city: String,
    pub state: String,
    /// [minLon, minLat, maxLon, maxLat]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    fn square() -> MultiPolygon<f64> {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (0.0, 10.0),
            (10.0, 10.0),
            (10.0, 0.0),
            (0.0, 0.0),
        ]);
        MultiPolygon::new(vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn test_rejects_blank_fields() {
        let err = NewRegion::new("  ", "Chicago", "IL", square()).unwrap_err();
        assert_eq!(err, RegionError::EmptyField { field: "name" });

        let err = NewRegion::new("Loop", "Chicago", "", square()).unwrap_err();
        assert_eq!(err, RegionError::EmptyField { field: "state" });
    }

    #[test]
    fn test_fields_are_trimmed() {
        let region = NewRegion::new("  Loop ", "Chicago\t", " IL", square()).unwrap();
        assert_eq!(region.name(), "Loop");
        assert_eq!(region.city(), "Chicago");
        assert_eq!(region.state(), "IL");
    }

    #[test]
    fn test_rejects_empty_geometry() {
        let err = NewRegion::new("Loop", "Chicago", "IL", MultiPolygon::new(vec![])).unwrap_err();
        assert_eq!(err, RegionError::EmptyGeometry);
    }

    #[test]
    fn test_summary_bbox() {
        let region = NewRegion::new("Loop", "Chicago", "IL", square())
            .unwrap()
            .into_region(RegionId(7));
        let summary = region.summary();
        assert_eq!(summary.id, RegionId(7));
        assert_eq!(summary.bbox, Some([0.0, 0.0, 10.0, 10.0]));
    }
}
