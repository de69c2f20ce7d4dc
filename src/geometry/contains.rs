//! Point-in-polygon test (even/odd ray casting).
//!
//! A point lying on any ring edge or vertex is never contained, whether the
//! ring is an outer boundary or a hole. Comparisons are plain f64 with no
//! tolerance, so polygons crossing the antimeridian or a pole are not handled.

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::models::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingPosition {
    Inside,
    OnBoundary,
    Outside,
}

/// True if the point is strictly inside at least one member polygon.
pub fn contains(geometry: &MultiPolygon<f64>, point: Coordinate) -> bool {
    let p = point.to_coord();
    geometry.0.iter().any(|polygon| polygon_contains(polygon, p))
}

/// True if the point is strictly inside the exterior and strictly outside
/// every hole.
pub fn polygon_contains(polygon: &Polygon<f64>, p: Coord<f64>) -> bool {
    if ring_position(polygon.exterior(), p) != RingPosition::Inside {
        return false;
    }
    polygon
        .interiors()
        .iter()
        .all(|hole| ring_position(hole, p) == RingPosition::Outside)
}

fn ring_position(ring: &LineString<f64>, p: Coord<f64>) -> RingPosition {
    let mut inside = false;

    for line in ring.lines() {
        let (a, b) = (line.start, line.end);

        if on_segment(a, b, p) {
            return RingPosition::OnBoundary;
        }

        // Half-open on y so a ray through a vertex is counted once.
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }

    if inside {
        RingPosition::Inside
    } else {
        RingPosition::Outside
    }
}

fn on_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross != 0.0 {
        return false;
    }
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}
