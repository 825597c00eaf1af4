//! # Visited-Area Hull
//!
//! Convex hull of raw fixes, used to draw the explored region.
//!
//! Uses the monotone chain algorithm over a planar frame with longitude as
//! `x` and latitude as `y`. That frame is only an approximation, which holds
//! at the scale of a walking session.
//!
//! Output is deterministic for a given point multiset: points are sorted by
//! `x` then `y`, and collinear points are dropped (the pop condition is
//! `cross <= 0`), so no three consecutive vertices are collinear. Vertices
//! come out counter-clockwise, starting at the lowest `x`.

use geo::{ChamberlainDuquetteArea, Coord, Intersects, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::{Bounds, GpsPoint};

/// Fewest points that can bound an area.
pub const MIN_HULL_POINTS: usize = 3;

/// Z component of `(a - o) x (b - o)`; positive for a counter-clockwise turn.
fn cross(o: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> f64 {
    (a.longitude - o.longitude) * (b.latitude - o.latitude)
        - (a.latitude - o.latitude) * (b.longitude - o.longitude)
}

/// Convex hull of `points`.
///
/// Fewer than three input points are returned unchanged. Otherwise invalid
/// coordinates and exact duplicates are dropped before the scan; if fewer
/// than three distinct points remain they are returned sorted. Collinear
/// input yields its two extreme points.
pub fn compute_hull(points: &[GpsPoint]) -> Vec<GpsPoint> {
    if points.len() < MIN_HULL_POINTS {
        return points.to_vec();
    }

    let mut sorted: Vec<GpsPoint> = points.iter().filter(|p| p.is_valid()).copied().collect();
    sorted.sort_by(|a, b| {
        a.longitude
            .total_cmp(&b.longitude)
            .then(a.latitude.total_cmp(&b.latitude))
    });
    sorted.dedup();

    if sorted.len() < MIN_HULL_POINTS {
        return sorted;
    }

    let mut lower: Vec<GpsPoint> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<GpsPoint> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    // Each chain ends where the other starts
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Hull of a previous hull plus new points.
///
/// Every vertex of the combined hull is a vertex of the old hull or one of
/// the new points, so this equals `compute_hull` over the full point set
/// while only touching `hull.len() + new_points.len()` points.
pub fn extend_hull(hull: &[GpsPoint], new_points: &[GpsPoint]) -> Vec<GpsPoint> {
    let mut combined = Vec::with_capacity(hull.len() + new_points.len());
    combined.extend_from_slice(hull);
    combined.extend_from_slice(new_points);
    compute_hull(&combined)
}

/// Polygon approximating the visited area. Never persisted; rebuilt from
/// raw points whenever they change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitedAreaPolygon {
    vertices: Vec<GpsPoint>,
}

impl VisitedAreaPolygon {
    /// A polygon with no vertices, drawn as nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Hull of `points` as a polygon.
    pub fn from_points(points: &[GpsPoint]) -> Result<Self> {
        Self::from_hull(compute_hull(points))
    }

    /// Wrap already computed hull vertices.
    ///
    /// Fails with `InsufficientHullPoints` for fewer than three vertices,
    /// which the caller is expected to treat as "no area yet".
    pub fn from_hull(vertices: Vec<GpsPoint>) -> Result<Self> {
        if vertices.len() < MIN_HULL_POINTS {
            return Err(TrackingError::InsufficientHullPoints {
                point_count: vertices.len(),
                minimum_required: MIN_HULL_POINTS,
            });
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[GpsPoint] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// As a `geo` polygon (x = longitude, y = latitude), ring closed.
    pub fn to_polygon(&self) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = self
            .vertices
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Whether a point lies inside or on the boundary.
    pub fn contains(&self, point: &GpsPoint) -> bool {
        if self.is_empty() {
            return false;
        }
        self.to_polygon()
            .intersects(&Point::new(point.longitude, point.latitude))
    }

    /// Approximate spherical area in square meters.
    pub fn area_square_meters(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.to_polygon().chamberlain_duquette_unsigned_area()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.vertices)
    }

    /// Vertices as a flat `[lat, lng, lat, lng, ...]` buffer.
    pub fn to_flat_coords(&self) -> Vec<f64> {
        self.vertices
            .iter()
            .flat_map(|p| [p.latitude, p.longitude])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lng: f64) -> GpsPoint {
        GpsPoint::new(lat, lng)
    }

    fn sorted_key(points: &[GpsPoint]) -> Vec<(i64, i64)> {
        let mut keys: Vec<(i64, i64)> = points
            .iter()
            .map(|p| ((p.latitude * 1e6) as i64, (p.longitude * 1e6) as i64))
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_square_with_interior_point() {
        let points = vec![pt(0.0, 0.0), pt(0.0, 2.0), pt(2.0, 2.0), pt(2.0, 0.0), pt(1.0, 1.0)];
        let hull = compute_hull(&points);
        assert_eq!(hull.len(), 4);
        assert_eq!(
            sorted_key(&hull),
            sorted_key(&[pt(0.0, 0.0), pt(2.0, 0.0), pt(2.0, 2.0), pt(0.0, 2.0)])
        );
        assert!(!hull.contains(&pt(1.0, 1.0)));
    }

    #[test]
    fn test_counter_clockwise_from_lowest_x() {
        let points = vec![pt(0.0, 0.0), pt(0.0, 2.0), pt(2.0, 2.0), pt(2.0, 0.0)];
        let hull = compute_hull(&points);
        assert_eq!(hull, vec![pt(0.0, 0.0), pt(0.0, 2.0), pt(2.0, 2.0), pt(2.0, 0.0)]);
        for i in 0..hull.len() {
            let turn = cross(&hull[i], &hull[(i + 1) % hull.len()], &hull[(i + 2) % hull.len()]);
            assert!(turn > 0.0);
        }
    }

    #[test]
    fn test_fewer_than_three_unchanged() {
        assert!(compute_hull(&[]).is_empty());
        let two = vec![pt(5.0, 5.0), pt(1.0, 1.0)];
        assert_eq!(compute_hull(&two), two);
    }

    #[test]
    fn test_collinear_points_dropped() {
        let points: Vec<GpsPoint> = (0..5).map(|i| pt(i as f64, i as f64)).collect();
        assert_eq!(compute_hull(&points), vec![pt(0.0, 0.0), pt(4.0, 4.0)]);

        // Midpoints on the edges of a triangle
        let points = vec![pt(0.0, 0.0), pt(0.0, 1.0), pt(0.0, 2.0), pt(2.0, 0.0), pt(1.0, 0.0)];
        assert_eq!(compute_hull(&points).len(), 3);
    }

    #[test]
    fn test_duplicates() {
        let same = vec![pt(1.0, 1.0); 6];
        assert_eq!(compute_hull(&same), vec![pt(1.0, 1.0)]);

        let points = vec![pt(0.0, 0.0), pt(0.0, 0.0), pt(1.0, 0.0), pt(0.0, 1.0), pt(0.0, 1.0)];
        assert_eq!(compute_hull(&points).len(), 3);
    }

    #[test]
    fn test_deterministic_under_reordering() {
        let mut points = vec![
            pt(0.1, 0.3),
            pt(-0.2, 0.9),
            pt(0.5, 0.5),
            pt(0.4, -0.1),
            pt(0.0, 0.0),
            pt(0.2, 0.2),
            pt(-0.3, 0.1),
        ];
        let first = compute_hull(&points);
        points.reverse();
        assert_eq!(compute_hull(&points), first);
        points.rotate_left(3);
        assert_eq!(compute_hull(&points), first);
    }

    #[test]
    fn test_invalid_points_ignored() {
        let points = vec![pt(0.0, 0.0), pt(f64::NAN, 1.0), pt(1.0, 0.0), pt(0.0, 1.0)];
        assert_eq!(compute_hull(&points).len(), 3);
    }

    #[test]
    fn test_extend_matches_full_recompute() {
        let all: Vec<GpsPoint> = (0..60)
            .map(|i| {
                let a = i as f64 * 0.7;
                pt(a.sin() * (1.0 + (i % 5) as f64), a.cos() * (2.0 + (i % 3) as f64))
            })
            .collect();

        let mut hull = compute_hull(&all[..10]);
        for chunk in all[10..].chunks(7) {
            hull = extend_hull(&hull, chunk);
        }
        assert_eq!(hull, compute_hull(&all));
    }

    #[test]
    fn test_polygon_requires_three_vertices() {
        let result = VisitedAreaPolygon::from_points(&[pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 2.0)]);
        assert_eq!(
            result,
            Err(TrackingError::InsufficientHullPoints {
                point_count: 2,
                minimum_required: 3
            })
        );
    }

    #[test]
    fn test_polygon_contains_and_area() {
        let points = vec![pt(0.0, 0.0), pt(0.0, 0.001), pt(0.001, 0.001), pt(0.001, 0.0)];
        let polygon = VisitedAreaPolygon::from_points(&points).unwrap();

        assert!(polygon.contains(&pt(0.0005, 0.0005)));
        assert!(polygon.contains(&pt(0.0, 0.0005)));
        assert!(!polygon.contains(&pt(0.002, 0.0005)));

        // ~111m x ~111m at the equator
        let area = polygon.area_square_meters();
        assert!((area - 12_380.0).abs() < 250.0, "area {}", area);

        assert_eq!(polygon.to_flat_coords().len(), 8);
        let bounds = polygon.bounds().unwrap();
        assert_eq!(bounds.max_lat, 0.001);
    }

    #[test]
    fn test_empty_polygon() {
        let polygon = VisitedAreaPolygon::empty();
        assert!(polygon.is_empty());
        assert_eq!(polygon.area_square_meters(), 0.0);
        assert!(!polygon.contains(&pt(0.0, 0.0)));
        assert!(polygon.bounds().is_none());
    }
}
