//! # Grid Indexing
//!
//! Maps GPS fixes to discrete cells relative to a session origin and back.
//!
//! A cell index is the rounded number of cell-size steps between the fix and
//! the origin: `x` along latitude, `y` along longitude. Rounding is to the
//! nearest integer with ties away from zero, so the origin sits at the center
//! of cell `(0, 0)`.

use crate::error::{OptionExt, Result};
use crate::{Bounds, GpsPoint, GridCell};

/// Cell containing `coordinate`, relative to `origin`.
pub fn cell_for(coordinate: &GpsPoint, origin: &GpsPoint, cell_size_degrees: f64) -> GridCell {
    GridCell {
        x: steps(coordinate.latitude - origin.latitude, cell_size_degrees),
        y: steps(coordinate.longitude - origin.longitude, cell_size_degrees),
    }
}

/// Center coordinate of `cell`, relative to `origin`.
pub fn center_of(cell: &GridCell, origin: &GpsPoint, cell_size_degrees: f64) -> GpsPoint {
    GpsPoint::new(
        origin.latitude + f64::from(cell.x) * cell_size_degrees,
        origin.longitude + f64::from(cell.y) * cell_size_degrees,
    )
}

/// `f64::round` rounds half away from zero; the cast saturates far outside
/// any realistic grid.
fn steps(delta_degrees: f64, cell_size_degrees: f64) -> i32 {
    (delta_degrees / cell_size_degrees).round() as i32
}

/// Grid indexer bound to a fixed cell size.
///
/// The origin is passed per call because it only becomes known with the
/// first fix of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridIndexer {
    cell_size_degrees: f64,
}

impl GridIndexer {
    pub fn new(cell_size_degrees: f64) -> Self {
        Self { cell_size_degrees }
    }

    pub fn cell_size_degrees(&self) -> f64 {
        self.cell_size_degrees
    }

    /// Cell for a fix. Fails with `LocationUnavailable` until an origin exists.
    pub fn cell_for(&self, coordinate: &GpsPoint, origin: Option<&GpsPoint>) -> Result<GridCell> {
        let origin = origin.ok_or_location_unavailable()?;
        Ok(cell_for(coordinate, origin, self.cell_size_degrees))
    }

    /// Center of a cell. Fails with `LocationUnavailable` until an origin exists.
    pub fn center_of(&self, cell: &GridCell, origin: Option<&GpsPoint>) -> Result<GpsPoint> {
        let origin = origin.ok_or_location_unavailable()?;
        Ok(center_of(cell, origin, self.cell_size_degrees))
    }

    /// Footprint of a cell: its center plus/minus half a cell in each axis.
    pub fn cell_bounds(&self, cell: &GridCell, origin: &GpsPoint) -> Bounds {
        let center = center_of(cell, origin, self.cell_size_degrees);
        let half = self.cell_size_degrees / 2.0;
        Bounds {
            min_lat: center.latitude - half,
            max_lat: center.latitude + half,
            min_lng: center.longitude - half,
            max_lng: center.longitude + half,
        }
    }

    /// Corner cells of a viewport: the cells holding its south-west and
    /// north-east corners.
    fn covering_corners(&self, bounds: &Bounds, origin: &GpsPoint) -> (GridCell, GridCell) {
        let min = cell_for(
            &GpsPoint::new(bounds.min_lat, bounds.min_lng),
            origin,
            self.cell_size_degrees,
        );
        let max = cell_for(
            &GpsPoint::new(bounds.max_lat, bounds.max_lng),
            origin,
            self.cell_size_degrees,
        );
        (min, max)
    }

    /// Number of cells `cells_covering` would yield, computed without
    /// enumerating them. Zero for an inverted viewport.
    pub fn covering_count(&self, bounds: &Bounds, origin: &GpsPoint) -> u64 {
        let (min, max) = self.covering_corners(bounds, origin);
        let rows = (i64::from(max.x) - i64::from(min.x) + 1).max(0) as u64;
        let cols = (i64::from(max.y) - i64::from(min.y) + 1).max(0) as u64;
        rows.saturating_mul(cols)
    }

    /// Every cell overlapping a viewport, row by row.
    ///
    /// Used by the coarse grid overlay, which asks `is_explored` for each
    /// returned cell. The iterator is lazy; check `covering_count` before
    /// collecting a viewport of unknown size.
    pub fn cells_covering(
        &self,
        bounds: &Bounds,
        origin: &GpsPoint,
    ) -> impl Iterator<Item = GridCell> {
        let (min, max) = self.covering_corners(bounds, origin);
        (min.x..=max.x).flat_map(move |x| (min.y..=max.y).map(move |y| GridCell::new(x, y)))
    }
}

impl Default for GridIndexer {
    fn default() -> Self {
        Self::new(crate::TrackingConfig::default().cell_size_degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackingError;

    fn eiffel() -> GpsPoint {
        GpsPoint::new(48.858844, 2.294351)
    }

    #[test]
    fn test_one_step_north() {
        let cell = cell_for(&GpsPoint::new(48.859344, 2.294351), &eiffel(), 0.0005);
        assert_eq!(cell, GridCell::new(1, 0));
    }

    #[test]
    fn test_origin_is_cell_zero() {
        assert_eq!(cell_for(&eiffel(), &eiffel(), 0.0005), GridCell::new(0, 0));
    }

    #[test]
    fn test_negative_offsets() {
        let p = GpsPoint::new(48.858844 - 0.0015, 2.294351 - 0.0010);
        assert_eq!(cell_for(&p, &eiffel(), 0.0005), GridCell::new(-3, -2));
    }

    #[test]
    fn test_rounds_to_nearest() {
        let origin = GpsPoint::new(0.0, 0.0);
        // 0.4 and 0.6 of a cell
        assert_eq!(cell_for(&GpsPoint::new(0.0002, 0.0003), &origin, 0.0005), GridCell::new(0, 1));
        assert_eq!(
            cell_for(&GpsPoint::new(-0.0003, -0.0002), &origin, 0.0005),
            GridCell::new(-1, 0)
        );
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        let origin = GpsPoint::new(0.0, 0.0);
        // Exactly half a cell with a power-of-two cell size
        assert_eq!(cell_for(&GpsPoint::new(0.25, -0.25), &origin, 0.5), GridCell::new(1, -1));
    }

    #[test]
    fn test_center_round_trip() {
        let indexer = GridIndexer::new(0.0005);
        let origin = eiffel();
        for x in -40..40 {
            for y in [-1000, -7, 0, 3, 999] {
                let cell = GridCell::new(x, y);
                let center = indexer.center_of(&cell, Some(&origin)).unwrap();
                assert_eq!(indexer.cell_for(&center, Some(&origin)).unwrap(), cell);
            }
        }
    }

    #[test]
    fn test_requires_origin() {
        let indexer = GridIndexer::default();
        assert_eq!(
            indexer.cell_for(&eiffel(), None),
            Err(TrackingError::LocationUnavailable)
        );
        assert_eq!(
            indexer.center_of(&GridCell::new(1, 1), None),
            Err(TrackingError::LocationUnavailable)
        );
    }

    #[test]
    fn test_cell_bounds_contains_center() {
        let indexer = GridIndexer::new(0.0005);
        let cell = GridCell::new(2, -1);
        let bounds = indexer.cell_bounds(&cell, &eiffel());
        assert!(bounds.contains(&center_of(&cell, &eiffel(), 0.0005)));
        assert!((bounds.max_lat - bounds.min_lat - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn test_cells_covering_viewport() {
        let indexer = GridIndexer::new(0.0005);
        let origin = eiffel();
        let bounds = Bounds {
            min_lat: origin.latitude - 0.0005,
            max_lat: origin.latitude + 0.0005,
            min_lng: origin.longitude,
            max_lng: origin.longitude + 0.0005,
        };
        let cells: Vec<GridCell> = indexer.cells_covering(&bounds, &origin).collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(indexer.covering_count(&bounds, &origin), 6);
        assert_eq!(cells[0], GridCell::new(-1, 0));
        assert_eq!(cells[5], GridCell::new(1, 1));
    }

    #[test]
    fn test_covering_count_without_enumerating() {
        let indexer = GridIndexer::new(0.0005);
        let origin = eiffel();
        let world = Bounds {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lng: -180.0,
            max_lng: 180.0,
        };
        // 360001 rows by 720001 columns
        assert_eq!(indexer.covering_count(&world, &origin), 259_201_080_001);

        let inverted = Bounds {
            min_lat: origin.latitude + 0.01,
            max_lat: origin.latitude,
            min_lng: origin.longitude,
            max_lng: origin.longitude,
        };
        assert_eq!(indexer.covering_count(&inverted, &origin), 0);
        assert_eq!(indexer.cells_covering(&inverted, &origin).count(), 0);
    }
}
