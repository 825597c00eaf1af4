//! # Algorithm Toolbox
//!
//! Direct access to the pure algorithms, without a controller or storage.
//!
//! ## Core Algorithms
//!
//! - **Grid Indexing**: fix to cell and cell to center, relative to an origin
//! - **Convex Hull**: monotone chain hull and incremental extension
//! - **Day Statistics**: day keys and per-day aggregation over a ledger
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: great-circle distance between GPS points
//! - **Bounds Computation**: bounding box for a set of points
//!
//! # Example
//!
//! ```rust
//! use explore_tracker::algorithms::{cell_for, center_of, haversine_distance, GpsPoint};
//!
//! let origin = GpsPoint::new(48.858844, 2.294351);
//! let fix = GpsPoint::new(48.859344, 2.294351);
//! let cell = cell_for(&fix, &origin, 0.0005);
//! assert_eq!((cell.x, cell.y), (1, 0));
//!
//! let center = center_of(&cell, &origin, 0.0005);
//! assert!(haversine_distance(&center, &fix) < 1.0);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, GpsPoint, GridCell, TrackingConfig};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{compute_bounds, haversine_distance};

// =============================================================================
// Grid Indexing
// =============================================================================

pub use crate::grid::{cell_for, center_of, GridIndexer};

// =============================================================================
// Convex Hull
// =============================================================================

pub use crate::hull::{compute_hull, extend_hull, VisitedAreaPolygon, MIN_HULL_POINTS};

/// Area in square meters enclosed by the hull of `points`, or `0.0` when
/// the points do not bound an area.
pub fn visited_area_square_meters(points: &[GpsPoint]) -> f64 {
    VisitedAreaPolygon::from_points(points)
        .map(|polygon| polygon.area_square_meters())
        .unwrap_or(0.0)
}

// =============================================================================
// Day Statistics
// =============================================================================

pub use crate::stats::{
    day_key, day_of, estimate_activity, parse_day_key, DayAggregator, DayStats, UnitSystem,
};
