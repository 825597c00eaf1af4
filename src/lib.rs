//! # Explore Tracker
//!
//! Exploration-grid tracking and visited-area reconstruction from GPS fixes.
//!
//! This library provides:
//! - Quantization of GPS fixes into a session-relative grid of cells
//! - An append-only visit ledger with full per-cell visit history
//! - Convex hull reconstruction of the visited area from raw fixes
//! - Per-day statistics (cells, distance, steps, calories)
//! - A tracking controller that ties it together and publishes snapshots
//!
//! ## Features
//!
//! - **`parallel`** - Compute per-day statistics in parallel with rayon
//! - **`persistence`** - SQLite storage adapter
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use explore_tracker::{
//!     AuthorizationStatus, GpsPoint, LocationSample, MemoryStore, TrackingConfig,
//!     TrackingController,
//! };
//!
//! let mut controller =
//!     TrackingController::open(MemoryStore::new(), TrackingConfig::default()).unwrap();
//! controller
//!     .set_authorization(AuthorizationStatus::AuthorizedWhenInUse)
//!     .unwrap();
//!
//! let t0 = Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
//! let sample = LocationSample::new(GpsPoint::new(48.858844, 2.294351), t0);
//! controller.on_locations(&[sample]).unwrap();
//!
//! let snapshot = controller.snapshot();
//! assert!(snapshot.is_explored(0, 0));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackingError};

// Geographic utilities (distance, bounds)
pub mod geo_utils;

// Grid quantization
pub mod grid;
pub use grid::{cell_for, center_of, GridIndexer};

// Visit history
pub mod ledger;
pub use ledger::VisitLedger;

// Visited-area reconstruction
pub mod hull;
pub use hull::{compute_hull, extend_hull, VisitedAreaPolygon};

// Background hull recomputation for long sessions
pub mod hull_worker;
pub use hull_worker::{HullUpdate, HullWorker};

// Per-day statistics
pub mod stats;
pub use stats::{day_key, DayAggregator, DayStats, UnitSystem};

// Storage port and in-memory adapter
pub mod storage;
pub use storage::{
    MemoryStore, RawLocationPoint, StorageStats, StorageWriter, VisitRow, VisitStore, WriteHandle,
};

// SQLite storage adapter
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Tracking controller (event intake, state machine, snapshots)
pub mod controller;
pub use controller::{
    spawn_event_loop, AuthorizationStatus, LocationCircle, LocationEvent, LocationSample,
    SharedController, TrackingController, TrackingSnapshot, TrackingState,
};

// Algorithm toolbox - standalone access to the pure algorithms
pub mod algorithms;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("ExploreTracker"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use explore_tracker::GpsPoint;
/// let point = GpsPoint::new(48.858844, 2.294351); // Paris
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box, used for viewport queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        geo_utils::compute_bounds(points)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Check whether a point lies inside or on the edge of the bounds.
    pub fn contains(&self, point: &GpsPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// A discrete grid bucket, relative to the session origin.
///
/// `x` counts cells along latitude, `y` along longitude.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Stable string identifier (`"x_y"`).
    pub fn id(&self) -> String {
        format!("{}_{}", self.x, self.y)
    }
}

/// Where the grid origin comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginPolicy {
    /// The first fix ever received is stored and reused by later sessions,
    /// so cells stay comparable across restarts.
    #[default]
    Persisted,
    /// Every session takes its own first fix as origin. Replayed cells from
    /// earlier sessions keep their stored coordinates and are only meaningful
    /// relative to the origin of the session that recorded them.
    SessionScoped,
}

/// Smallest accepted cell size: a full 360° span still fits in `i32` cell
/// indices.
pub const MIN_CELL_SIZE_DEGREES: f64 = 360.0 / i32::MAX as f64;

/// Configuration for tracking and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Angular size of a grid cell in degrees (default: 0.0005, ~55m)
    pub cell_size_degrees: f64,
    /// Average stride length used for step estimates (default: 0.78m)
    pub stride_length_meters: f64,
    /// Energy per meter walked (default: 0.05 kcal/m)
    pub calories_per_meter: f64,
    /// Location circle radius when a fix has no usable accuracy (default: 50m)
    pub default_accuracy_radius_meters: f64,
    /// Raw point count above which the hull is rebuilt on a worker thread.
    pub inline_hull_limit: usize,
    /// Origin handling across sessions.
    pub origin_policy: OriginPolicy,
    /// Most cells a single grid overlay request may cover (default: 10000)
    pub max_overlay_cells: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            cell_size_degrees: 0.0005,
            stride_length_meters: 0.78,
            calories_per_meter: 0.05,
            default_accuracy_radius_meters: 50.0,
            inline_hull_limit: 500,
            origin_policy: OriginPolicy::Persisted,
            max_overlay_cells: 10_000,
        }
    }
}

impl TrackingConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| TrackingError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject constants that would make indexing or statistics meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("cell_size_degrees", self.cell_size_degrees),
            ("stride_length_meters", self.stride_length_meters),
            ("default_accuracy_radius_meters", self.default_accuracy_radius_meters),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackingError::ConfigError {
                    message: format!("{} must be a positive number, got {}", name, value),
                });
            }
        }
        if self.cell_size_degrees < MIN_CELL_SIZE_DEGREES {
            return Err(TrackingError::ConfigError {
                message: format!(
                    "cell_size_degrees must be at least {:e}, got {:e}",
                    MIN_CELL_SIZE_DEGREES, self.cell_size_degrees
                ),
            });
        }
        if self.max_overlay_cells == 0 {
            return Err(TrackingError::ConfigError {
                message: "max_overlay_cells must be positive".to_string(),
            });
        }
        if !self.calories_per_meter.is_finite() || self.calories_per_meter < 0.0 {
            return Err(TrackingError::ConfigError {
                message: format!(
                    "calories_per_meter must be non-negative, got {}",
                    self.calories_per_meter
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_validity() {
        assert!(GpsPoint::new(48.85, 2.29).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_cell_id() {
        assert_eq!(GridCell::new(-3, 7).id(), "-3_7");
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = TrackingConfig::from_json(r#"{"cell_size_degrees": 0.001}"#).unwrap();
        assert_eq!(config.cell_size_degrees, 0.001);
        assert_eq!(config.stride_length_meters, 0.78);
        assert_eq!(config.origin_policy, OriginPolicy::Persisted);
    }

    #[test]
    fn test_config_rejects_zero_cell_size() {
        let result = TrackingConfig::from_json(r#"{"cell_size_degrees": 0.0}"#);
        assert!(matches!(result, Err(TrackingError::ConfigError { .. })));
    }

    #[test]
    fn test_config_rejects_cell_size_below_index_range() {
        let config = TrackingConfig {
            cell_size_degrees: 1e-9,
            ..TrackingConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackingError::ConfigError { .. })));

        let smallest = TrackingConfig {
            cell_size_degrees: MIN_CELL_SIZE_DEGREES,
            ..TrackingConfig::default()
        };
        assert!(smallest.validate().is_ok());
        // Half a turn stays well inside the index range
        let far = grid::cell_for(
            &GpsPoint::new(0.0, 180.0),
            &GpsPoint::new(0.0, 0.0),
            MIN_CELL_SIZE_DEGREES,
        );
        assert!(far.y > 1_000_000_000 && far.y < i32::MAX);
    }

    #[test]
    fn test_config_rejects_zero_overlay_limit() {
        let result = TrackingConfig::from_json(r#"{"max_overlay_cells": 0}"#);
        assert!(matches!(result, Err(TrackingError::ConfigError { .. })));
    }

    #[test]
    fn test_origin_policy_json() {
        let config = TrackingConfig::from_json(r#"{"origin_policy": "session_scoped"}"#).unwrap();
        assert_eq!(config.origin_policy, OriginPolicy::SessionScoped);
    }
}
