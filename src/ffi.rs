//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Exposes a single global tracking controller to Kotlin and Swift, so the
//! host keeps no state across the boundary. All functions are prefixed with
//! `tracker_`. The host's location delegate calls `tracker_on_location` and
//! `tracker_set_authorization` from one serial queue.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{info, warn};
use once_cell::sync::Lazy;

use crate::{
    init_logging, AuthorizationStatus, Bounds, DayStats, GpsPoint, GridCell, LocationSample,
    SqliteStore, TrackingConfig, TrackingController, UnitSystem,
};

/// Global controller instance.
static CONTROLLER: Lazy<Mutex<Option<TrackingController>>> = Lazy::new(|| Mutex::new(None));

/// Run `f` against the global controller, if initialized.
fn with_controller<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut TrackingController) -> R,
{
    let mut guard = CONTROLLER.lock().unwrap_or_else(PoisonError::into_inner);
    guard.as_mut().map(f)
}

fn timestamp_from_millis(timestamp_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(timestamp_ms)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Open the store at `db_path` and start a session.
///
/// `config_json` overrides individual `TrackingConfig` fields; `None` keeps
/// the defaults. Replaces any running session.
#[uniffi::export]
pub fn tracker_init(db_path: String, config_json: Option<String>) -> bool {
    init_logging();
    info!("[TrackingController] Initializing with db: {}", db_path);

    let config = match config_json.as_deref().map(TrackingConfig::from_json) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            warn!("[TrackingController] Invalid config: {}", e);
            return false;
        }
        None => TrackingConfig::default(),
    };

    let controller = SqliteStore::new(&db_path)
        .and_then(|store| TrackingController::open(store, config));
    match controller {
        Ok(controller) => {
            for warning in controller.startup_warnings() {
                warn!("[TrackingController] Startup: {}", warning);
            }
            let mut guard = CONTROLLER.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = Some(controller);
            info!("[TrackingController] Initialized successfully");
            true
        }
        Err(e) => {
            warn!("[TrackingController] Failed to initialize: {}", e);
            false
        }
    }
}

#[uniffi::export]
pub fn tracker_is_initialized() -> bool {
    with_controller(|_| ()).is_some()
}

/// Flush pending writes and end the session.
#[uniffi::export]
pub fn tracker_shutdown() {
    let controller = CONTROLLER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(controller) = controller {
        controller.flush();
        info!("[TrackingController] Shut down");
    }
}

// ============================================================================
// Location Intake
// ============================================================================

/// Feed one fix. Returns the recorded cell, or `None` if the fix was not
/// recorded (not authorized, stopped, invalid, or no session).
#[uniffi::export]
pub fn tracker_on_location(
    latitude: f64,
    longitude: f64,
    timestamp_ms: i64,
    accuracy: Option<f64>,
) -> Option<GridCell> {
    let timestamp = timestamp_from_millis(timestamp_ms)?;
    let mut sample = LocationSample::new(GpsPoint::new(latitude, longitude), timestamp);
    sample.accuracy = accuracy;

    with_controller(|c| match c.on_locations(&[sample]) {
        Ok(cell) => cell,
        Err(e) => {
            info!("[TrackingController] Fix not recorded: {}", e);
            None
        }
    })
    .flatten()
}

/// Report an authorization change. Returns `false` for denied or
/// restricted access.
#[uniffi::export]
pub fn tracker_set_authorization(status: AuthorizationStatus) -> bool {
    with_controller(|c| c.set_authorization(status).is_ok()).unwrap_or(false)
}

#[uniffi::export]
pub fn tracker_start() {
    with_controller(|c| c.start_tracking());
}

#[uniffi::export]
pub fn tracker_stop() {
    with_controller(|c| c.stop_tracking());
}

/// Drop raw points and the visited-area hull. Explored cells are kept.
#[uniffi::export]
pub fn tracker_clear_history() {
    with_controller(|c| c.clear_history());
}

/// Drop every explored cell and its visit history.
#[uniffi::export]
pub fn tracker_reset_exploration() {
    with_controller(|c| c.reset_exploration());
}

#[uniffi::export]
pub fn tracker_simulate_visit(x: i32, y: i32, timestamp_ms: i64) -> bool {
    let Some(timestamp) = timestamp_from_millis(timestamp_ms) else {
        return false;
    };
    with_controller(|c| c.simulate_visit(x, y, timestamp)).unwrap_or(false)
}

// ============================================================================
// Queries
// ============================================================================

/// Current snapshot as JSON, or `"{}"` without a session.
#[uniffi::export]
pub fn tracker_snapshot_json() -> String {
    with_controller(|c| c.current_snapshot().to_json()).unwrap_or_else(|| "{}".to_string())
}

#[uniffi::export]
pub fn tracker_is_explored(x: i32, y: i32) -> bool {
    with_controller(|c| c.is_explored(x, y)).unwrap_or(false)
}

/// Visited-area hull as flat `[lat, lng, ...]`; empty until the points
/// bound an area.
#[uniffi::export]
pub fn tracker_hull_coords() -> Vec<f64> {
    with_controller(|c| c.current_snapshot().hull_polygon.to_flat_coords()).unwrap_or_default()
}

/// Explored cells with centers inside the viewport.
#[uniffi::export]
pub fn tracker_viewport_cells(bounds: Bounds) -> Vec<GridCell> {
    with_controller(|c| c.query_viewport(&bounds)).unwrap_or_default()
}

/// Statistics for one day, for FFI.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDayStats {
    pub day_key: String,
    pub cells_discovered: u32,
    pub distance_meters: f64,
    pub steps: u64,
    pub calories: u64,
}

impl From<DayStats> for FfiDayStats {
    fn from(stats: DayStats) -> Self {
        Self {
            day_key: stats.day_key,
            cells_discovered: u32::try_from(stats.cells_discovered).unwrap_or(u32::MAX),
            distance_meters: stats.distance_meters,
            steps: stats.steps,
            calories: stats.calories,
        }
    }
}

/// Statistics for a `YYYY-MM-DD` day key.
#[uniffi::export]
pub fn tracker_day_stats(day_key: String) -> Option<FfiDayStats> {
    with_controller(|c| match c.day_aggregator().stats_for_key(&day_key) {
        Ok(stats) => Some(FfiDayStats::from(stats)),
        Err(e) => {
            info!("[TrackingController] No stats for {}: {}", day_key, e);
            None
        }
    })
    .flatten()
}

/// `[{"day": "...", "cells": n}, ...]`, or `"[]"` without a session.
#[uniffi::export]
pub fn tracker_all_days_json() -> String {
    with_controller(|c| c.all_days_json()).unwrap_or_else(|| "[]".to_string())
}

#[uniffi::export]
pub fn tracker_format_distance(meters: f64, units: UnitSystem) -> String {
    units.format_distance(meters)
}
