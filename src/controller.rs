//! # Tracking Controller
//!
//! Owns all exploration state for a session and turns location events into
//! published snapshots.
//!
//! ## State machine
//!
//! - **Uninitialized**: no origin yet. The first accepted fix becomes the
//!   grid origin.
//! - **OriginSet**: every accepted fix is indexed, recorded in the ledger,
//!   appended to the raw point buffer, folded into the hull, and a new
//!   snapshot is published.
//!
//! With `OriginPolicy::Persisted` a stored origin is loaded at startup and
//! the session begins in `OriginSet`.
//!
//! ## Delivery
//!
//! Events must arrive serialized. The controller takes `&mut self` for every
//! update; sources that deliver from several threads share it as a
//! [`SharedController`] and feed a single consumer via [`spawn_event_loop`].
//! A delivered batch uses only its last fix.
//!
//! Storage writes are queued to a [`StorageWriter`] thread and never block
//! intake. Once the raw point count passes `inline_hull_limit`, hull work
//! moves to a [`HullWorker`] and the published hull may trail intake by one
//! batch; [`TrackingController::refresh`] picks up finished hulls.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, TrackingError};
use crate::grid::{cell_for, center_of, GridIndexer};
use crate::hull::{compute_hull, VisitedAreaPolygon, MIN_HULL_POINTS};
use crate::hull_worker::HullWorker;
use crate::ledger::VisitLedger;
use crate::stats::{DayAggregator, DayStats};
use crate::storage::{MemoryStore, RawLocationPoint, StorageStats, StorageWriter, VisitStore, WriteHandle};
use crate::{Bounds, GpsPoint, GridCell, OriginPolicy, TrackingConfig};

/// How often the event loop checks for finished background hulls while idle.
const HULL_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// Event Types
// ============================================================================

/// Location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    AuthorizedWhenInUse,
    AuthorizedAlways,
    Denied,
    Restricted,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways
        )
    }

    /// `Ok` only in an authorized state; otherwise the matching error.
    pub fn ensure_authorized(&self) -> Result<()> {
        match self {
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways => Ok(()),
            AuthorizationStatus::NotDetermined => Err(TrackingError::AuthorizationNotDetermined),
            AuthorizationStatus::Denied => Err(TrackingError::AuthorizationDenied),
            AuthorizationStatus::Restricted => Err(TrackingError::AuthorizationRestricted),
        }
    }
}

/// One fix from the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coordinate: GpsPoint,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in meters
    pub accuracy: Option<f64>,
}

impl LocationSample {
    pub fn new(coordinate: GpsPoint, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            timestamp,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Events published by the location source.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A batch of fixes, oldest first; only the last one is used
    Locations(Vec<LocationSample>),
    AuthorizationChanged(AuthorizationStatus),
    /// The source reported an error; nothing to record
    Failed { message: String },
}

// ============================================================================
// Snapshot Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackingState {
    Uninitialized,
    OriginSet,
}

/// Accuracy circle around the latest fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCircle {
    pub center: GpsPoint,
    pub radius_meters: f64,
}

impl LocationCircle {
    fn for_sample(sample: &LocationSample, default_radius_meters: f64) -> Self {
        let radius_meters = sample
            .accuracy
            .filter(|a| a.is_finite() && *a > 0.0)
            .unwrap_or(default_radius_meters);
        Self {
            center: sample.coordinate,
            radius_meters,
        }
    }
}

/// Read-only view of the controller state.
///
/// Published as `Arc<TrackingSnapshot>` and replaced, never modified, on
/// each update. `version` increases with every publication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub version: u64,
    pub state: TrackingState,
    pub authorization: AuthorizationStatus,
    pub tracking: bool,
    pub origin: Option<GpsPoint>,
    pub explored_cells: Arc<HashSet<GridCell>>,
    pub hull_polygon: VisitedAreaPolygon,
    pub current_location_circle: Option<LocationCircle>,
    pub raw_point_count: usize,
    pub explored_area_square_meters: f64,
}

impl TrackingSnapshot {
    pub fn is_explored(&self, x: i32, y: i32) -> bool {
        self.explored_cells.contains(&GridCell::new(x, y))
    }

    pub fn explored_count(&self) -> usize {
        self.explored_cells.len()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Explored cell center for R-tree viewport queries.
#[derive(Debug, Clone)]
struct ExploredCellEntry {
    cell: GridCell,
    center: [f64; 2],
}

impl RTreeObject for ExploredCellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.center)
    }
}

// ============================================================================
// Tracking Controller
// ============================================================================

pub struct TrackingController {
    config: TrackingConfig,
    indexer: GridIndexer,

    // Session state
    origin: Option<GpsPoint>,
    authorization: AuthorizationStatus,
    tracking: bool,
    ledger: VisitLedger,
    raw_points: Vec<RawLocationPoint>,
    current_location: Option<LocationCircle>,

    // Hull state: vertices over the first `hull_points_folded` raw points
    hull: Vec<GpsPoint>,
    hull_points_folded: usize,
    hull_worker: Option<HullWorker>,

    // Spatial index for viewport queries
    spatial_index: RTree<ExploredCellEntry>,
    spatial_dirty: bool,

    // Publication
    snapshot: Arc<TrackingSnapshot>,
    listeners: Vec<mpsc::Sender<Arc<TrackingSnapshot>>>,

    startup_warnings: Vec<TrackingError>,
    writes: WriteHandle,
    writer: StorageWriter,
}

/// Controller shared between threads; the mutex serializes updates.
pub type SharedController = Arc<Mutex<TrackingController>>;

impl TrackingController {
    // ========================================================================
    // Initialization
    // ========================================================================

    /// Start a session over `store`, replaying its contents first.
    ///
    /// Read failures during replay do not prevent startup: the affected
    /// state starts empty and the error is kept in `startup_warnings`.
    pub fn open<S: VisitStore + 'static>(store: S, config: TrackingConfig) -> Result<Self> {
        config.validate()?;
        let mut warnings = Vec::new();

        let origin = match config.origin_policy {
            OriginPolicy::Persisted => {
                replay_or_warn(store.load_origin(), "origin", &mut warnings).flatten()
            }
            OriginPolicy::SessionScoped => None,
        };
        let visits = replay_or_warn(store.scan_visits(), "visits", &mut warnings).unwrap_or_default();
        let points = replay_or_warn(store.scan_points(), "location points", &mut warnings)
            .unwrap_or_default();

        log::info!(
            "[TrackingController] Replayed {} visits and {} location points (origin {})",
            visits.len(),
            points.len(),
            if origin.is_some() { "restored" } else { "pending" }
        );

        let writer = StorageWriter::spawn(Box::new(store));
        let writes = writer.handle();
        let ledger = VisitLedger::replay(visits, Some(writer.handle()));

        let mut controller = Self {
            indexer: GridIndexer::new(config.cell_size_degrees),
            config,
            origin,
            authorization: AuthorizationStatus::NotDetermined,
            tracking: true,
            ledger,
            raw_points: points,
            current_location: None,
            hull: Vec::new(),
            hull_points_folded: 0,
            hull_worker: None,
            spatial_index: RTree::new(),
            spatial_dirty: true,
            snapshot: Arc::new(TrackingSnapshot {
                version: 0,
                state: TrackingState::Uninitialized,
                authorization: AuthorizationStatus::NotDetermined,
                tracking: true,
                origin: None,
                explored_cells: Arc::new(HashSet::new()),
                hull_polygon: VisitedAreaPolygon::empty(),
                current_location_circle: None,
                raw_point_count: 0,
                explored_area_square_meters: 0.0,
            }),
            listeners: Vec::new(),
            startup_warnings: warnings,
            writes,
            writer,
        };
        controller.seed_hull();
        controller.snapshot = Arc::new(controller.build_snapshot(0));
        Ok(controller)
    }

    /// Session without durable storage.
    pub fn in_memory(config: TrackingConfig) -> Result<Self> {
        Self::open(MemoryStore::new(), config)
    }

    fn seed_hull(&mut self) {
        let coords = self.raw_coordinates();
        if coords.len() > self.config.inline_hull_limit {
            let mut worker = HullWorker::spawn();
            worker.reset(coords, self.raw_points.len());
            self.hull_worker = Some(worker);
        } else {
            self.hull = compute_hull(&coords);
            self.hull_points_folded = self.raw_points.len();
        }
    }

    // ========================================================================
    // Event Intake
    // ========================================================================

    /// Dispatch one event from the location source.
    ///
    /// Returns the cell recorded, if any. Authorization errors are returned
    /// unchanged for the caller to surface.
    pub fn handle_event(&mut self, event: LocationEvent) -> Result<Option<GridCell>> {
        match event {
            LocationEvent::Locations(samples) => self.on_locations(&samples),
            LocationEvent::AuthorizationChanged(status) => self.set_authorization(status).map(|_| None),
            LocationEvent::Failed { message } => {
                log::warn!("[TrackingController] Location source failed: {}", message);
                Ok(None)
            }
        }
    }

    /// Process a delivered batch of fixes. Only the last fix is used.
    ///
    /// Returns `Ok(None)` for an empty batch or while tracking is stopped.
    pub fn on_locations(&mut self, samples: &[LocationSample]) -> Result<Option<GridCell>> {
        self.authorization.ensure_authorized()?;
        if !self.tracking {
            return Ok(None);
        }
        match samples.last() {
            Some(sample) => self.record_fix(sample).map(Some),
            None => Ok(None),
        }
    }

    fn record_fix(&mut self, sample: &LocationSample) -> Result<GridCell> {
        let coordinate = sample.coordinate;
        if !coordinate.is_valid() {
            return Err(TrackingError::InvalidCoordinates {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
            });
        }

        let origin = self.ensure_origin(coordinate);
        let cell = cell_for(&coordinate, &origin, self.indexer.cell_size_degrees());
        if self.ledger.record(cell, sample.timestamp) {
            self.spatial_dirty = true;
        }

        let point = RawLocationPoint::new(coordinate, sample.timestamp, sample.accuracy);
        self.raw_points.push(point);
        if let Err(e) = self.writes.append_point(point) {
            log::warn!("[TrackingController] Location point kept in memory only: {}", e);
        }

        self.update_hull(coordinate);
        self.current_location = Some(LocationCircle::for_sample(
            sample,
            self.config.default_accuracy_radius_meters,
        ));
        self.publish();
        Ok(cell)
    }

    /// Origin for indexing, fixing it from `coordinate` on first use.
    fn ensure_origin(&mut self, coordinate: GpsPoint) -> GpsPoint {
        if let Some(origin) = self.origin {
            return origin;
        }
        log::info!(
            "[TrackingController] Origin set to ({:.6}, {:.6})",
            coordinate.latitude,
            coordinate.longitude
        );
        self.origin = Some(coordinate);
        self.spatial_dirty = true;
        if self.config.origin_policy == OriginPolicy::Persisted {
            if let Err(e) = self.writes.save_origin(coordinate) {
                log::warn!("[TrackingController] Origin not persisted: {}", e);
            }
        }
        coordinate
    }

    fn update_hull(&mut self, coordinate: GpsPoint) {
        let count = self.raw_points.len();

        if let Some(worker) = &self.hull_worker {
            worker.submit(vec![coordinate]);
            self.poll_hull();
            return;
        }

        if count > self.config.inline_hull_limit {
            log::info!(
                "[TrackingController] {} location points, moving hull computation to background",
                count
            );
            let mut seed = self.hull.clone();
            seed.push(coordinate);
            let mut worker = HullWorker::spawn();
            worker.reset(seed, count);
            self.hull_worker = Some(worker);
            return;
        }

        self.hull = compute_hull(&self.raw_coordinates());
        self.hull_points_folded = count;
    }

    /// Take the newest finished background hull, if any.
    fn poll_hull(&mut self) -> bool {
        let Some(update) = self.hull_worker.as_ref().and_then(HullWorker::try_latest) else {
            return false;
        };
        self.hull = update.vertices;
        self.hull_points_folded = update.points_folded;
        true
    }

    /// Pick up a finished background hull and publish it.
    /// Returns whether a new snapshot was published.
    pub fn refresh(&mut self) -> bool {
        if self.poll_hull() {
            self.publish();
            true
        } else {
            false
        }
    }

    /// Wait until the hull covers every raw point, up to `timeout`.
    /// Always true while the hull is computed inline.
    pub fn sync_hull(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut changed = self.poll_hull();
        while self.hull_points_folded < self.raw_points.len() {
            let update = match &self.hull_worker {
                Some(worker) => worker.recv_until(deadline),
                None => None,
            };
            match update {
                Some(update) => {
                    self.hull = update.vertices;
                    self.hull_points_folded = update.points_folded;
                    changed = true;
                }
                None => break,
            }
        }
        if changed {
            self.publish();
        }
        self.hull_points_folded >= self.raw_points.len()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Record an authorization change. `Denied` and `Restricted` are stored
    /// and then returned as errors; tracking resumes by itself once an
    /// authorized status arrives.
    pub fn set_authorization(&mut self, status: AuthorizationStatus) -> Result<()> {
        if status != self.authorization {
            log::info!(
                "[TrackingController] Authorization {:?} -> {:?}",
                self.authorization,
                status
            );
            self.authorization = status;
            self.publish();
        }
        match status {
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => status.ensure_authorized(),
            _ => Ok(()),
        }
    }

    /// Stop accepting fixes. Everything recorded so far is kept and still
    /// written out.
    pub fn stop_tracking(&mut self) {
        if self.tracking {
            self.tracking = false;
            log::info!("[TrackingController] Tracking stopped");
            self.publish();
        }
    }

    pub fn start_tracking(&mut self) {
        if !self.tracking {
            self.tracking = true;
            log::info!("[TrackingController] Tracking started");
            self.publish();
        }
    }

    /// Drop all raw points and the hull, in memory and in storage.
    /// Visits and the origin are kept.
    pub fn clear_history(&mut self) {
        log::info!(
            "[TrackingController] Clearing {} location points",
            self.raw_points.len()
        );
        self.raw_points.clear();
        self.hull.clear();
        self.hull_points_folded = 0;
        self.hull_worker = None;
        if let Err(e) = self.writes.clear_points() {
            log::warn!("[TrackingController] Stored location points not cleared: {}", e);
        }
        self.publish();
    }

    /// Drop every recorded visit, in memory and in storage.
    pub fn reset_exploration(&mut self) {
        log::info!(
            "[TrackingController] Clearing {} visits",
            self.ledger.visit_count()
        );
        self.ledger.clear();
        self.spatial_dirty = true;
        if let Err(e) = self.writes.clear_visits() {
            log::warn!("[TrackingController] Stored visits not cleared: {}", e);
        }
        self.publish();
    }

    /// Record a visit to a cell directly, bypassing indexing (previews and
    /// testing). Returns `true` when the cell was new.
    pub fn simulate_visit(&mut self, x: i32, y: i32, timestamp: DateTime<Utc>) -> bool {
        let newly_explored = self.ledger.record(GridCell::new(x, y), timestamp);
        if newly_explored {
            self.spatial_dirty = true;
        }
        self.publish();
        newly_explored
    }

    /// Block until all queued storage writes are applied.
    pub fn flush(&self) -> bool {
        self.writer.flush()
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn snapshot(&self) -> Arc<TrackingSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Snapshot including any background hull finished since the last fix.
    pub fn current_snapshot(&mut self) -> Arc<TrackingSnapshot> {
        self.refresh();
        self.snapshot()
    }

    /// Receive every snapshot published from now on, starting with the
    /// current one.
    pub fn subscribe(&mut self) -> mpsc::Receiver<Arc<TrackingSnapshot>> {
        let (tx, rx) = mpsc::channel();
        if tx.send(self.snapshot()).is_ok() {
            self.listeners.push(tx);
        }
        rx
    }

    fn publish(&mut self) {
        let snapshot = Arc::new(self.build_snapshot(self.snapshot.version + 1));
        self.listeners
            .retain(|listener| listener.send(Arc::clone(&snapshot)).is_ok());
        self.snapshot = snapshot;
    }

    fn build_snapshot(&self, version: u64) -> TrackingSnapshot {
        let hull_polygon = self.hull_polygon();
        TrackingSnapshot {
            version,
            state: self.state(),
            authorization: self.authorization,
            tracking: self.tracking,
            origin: self.origin,
            explored_cells: self.ledger.explored_cells(),
            explored_area_square_meters: hull_polygon.area_square_meters(),
            hull_polygon,
            current_location_circle: self.current_location,
            raw_point_count: self.raw_points.len(),
        }
    }

    fn hull_polygon(&self) -> VisitedAreaPolygon {
        if self.raw_points.len() < MIN_HULL_POINTS {
            return VisitedAreaPolygon::empty();
        }
        match VisitedAreaPolygon::from_hull(self.hull.clone()) {
            Ok(polygon) => polygon,
            Err(e) => {
                log::debug!("[TrackingController] No visited area yet: {}", e);
                VisitedAreaPolygon::empty()
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> TrackingState {
        if self.origin.is_some() {
            TrackingState::OriginSet
        } else {
            TrackingState::Uninitialized
        }
    }

    pub fn origin(&self) -> Option<GpsPoint> {
        self.origin
    }

    pub fn authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn ledger(&self) -> &VisitLedger {
        &self.ledger
    }

    pub fn raw_points(&self) -> &[RawLocationPoint] {
        &self.raw_points
    }

    fn raw_coordinates(&self) -> Vec<GpsPoint> {
        self.raw_points.iter().map(RawLocationPoint::coordinate).collect()
    }

    pub fn is_explored(&self, x: i32, y: i32) -> bool {
        self.ledger.is_explored(&GridCell::new(x, y))
    }

    pub fn last_visit(&self, x: i32, y: i32) -> Option<DateTime<Utc>> {
        self.ledger.last_visit(&GridCell::new(x, y))
    }

    /// Center of a cell; `LocationUnavailable` before the first fix.
    pub fn center_of(&self, cell: &GridCell) -> Result<GpsPoint> {
        self.indexer.center_of(cell, self.origin.as_ref())
    }

    /// Every cell overlapping a viewport with its explored flag, for the
    /// coarse grid overlay.
    ///
    /// Fails with `ViewportTooLarge` when the viewport covers more than
    /// `max_overlay_cells`; the caller should zoom in or draw the hull only.
    pub fn grid_overlay(&self, bounds: &Bounds) -> Result<Vec<(GridCell, bool)>> {
        let origin = self.origin.ok_or_location_unavailable()?;
        let cell_count = self.indexer.covering_count(bounds, &origin);
        let limit = self.config.max_overlay_cells;
        if cell_count > limit as u64 {
            return Err(TrackingError::ViewportTooLarge { cell_count, limit });
        }
        Ok(self
            .indexer
            .cells_covering(bounds, &origin)
            .map(|cell| (cell, self.ledger.is_explored(&cell)))
            .collect())
    }

    /// Explored cells whose centers lie inside a viewport, sorted.
    pub fn query_viewport(&mut self, bounds: &Bounds) -> Vec<GridCell> {
        self.ensure_spatial_index();
        let envelope = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );
        let mut cells: Vec<GridCell> = self
            .spatial_index
            .locate_in_envelope(&envelope)
            .map(|entry| entry.cell)
            .collect();
        cells.sort();
        cells
    }

    fn ensure_spatial_index(&mut self) {
        if !self.spatial_dirty {
            return;
        }
        let entries: Vec<ExploredCellEntry> = match self.origin {
            Some(origin) => self
                .ledger
                .explored_cells()
                .iter()
                .map(|cell| {
                    let center = center_of(cell, &origin, self.indexer.cell_size_degrees());
                    ExploredCellEntry {
                        cell: *cell,
                        center: [center.longitude, center.latitude],
                    }
                })
                .collect(),
            None => Vec::new(),
        };
        self.spatial_index = RTree::bulk_load(entries);
        self.spatial_dirty = false;
    }

    /// Daily statistics over the ledger, local calendar days.
    pub fn day_aggregator(&self) -> DayAggregator<'_> {
        DayAggregator::new(&self.ledger, self.origin, &self.config)
    }

    pub fn day_stats(&self, date: NaiveDate) -> Result<DayStats> {
        self.day_aggregator().stats_for_day(date)
    }

    pub fn all_days(&self) -> Vec<(String, usize)> {
        self.day_aggregator().all_days()
    }

    /// `[{"day": "...", "cells": n}, ...]`, ascending by day.
    pub fn all_days_json(&self) -> String {
        let days: Vec<serde_json::Value> = self
            .all_days()
            .into_iter()
            .map(|(day, cells)| serde_json::json!({ "day": day, "cells": cells }))
            .collect();
        serde_json::to_string(&days).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn storage_stats(&self) -> StorageStats {
        self.writer.stats()
    }

    /// Errors met while replaying storage at startup.
    pub fn startup_warnings(&self) -> &[TrackingError] {
        &self.startup_warnings
    }

    /// Whether hull work currently runs on the background worker.
    pub fn hull_in_background(&self) -> bool {
        self.hull_worker.is_some()
    }
}

fn replay_or_warn<T>(result: Result<T>, what: &str, warnings: &mut Vec<TrackingError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!(
                "[TrackingController] Could not replay stored {}, starting empty: {}",
                what,
                e
            );
            warnings.push(e);
            None
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Run the single consumer of a location event channel on its own thread.
///
/// Each event is handled under the controller lock, so deliveries never
/// overlap. While idle the loop picks up finished background hulls. The
/// thread ends when every sender has been dropped.
pub fn spawn_event_loop(
    controller: SharedController,
    events: mpsc::Receiver<LocationEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match events.recv_timeout(HULL_POLL_INTERVAL) {
            Ok(event) => {
                let mut guard = controller.lock().unwrap_or_else(PoisonError::into_inner);
                match guard.handle_event(event) {
                    Ok(_) => {
                        guard.refresh();
                    }
                    Err(
                        e @ (TrackingError::AuthorizationDenied
                        | TrackingError::AuthorizationRestricted
                        | TrackingError::AuthorizationNotDetermined),
                    ) => {
                        log::info!("[TrackingController] Event ignored: {}", e);
                    }
                    Err(e) => {
                        log::warn!("[TrackingController] Event rejected: {}", e);
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                controller
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .refresh();
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    })
}
