//! # Storage Port
//!
//! Durable storage for visit rows, raw location points and the grid origin.
//!
//! The core never talks to a database directly. It depends on the
//! [`VisitStore`] trait, which only needs append, full scan and bulk clear.
//! [`MemoryStore`] backs tests and previews; `SqliteStore` (feature
//! `persistence`) backs the app.
//!
//! Writes are fire-and-forget through a [`StorageWriter`]: a dedicated thread
//! owns the store and applies queued operations in order, so a slow or
//! failing write never holds up the next location event. Failures are logged
//! and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::{GpsPoint, GridCell};

// ============================================================================
// Rows
// ============================================================================

/// One persisted visit: `{x, y, timestamp}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRow {
    pub cell: GridCell,
    pub timestamp: DateTime<Utc>,
}

/// One raw fix, kept independently of the grid for hull reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawLocationPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in meters, when the source reports one
    pub accuracy: Option<f64>,
}

impl RawLocationPoint {
    pub fn new(coordinate: GpsPoint, timestamp: DateTime<Utc>, accuracy: Option<f64>) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            timestamp,
            accuracy,
        }
    }

    pub fn coordinate(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

// ============================================================================
// Port
// ============================================================================

/// Append-only storage for exploration data.
///
/// Scans return rows in insertion order. There are no updates or single-row
/// deletes; history is only removed by the bulk clears.
pub trait VisitStore: Send {
    fn append_visit(&mut self, row: &VisitRow) -> Result<()>;
    fn append_point(&mut self, point: &RawLocationPoint) -> Result<()>;
    fn scan_visits(&self) -> Result<Vec<VisitRow>>;
    fn scan_points(&self) -> Result<Vec<RawLocationPoint>>;
    fn clear_visits(&mut self) -> Result<()>;
    fn clear_points(&mut self) -> Result<()>;
    fn load_origin(&self) -> Result<Option<GpsPoint>>;
    fn save_origin(&mut self, origin: &GpsPoint) -> Result<()>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryTables {
    visits: Vec<VisitRow>,
    points: Vec<RawLocationPoint>,
    origin: Option<GpsPoint>,
    fail_writes: bool,
    fail_reads: bool,
}

/// In-memory store. Clones share the same tables, so a test can keep one
/// clone to inspect what the writer thread stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (for exercising error paths).
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make every subsequent scan fail (for exercising error paths).
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn writable(&self) -> Result<MutexGuard<'_, MemoryTables>> {
        let tables = self.lock();
        if tables.fail_writes {
            return Err(TrackingError::write_failed("memory store rejected write"));
        }
        Ok(tables)
    }

    fn readable(&self) -> Result<MutexGuard<'_, MemoryTables>> {
        let tables = self.lock();
        if tables.fail_reads {
            return Err(TrackingError::read_failed("memory store rejected read"));
        }
        Ok(tables)
    }
}

impl VisitStore for MemoryStore {
    fn append_visit(&mut self, row: &VisitRow) -> Result<()> {
        self.writable()?.visits.push(*row);
        Ok(())
    }

    fn append_point(&mut self, point: &RawLocationPoint) -> Result<()> {
        self.writable()?.points.push(*point);
        Ok(())
    }

    fn scan_visits(&self) -> Result<Vec<VisitRow>> {
        Ok(self.readable()?.visits.clone())
    }

    fn scan_points(&self) -> Result<Vec<RawLocationPoint>> {
        Ok(self.readable()?.points.clone())
    }

    fn clear_visits(&mut self) -> Result<()> {
        self.writable()?.visits.clear();
        Ok(())
    }

    fn clear_points(&mut self) -> Result<()> {
        self.writable()?.points.clear();
        Ok(())
    }

    fn load_origin(&self) -> Result<Option<GpsPoint>> {
        Ok(self.readable()?.origin)
    }

    fn save_origin(&mut self, origin: &GpsPoint) -> Result<()> {
        self.writable()?.origin = Some(*origin);
        Ok(())
    }
}

// ============================================================================
// Background writer
// ============================================================================

enum WriteOp {
    Visit(VisitRow),
    Point(RawLocationPoint),
    Origin(GpsPoint),
    ClearVisits,
    ClearPoints,
    Flush(mpsc::Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct WriteCounters {
    written: AtomicU64,
    failed: AtomicU64,
}

/// Write outcome counters since the writer started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StorageStats {
    pub written: u64,
    pub failed: u64,
}

/// Cloneable sender side of a [`StorageWriter`].
///
/// Every method only enqueues. An `Err` means the writer thread is gone and
/// the operation was dropped; failures of the store itself surface later in
/// the logs and in [`StorageStats::failed`].
#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::Sender<WriteOp>,
    counters: Arc<WriteCounters>,
}

impl std::fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("stats", &self.stats())
            .finish()
    }
}

impl WriteHandle {
    fn submit(&self, op: WriteOp) -> Result<()> {
        self.sender.send(op).map_err(|_| {
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
            TrackingError::write_failed("storage writer has stopped")
        })
    }

    pub fn append_visit(&self, row: VisitRow) -> Result<()> {
        self.submit(WriteOp::Visit(row))
    }

    pub fn append_point(&self, point: RawLocationPoint) -> Result<()> {
        self.submit(WriteOp::Point(point))
    }

    pub fn save_origin(&self, origin: GpsPoint) -> Result<()> {
        self.submit(WriteOp::Origin(origin))
    }

    pub fn clear_visits(&self) -> Result<()> {
        self.submit(WriteOp::ClearVisits)
    }

    pub fn clear_points(&self) -> Result<()> {
        self.submit(WriteOp::ClearPoints)
    }

    /// Block until every operation queued before this call has been applied.
    /// Returns `false` if the writer thread is gone.
    pub fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.sender.send(WriteOp::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv().is_ok()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            written: self.counters.written.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }
}

/// Owns the store on a dedicated thread and applies queued writes in order.
///
/// Dropping the writer drains everything queued so far before the thread
/// exits, so stopping a session does not lose recorded visits.
pub struct StorageWriter {
    handle: WriteHandle,
    worker: Option<thread::JoinHandle<()>>,
}

impl StorageWriter {
    pub fn spawn(mut store: Box<dyn VisitStore>) -> Self {
        let (sender, receiver) = mpsc::channel::<WriteOp>();
        let counters = Arc::new(WriteCounters::default());
        let thread_counters = Arc::clone(&counters);

        let worker = thread::spawn(move || {
            for op in receiver {
                let outcome = match op {
                    WriteOp::Shutdown => break,
                    WriteOp::Flush(ack) => {
                        ack.send(()).ok();
                        continue;
                    }
                    WriteOp::Visit(row) => store.append_visit(&row),
                    WriteOp::Point(point) => store.append_point(&point),
                    WriteOp::Origin(origin) => store.save_origin(&origin),
                    WriteOp::ClearVisits => store.clear_visits(),
                    WriteOp::ClearPoints => store.clear_points(),
                };
                match outcome {
                    Ok(()) => {
                        thread_counters.written.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        thread_counters.failed.fetch_add(1, Ordering::SeqCst);
                        log::warn!("[StorageWriter] {}", e);
                    }
                }
            }
            log::debug!("[StorageWriter] Stopped");
        });

        Self {
            handle: WriteHandle { sender, counters },
            worker: Some(worker),
        }
    }

    pub fn handle(&self) -> WriteHandle {
        self.handle.clone()
    }

    pub fn flush(&self) -> bool {
        self.handle.flush()
    }

    pub fn stats(&self) -> StorageStats {
        self.handle.stats()
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        // Other handles may outlive the writer, so stop explicitly rather
        // than waiting for every sender to disconnect.
        self.handle.sender.send(WriteOp::Shutdown).ok();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("[StorageWriter] Writer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(x: i32, second: u32) -> VisitRow {
        VisitRow {
            cell: GridCell::new(x, 0),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 11, 8, 0, second).unwrap(),
        }
    }

    #[test]
    fn test_memory_store_append_scan_clear() {
        let mut store = MemoryStore::new();
        store.append_visit(&row(1, 0)).unwrap();
        store.append_visit(&row(2, 1)).unwrap();
        let point = RawLocationPoint::new(GpsPoint::new(1.0, 2.0), row(0, 2).timestamp, None);
        store.append_point(&point).unwrap();

        assert_eq!(store.scan_visits().unwrap(), vec![row(1, 0), row(2, 1)]);
        assert_eq!(store.scan_points().unwrap(), vec![point]);

        store.clear_points().unwrap();
        assert!(store.scan_points().unwrap().is_empty());
        assert_eq!(store.scan_visits().unwrap().len(), 2);
    }

    #[test]
    fn test_memory_store_failures() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.append_visit(&row(1, 0)),
            Err(TrackingError::PersistenceWriteFailed { .. })
        ));
        store.set_fail_reads(true);
        assert!(matches!(
            store.scan_visits(),
            Err(TrackingError::PersistenceReadFailed { .. })
        ));
    }

    #[test]
    fn test_writer_applies_in_order() {
        let store = MemoryStore::new();
        let writer = StorageWriter::spawn(Box::new(store.clone()));
        let handle = writer.handle();
        for i in 0..10 {
            handle.append_visit(row(i, i as u32)).unwrap();
        }
        handle.clear_visits().unwrap();
        handle.append_visit(row(42, 0)).unwrap();
        assert!(writer.flush());

        assert_eq!(store.scan_visits().unwrap(), vec![row(42, 0)]);
        assert_eq!(writer.stats(), StorageStats { written: 12, failed: 0 });
    }

    #[test]
    fn test_writer_counts_failures() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let writer = StorageWriter::spawn(Box::new(store.clone()));
        writer.handle().append_visit(row(1, 0)).unwrap();
        writer.handle().save_origin(GpsPoint::new(0.0, 0.0)).unwrap();
        writer.flush();
        assert_eq!(writer.stats().failed, 2);

        store.set_fail_writes(false);
        writer.handle().append_visit(row(2, 0)).unwrap();
        writer.flush();
        assert_eq!(writer.stats().written, 1);
        assert_eq!(store.scan_visits().unwrap(), vec![row(2, 0)]);
    }

    #[test]
    fn test_drop_drains_queue() {
        let store = MemoryStore::new();
        let handle = {
            let writer = StorageWriter::spawn(Box::new(store.clone()));
            let handle = writer.handle();
            for i in 0..100 {
                handle.append_visit(row(i, 0)).unwrap();
            }
            handle
        };
        assert_eq!(store.scan_visits().unwrap().len(), 100);
        assert!(handle.append_visit(row(0, 0)).is_err());
        assert!(!handle.flush());
    }
}
