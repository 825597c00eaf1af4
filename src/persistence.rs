//! # SQLite Storage
//!
//! [`VisitStore`] backed by SQLite.
//!
//! Three tables, all append-only in normal operation:
//! - `cell_visits`: one row per recorded visit (`x`, `y`, `timestamp_ms`)
//! - `location_points`: one row per raw fix (`latitude`, `longitude`,
//!   `timestamp_ms`, optional `accuracy`)
//! - `session_origin`: at most one row, the persisted grid origin
//!
//! Scans return rows in insertion order (`ORDER BY id`).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use crate::error::{Result, TrackingError};
use crate::storage::{RawLocationPoint, VisitRow, VisitStore};
use crate::{GpsPoint, GridCell};

pub struct SqliteStore {
    db: Connection,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) a store at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path).map_err(TrackingError::read_failed)?;
        Self::init_schema(&db).map_err(TrackingError::read_failed)?;
        log::info!("[SqliteStore] Opened {}", db_path);
        Ok(Self {
            db,
            db_path: db_path.to_string(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn init_schema(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            r#"
            -- Every recorded cell visit
            CREATE TABLE IF NOT EXISTS cell_visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL
            );

            -- Raw fixes for hull reconstruction
            CREATE TABLE IF NOT EXISTS location_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                accuracy REAL
            );

            -- Grid origin shared by sessions
            CREATE TABLE IF NOT EXISTS session_origin (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cell_visits_timestamp ON cell_visits(timestamp_ms);
        "#,
        )
    }

    /// Number of stored visit rows.
    pub fn visit_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM cell_visits")
    }

    /// Number of stored raw points.
    pub fn point_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM location_points")
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let count: i64 = self
            .db
            .query_row(sql, [], |row| row.get(0))
            .map_err(TrackingError::read_failed)?;
        Ok(count.max(0) as u64)
    }

    fn query_visits(&self) -> SqlResult<Vec<VisitRow>> {
        let mut stmt = self
            .db
            .prepare("SELECT x, y, timestamp_ms FROM cell_visits ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(VisitRow {
                    cell: GridCell::new(row.get(0)?, row.get(1)?),
                    timestamp: from_millis(2, row.get(2)?)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_points(&self) -> SqlResult<Vec<RawLocationPoint>> {
        let mut stmt = self.db.prepare(
            "SELECT latitude, longitude, timestamp_ms, accuracy FROM location_points ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawLocationPoint {
                    latitude: row.get(0)?,
                    longitude: row.get(1)?,
                    timestamp: from_millis(2, row.get(2)?)?,
                    accuracy: row.get(3)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(rows)
    }
}

fn from_millis(column: usize, ms: i64) -> SqlResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
}

impl VisitStore for SqliteStore {
    fn append_visit(&mut self, row: &VisitRow) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO cell_visits (x, y, timestamp_ms) VALUES (?, ?, ?)",
                params![row.cell.x, row.cell.y, row.timestamp.timestamp_millis()],
            )
            .map_err(TrackingError::write_failed)?;
        Ok(())
    }

    fn append_point(&mut self, point: &RawLocationPoint) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO location_points (latitude, longitude, timestamp_ms, accuracy)
                 VALUES (?, ?, ?, ?)",
                params![
                    point.latitude,
                    point.longitude,
                    point.timestamp.timestamp_millis(),
                    point.accuracy
                ],
            )
            .map_err(TrackingError::write_failed)?;
        Ok(())
    }

    fn scan_visits(&self) -> Result<Vec<VisitRow>> {
        self.query_visits().map_err(TrackingError::read_failed)
    }

    fn scan_points(&self) -> Result<Vec<RawLocationPoint>> {
        self.query_points().map_err(TrackingError::read_failed)
    }

    fn clear_visits(&mut self) -> Result<()> {
        self.db
            .execute("DELETE FROM cell_visits", [])
            .map_err(TrackingError::write_failed)?;
        log::info!("[SqliteStore] Cleared visits");
        Ok(())
    }

    fn clear_points(&mut self) -> Result<()> {
        self.db
            .execute("DELETE FROM location_points", [])
            .map_err(TrackingError::write_failed)?;
        log::info!("[SqliteStore] Cleared location points");
        Ok(())
    }

    fn load_origin(&self) -> Result<Option<GpsPoint>> {
        self.db
            .query_row(
                "SELECT latitude, longitude FROM session_origin WHERE id = 1",
                [],
                |row| Ok(GpsPoint::new(row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(TrackingError::read_failed)
    }

    fn save_origin(&mut self, origin: &GpsPoint) -> Result<()> {
        self.db
            .execute(
                "INSERT OR REPLACE INTO session_origin (id, latitude, longitude) VALUES (1, ?, ?)",
                params![origin.latitude, origin.longitude],
            )
            .map_err(TrackingError::write_failed)?;
        Ok(())
    }
}
