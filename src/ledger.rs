//! # Visit Ledger
//!
//! Append-only record of cell visits plus the derived set of explored cells.
//!
//! Recording is idempotent for the explored set but never for history: each
//! call appends a timestamp to the cell's sequence, including repeats within
//! the same instant. The explored set always equals the keys of the history.
//!
//! When a [`WriteHandle`] is attached, each recorded visit is also queued for
//! durable storage. A queueing failure is logged and does not roll back the
//! in-memory record, which stays authoritative for the running session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::storage::{VisitRow, WriteHandle};
use crate::GridCell;

#[derive(Debug, Default)]
pub struct VisitLedger {
    /// Shared with published snapshots; cloned on write only while a
    /// snapshot still holds the previous set.
    explored: Arc<HashSet<GridCell>>,
    history: HashMap<GridCell, Vec<DateTime<Utc>>>,
    visit_count: usize,
    writer: Option<WriteHandle>,
}

impl VisitLedger {
    /// An empty ledger without durable storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted rows, in scan order, then attach the
    /// writer for new visits. Replayed rows are not written again.
    pub fn replay(rows: impl IntoIterator<Item = VisitRow>, writer: Option<WriteHandle>) -> Self {
        let mut ledger = Self::new();
        for row in rows {
            ledger.insert(row.cell, row.timestamp);
        }
        ledger.writer = writer;
        ledger
    }

    /// Record a visit. Returns `true` when the cell was not explored before.
    pub fn record(&mut self, cell: GridCell, timestamp: DateTime<Utc>) -> bool {
        let newly_explored = self.insert(cell, timestamp);

        if let Some(writer) = &self.writer {
            if let Err(e) = writer.append_visit(VisitRow { cell, timestamp }) {
                log::warn!("[VisitLedger] Visit {} kept in memory only: {}", cell.id(), e);
            }
        }

        newly_explored
    }

    fn insert(&mut self, cell: GridCell, timestamp: DateTime<Utc>) -> bool {
        self.visit_count += 1;
        self.history.entry(cell).or_default().push(timestamp);
        if self.explored.contains(&cell) {
            false
        } else {
            Arc::make_mut(&mut self.explored).insert(cell);
            true
        }
    }

    pub fn is_explored(&self, cell: &GridCell) -> bool {
        self.explored.contains(cell)
    }

    /// Most recently recorded timestamp for a cell.
    pub fn last_visit(&self, cell: &GridCell) -> Option<DateTime<Utc>> {
        self.history.get(cell).and_then(|visits| visits.last().copied())
    }

    /// Visit timestamps of one cell, in recording order.
    pub fn visits(&self, cell: &GridCell) -> &[DateTime<Utc>] {
        self.history.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every explored cell with its visit timestamps, in recording order.
    pub fn all_visits(&self) -> impl Iterator<Item = (&GridCell, &[DateTime<Utc>])> {
        self.history
            .iter()
            .map(|(cell, visits)| (cell, visits.as_slice()))
    }

    /// Shared handle to the explored set, for snapshots.
    pub fn explored_cells(&self) -> Arc<HashSet<GridCell>> {
        Arc::clone(&self.explored)
    }

    pub fn explored_count(&self) -> usize {
        self.explored.len()
    }

    /// Total number of recorded visits across all cells.
    pub fn visit_count(&self) -> usize {
        self.visit_count
    }

    /// Forget all visits in memory. Callers clear storage separately.
    pub fn clear(&mut self) {
        self.explored = Arc::new(HashSet::new());
        self.history.clear();
        self.visit_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageWriter, VisitStore};
    use chrono::{Duration, TimeZone};

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_record_scenario() {
        let a = GridCell::new(0, 0);
        let b = GridCell::new(1, 0);
        let mut ledger = VisitLedger::new();

        assert!(ledger.record(a, t(1)));
        assert!(!ledger.record(a, t(2)));
        assert!(ledger.record(b, t(3)));

        assert_eq!(ledger.explored_count(), 2);
        assert!(ledger.is_explored(&a));
        assert!(ledger.is_explored(&b));
        assert_eq!(ledger.visits(&a), &[t(1), t(2)]);
        assert_eq!(ledger.visits(&b), &[t(3)]);
        assert_eq!(ledger.visit_count(), 3);
    }

    #[test]
    fn test_same_instant_appends_twice() {
        let cell = GridCell::new(4, -2);
        let mut ledger = VisitLedger::new();
        ledger.record(cell, t(5));
        let before = ledger.explored_count();
        ledger.record(cell, t(5));
        ledger.record(cell, t(5));
        assert_eq!(ledger.explored_count(), before);
        assert_eq!(ledger.visits(&cell).len(), 3);
    }

    #[test]
    fn test_explored_matches_history_keys() {
        let mut ledger = VisitLedger::new();
        for i in 0..20 {
            ledger.record(GridCell::new(i % 7, i % 3), t(0) + Duration::seconds(i as i64));
        }
        let keys: HashSet<GridCell> = ledger.all_visits().map(|(cell, _)| *cell).collect();
        assert_eq!(keys, *ledger.explored_cells());
    }

    #[test]
    fn test_last_visit() {
        let cell = GridCell::new(1, 1);
        let mut ledger = VisitLedger::new();
        assert_eq!(ledger.last_visit(&cell), None);
        ledger.record(cell, t(1));
        ledger.record(cell, t(9));
        assert_eq!(ledger.last_visit(&cell), Some(t(9)));
        assert!(!ledger.is_explored(&GridCell::new(9, 9)));
    }

    #[test]
    fn test_snapshot_set_is_not_mutated() {
        let mut ledger = VisitLedger::new();
        ledger.record(GridCell::new(0, 0), t(1));
        let published = ledger.explored_cells();
        ledger.record(GridCell::new(0, 1), t(2));
        assert_eq!(published.len(), 1);
        assert_eq!(ledger.explored_count(), 2);
    }

    #[test]
    fn test_replay_then_record_persists_only_new() {
        let store = MemoryStore::new();
        let rows = vec![
            VisitRow { cell: GridCell::new(0, 0), timestamp: t(1) },
            VisitRow { cell: GridCell::new(0, 0), timestamp: t(2) },
        ];
        let writer = StorageWriter::spawn(Box::new(store.clone()));
        let mut ledger = VisitLedger::replay(rows, Some(writer.handle()));
        assert_eq!(ledger.visits(&GridCell::new(0, 0)).len(), 2);

        ledger.record(GridCell::new(2, 2), t(3));
        writer.flush();

        let stored = store.scan_visits().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].cell, GridCell::new(2, 2));
    }

    #[test]
    fn test_clear() {
        let mut ledger = VisitLedger::new();
        ledger.record(GridCell::new(0, 0), t(1));
        ledger.clear();
        assert_eq!(ledger.explored_count(), 0);
        assert_eq!(ledger.visit_count(), 0);
        assert_eq!(ledger.all_visits().count(), 0);
    }
}
