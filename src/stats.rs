//! # Daily Statistics
//!
//! Groups visits by calendar day and derives coarse daily figures.
//!
//! - **Cells discovered**: distinct cells visited that day
//! - **Distance**: each cell's earliest visit that day orders the cells; the
//!   great-circle distance between consecutive cell centers is summed
//! - **Steps**: `floor(distance / stride length)`
//! - **Calories**: `floor(distance * calories per meter)`
//!
//! Distance deliberately works at cell granularity (one cell is ~55m) while
//! the visited-area hull uses raw fixes. All figures are estimates.
//!
//! Day keys are `YYYY-MM-DD` in the aggregator's time zone (local by
//! default), so they sort chronologically as strings.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{OptionExt, Result, TrackingError};
use crate::geo_utils::haversine_distance;
use crate::grid::center_of;
use crate::ledger::VisitLedger;
use crate::{GpsPoint, GridCell, TrackingConfig};

pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

pub const METERS_PER_MILE: f64 = 1609.34;

/// Calendar date of `timestamp` in `tz`.
pub fn day_of<Tz: TimeZone>(timestamp: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    timestamp.with_timezone(tz).date_naive()
}

/// Day key (`YYYY-MM-DD`) of `timestamp` in `tz`.
pub fn day_key<Tz: TimeZone>(timestamp: &DateTime<Utc>, tz: &Tz) -> String {
    day_of(timestamp, tz).format(DAY_KEY_FORMAT).to_string()
}

/// Parse a day key back into a date.
pub fn parse_day_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).map_err(|e| TrackingError::ConfigError {
        message: format!("invalid day key '{}': {}", key, e),
    })
}

/// Statistics for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub day_key: String,
    pub cells_discovered: usize,
    pub distance_meters: f64,
    pub steps: u64,
    pub calories: u64,
}

/// Display units for distances. Never affects computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn format_distance(&self, meters: f64) -> String {
        match self {
            UnitSystem::Metric => format!("{:.2} meters", meters),
            UnitSystem::Imperial => format!("{:.2} miles", meters / METERS_PER_MILE),
        }
    }
}

/// Earliest visit of each cell, per day key.
type DayBuckets = BTreeMap<String, HashMap<GridCell, DateTime<Utc>>>;

/// Computes per-day statistics from a ledger on demand.
pub struct DayAggregator<'a, Tz: TimeZone = Local> {
    ledger: &'a VisitLedger,
    origin: Option<GpsPoint>,
    cell_size_degrees: f64,
    stride_length_meters: f64,
    calories_per_meter: f64,
    tz: Tz,
}

impl<'a> DayAggregator<'a, Local> {
    /// Aggregator using local calendar days.
    pub fn new(ledger: &'a VisitLedger, origin: Option<GpsPoint>, config: &TrackingConfig) -> Self {
        Self {
            ledger,
            origin,
            cell_size_degrees: config.cell_size_degrees,
            stride_length_meters: config.stride_length_meters,
            calories_per_meter: config.calories_per_meter,
            tz: Local,
        }
    }
}

impl<'a, Tz: TimeZone> DayAggregator<'a, Tz> {
    /// Same aggregator, with days cut in another time zone.
    pub fn with_timezone<Tz2: TimeZone>(self, tz: Tz2) -> DayAggregator<'a, Tz2> {
        DayAggregator {
            ledger: self.ledger,
            origin: self.origin,
            cell_size_degrees: self.cell_size_degrees,
            stride_length_meters: self.stride_length_meters,
            calories_per_meter: self.calories_per_meter,
            tz,
        }
    }

    fn buckets(&self) -> DayBuckets {
        let mut buckets = DayBuckets::new();
        for (cell, visits) in self.ledger.all_visits() {
            for ts in visits {
                let earliest = buckets
                    .entry(day_key(ts, &self.tz))
                    .or_default()
                    .entry(*cell)
                    .or_insert(*ts);
                if *ts < *earliest {
                    *earliest = *ts;
                }
            }
        }
        buckets
    }

    /// Earliest visit per cell on one date.
    fn cells_on(&self, date: NaiveDate) -> HashMap<GridCell, DateTime<Utc>> {
        let mut cells: HashMap<GridCell, DateTime<Utc>> = HashMap::new();
        for (cell, visits) in self.ledger.all_visits() {
            if let Some(first) = visits
                .iter()
                .filter(|ts| day_of(ts, &self.tz) == date)
                .min()
            {
                cells.insert(*cell, *first);
            }
        }
        cells
    }

    /// Every day with visits and its distinct cell count, ascending by key.
    pub fn all_days(&self) -> Vec<(String, usize)> {
        self.buckets()
            .into_iter()
            .map(|(key, cells)| (key, cells.len()))
            .collect()
    }

    /// Statistics for a calendar date. Days without visits yield zeros.
    ///
    /// Fails with `LocationUnavailable` when the day has two or more cells
    /// but no origin is known to place their centers.
    pub fn stats_for_day(&self, date: NaiveDate) -> Result<DayStats> {
        let key = date.format(DAY_KEY_FORMAT).to_string();
        self.build_stats(key, &self.cells_on(date))
    }

    /// Statistics for a `YYYY-MM-DD` key.
    pub fn stats_for_key(&self, key: &str) -> Result<DayStats> {
        self.stats_for_day(parse_day_key(key)?)
    }

    /// Statistics for every day with visits, ascending by key.
    #[cfg(not(feature = "parallel"))]
    pub fn all_day_stats(&self) -> Result<Vec<DayStats>> {
        self.buckets()
            .into_iter()
            .map(|(key, cells)| self.build_stats(key, &cells))
            .collect()
    }

    /// Statistics for every day with visits, ascending by key.
    #[cfg(feature = "parallel")]
    pub fn all_day_stats(&self) -> Result<Vec<DayStats>> {
        let days: Vec<(String, HashMap<GridCell, DateTime<Utc>>)> =
            self.buckets().into_iter().collect();
        let estimator = self.estimator();
        days.into_par_iter()
            .map(|(key, cells)| estimator.build(key, &cells))
            .collect()
    }

    fn estimator(&self) -> Estimator {
        Estimator {
            origin: self.origin,
            cell_size_degrees: self.cell_size_degrees,
            stride_length_meters: self.stride_length_meters,
            calories_per_meter: self.calories_per_meter,
        }
    }

    fn build_stats(&self, key: String, cells: &HashMap<GridCell, DateTime<Utc>>) -> Result<DayStats> {
        self.estimator().build(key, cells)
    }
}

/// Steps and calories for a walked distance, both rounded down.
pub fn estimate_activity(
    distance_meters: f64,
    stride_length_meters: f64,
    calories_per_meter: f64,
) -> (u64, u64) {
    let steps = (distance_meters / stride_length_meters).floor().max(0.0) as u64;
    let calories = (distance_meters * calories_per_meter).floor().max(0.0) as u64;
    (steps, calories)
}

/// The per-day arithmetic, detached from the ledger borrow so it can run on
/// worker threads.
#[derive(Debug, Clone, Copy)]
struct Estimator {
    origin: Option<GpsPoint>,
    cell_size_degrees: f64,
    stride_length_meters: f64,
    calories_per_meter: f64,
}

impl Estimator {
    fn build(&self, day_key: String, cells: &HashMap<GridCell, DateTime<Utc>>) -> Result<DayStats> {
        let distance_meters = self.distance(cells)?;
        let (steps, calories) =
            estimate_activity(distance_meters, self.stride_length_meters, self.calories_per_meter);
        Ok(DayStats {
            day_key,
            cells_discovered: cells.len(),
            distance_meters,
            steps,
            calories,
        })
    }

    fn distance(&self, cells: &HashMap<GridCell, DateTime<Utc>>) -> Result<f64> {
        if cells.len() < 2 {
            return Ok(0.0);
        }
        let origin = self.origin.ok_or_location_unavailable()?;

        let mut ordered: Vec<(&GridCell, &DateTime<Utc>)> = cells.iter().collect();
        ordered.sort_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)));

        let centers: Vec<GpsPoint> = ordered
            .iter()
            .map(|(cell, _)| center_of(cell, &origin, self.cell_size_degrees))
            .collect();

        Ok(centers
            .windows(2)
            .map(|pair| haversine_distance(&pair[0], &pair[1]))
            .sum())
    }
}
