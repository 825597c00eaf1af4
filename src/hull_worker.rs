//! # Background Hull Worker
//!
//! Keeps hull recomputation off the event path for long sessions.
//!
//! The controller forwards each new raw point; the worker thread drains
//! whatever has queued up since its last pass and folds the whole batch into
//! its current hull with [`extend_hull`], then posts the result. Bursts of
//! fixes therefore cost one recomputation, and each pass touches only the
//! hull vertices plus the batch.
//!
//! Every job carries a generation. `reset` bumps it (after a history clear,
//! or when seeding from replayed points) and results from older generations
//! are discarded on both sides.

use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use crate::hull::{compute_hull, extend_hull};
use crate::GpsPoint;

enum HullJob {
    Reset {
        generation: u64,
        seed: Vec<GpsPoint>,
        seed_count: usize,
    },
    Extend {
        generation: u64,
        points: Vec<GpsPoint>,
    },
    Shutdown,
}

/// Hull posted by the worker after a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct HullUpdate {
    pub generation: u64,
    pub vertices: Vec<GpsPoint>,
    /// Raw points represented by `vertices` in this generation
    pub points_folded: usize,
}

pub struct HullWorker {
    sender: mpsc::Sender<HullJob>,
    results: mpsc::Receiver<HullUpdate>,
    worker: Option<thread::JoinHandle<()>>,
    generation: u64,
}

impl HullWorker {
    pub fn spawn() -> Self {
        let (sender, jobs) = mpsc::channel::<HullJob>();
        let (result_tx, results) = mpsc::channel::<HullUpdate>();

        let worker = thread::spawn(move || {
            let mut generation = 0u64;
            let mut hull: Vec<GpsPoint> = Vec::new();
            let mut folded = 0usize;

            while let Ok(first) = jobs.recv() {
                let mut batch: Vec<GpsPoint> = Vec::new();
                let mut changed = false;
                let mut stop = false;

                for job in std::iter::once(first).chain(jobs.try_iter()) {
                    match job {
                        HullJob::Reset {
                            generation: next,
                            seed,
                            seed_count,
                        } => {
                            generation = next;
                            hull = compute_hull(&seed);
                            folded = seed_count;
                            batch.clear();
                            changed = true;
                        }
                        HullJob::Extend {
                            generation: job_generation,
                            points,
                        } => {
                            if job_generation == generation {
                                folded += points.len();
                                batch.extend(points);
                                changed = true;
                            }
                        }
                        HullJob::Shutdown => {
                            stop = true;
                            break;
                        }
                    }
                }

                if stop {
                    break;
                }
                if !changed {
                    continue;
                }
                if !batch.is_empty() {
                    hull = extend_hull(&hull, &batch);
                }

                let update = HullUpdate {
                    generation,
                    vertices: hull.clone(),
                    points_folded: folded,
                };
                if result_tx.send(update).is_err() {
                    break;
                }
            }
            log::debug!("[HullWorker] Stopped");
        });

        Self {
            sender,
            results,
            worker: Some(worker),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new generation from `seed`.
    ///
    /// `seed` may be raw points or the vertices of a hull over them;
    /// `seed_count` is how many raw points it stands for.
    pub fn reset(&mut self, seed: Vec<GpsPoint>, seed_count: usize) {
        self.generation += 1;
        let job = HullJob::Reset {
            generation: self.generation,
            seed,
            seed_count,
        };
        if self.sender.send(job).is_err() {
            log::warn!("[HullWorker] Worker thread is gone, reset dropped");
        }
    }

    /// Queue raw points for the current generation.
    pub fn submit(&self, points: Vec<GpsPoint>) {
        let job = HullJob::Extend {
            generation: self.generation,
            points,
        };
        if self.sender.send(job).is_err() {
            log::warn!("[HullWorker] Worker thread is gone, points dropped");
        }
    }

    /// Newest finished hull of the current generation, without blocking.
    pub fn try_latest(&self) -> Option<HullUpdate> {
        self.results
            .try_iter()
            .filter(|update| update.generation == self.generation)
            .last()
    }

    /// Next finished hull of the current generation, waiting until `deadline`.
    pub fn recv_until(&self, deadline: Instant) -> Option<HullUpdate> {
        loop {
            let timeout = deadline.checked_duration_since(Instant::now())?;
            match self.results.recv_timeout(timeout) {
                Ok(update) if update.generation == self.generation => return Some(update),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for HullWorker {
    fn drop(&mut self) {
        self.sender.send(HullJob::Shutdown).ok();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("[HullWorker] Worker thread panicked");
            }
        }
    }
}
