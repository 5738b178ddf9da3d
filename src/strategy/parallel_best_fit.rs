//! Parallel best fit with batch work stealing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::debug;

use super::best_fit::{BestFitWorker, sequential_best_fit};
use super::{PARALLEL_THRESHOLD, PackOutcome, PackStrategy, StrategyKind, renumber};
use crate::model::Item;
use crate::types::{MAX_THREADS, PackCounter, PackLimits, SafetyLimits};

/// Items a worker claims from the shared cursor at once.
pub const BATCH_SIZE: usize = 100;

/// Workers claim batches from a shared cursor and run best fit over their
/// own packs.
///
/// Which batches a worker sees depends on scheduling, so pack contents may
/// differ between runs. Packs are ordered by creation and renumbered.
#[derive(Clone, Debug)]
pub struct ParallelBestFitStrategy {
    threads: usize,
    parallel_threshold: usize,
    safety: SafetyLimits,
}

impl ParallelBestFitStrategy {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.clamp(1, MAX_THREADS),
            parallel_threshold: PARALLEL_THRESHOLD,
            safety: SafetyLimits::default(),
        }
    }

    pub fn with_safety(mut self, safety: SafetyLimits) -> Self {
        self.safety = safety.sanitized();
        self
    }

    /// Minimum input size for spawning workers.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

impl PackStrategy for ParallelBestFitStrategy {
    fn name(&self) -> String {
        format!("Parallel Best Fit ({} threads)", self.threads)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ParallelBestFit
    }

    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome {
        if self.threads <= 1 || items.len() < self.parallel_threshold.max(2) {
            debug!(items = items.len(), "Input below parallel threshold, running best fit");
            return sequential_best_fit(items, limits, self.safety);
        }

        let workers = self.threads.min(items.len().div_ceil(BATCH_SIZE)).max(1);
        debug!(items = items.len(), workers, "Running parallel best fit");

        let cursor = AtomicUsize::new(0);
        let counter = PackCounter::default();
        let merged = Mutex::new(PackOutcome::default());
        thread::scope(|s| {
            for _ in 0..workers {
                let cursor = &cursor;
                let counter = &counter;
                let merged = &merged;
                let safety = self.safety;
                s.spawn(move || {
                    let mut worker = BestFitWorker::new(limits, safety, counter);
                    loop {
                        let start = cursor.fetch_add(BATCH_SIZE, Ordering::Relaxed);
                        if start >= items.len() {
                            break;
                        }
                        let end = (start + BATCH_SIZE).min(items.len());
                        for item in &items[start..end] {
                            worker.place(item);
                        }
                    }

                    let (packs, unplaced) = worker.finish();
                    let mut merged = merged.lock();
                    merged.packs.extend(packs);
                    merged.unplaced.extend(unplaced);
                });
            }
        });

        let mut outcome = merged.into_inner();
        outcome.packs.sort_by_key(|pack| pack.number());
        outcome.packs = renumber(outcome.packs);
        outcome
    }
}
