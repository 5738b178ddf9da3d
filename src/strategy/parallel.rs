//! Chunked parallel next fit.

use std::thread;

use parking_lot::Mutex;
use tracing::debug;

use super::next_fit::{next_fit_pass, sequential_next_fit};
use super::{PARALLEL_THRESHOLD, PackOutcome, PackStrategy, StrategyKind, UnplacedItem, renumber};
use crate::model::{Item, Pack};
use crate::sort::chunk_ranges;
use crate::types::{MAX_THREADS, PackCounter, PackLimits, SafetyLimits};

/// Splits the input into one contiguous chunk per worker and runs next fit
/// on each chunk.
///
/// Packs never mix items from two chunks. The merged result is ordered by
/// chunk and renumbered, so the output only depends on the input and the
/// thread count.
#[derive(Clone, Debug)]
pub struct ParallelChunkedStrategy {
    threads: usize,
    parallel_threshold: usize,
    safety: SafetyLimits,
}

impl ParallelChunkedStrategy {
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

    pub fn threads(&self) -> usize {
        self.threads
    }
}

struct ChunkResult {
    chunk: usize,
    packs: Vec<Pack>,
    unplaced: Vec<UnplacedItem>,
}

impl PackStrategy for ParallelChunkedStrategy {
    fn name(&self) -> String {
        format!("Parallel Chunked ({} threads)", self.threads)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ParallelChunked
    }

    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome {
        if self.threads <= 1 || items.len() < self.parallel_threshold.max(2) {
            debug!(items = items.len(), "Input below parallel threshold, running next fit");
            return sequential_next_fit(items, &limits, &self.safety);
        }

        let ranges = chunk_ranges(items.len(), self.threads);
        debug!(items = items.len(), workers = ranges.len(), "Running chunked next fit");

        let counter = PackCounter::default();
        let results: Mutex<Vec<ChunkResult>> = Mutex::new(Vec::with_capacity(ranges.len()));
        thread::scope(|s| {
            for (chunk, range) in ranges.into_iter().enumerate() {
                let counter = &counter;
                let results = &results;
                let safety = &self.safety;
                let limits = &limits;
                s.spawn(move || {
                    let mut packs = Vec::new();
                    let unplaced =
                        next_fit_pass(&items[range], limits, safety, counter, |pack| {
                            packs.push(pack)
                        });
                    results.lock().push(ChunkResult {
                        chunk,
                        packs,
                        unplaced,
                    });
                });
            }
        });

        let mut results = results.into_inner();
        results.sort_by_key(|result| result.chunk);

        let mut outcome = PackOutcome::default();
        for result in results {
            outcome.packs.extend(result.packs);
            outcome.unplaced.extend(result.unplaced);
        }
        outcome.packs = renumber(outcome.packs);
        outcome
    }
}
