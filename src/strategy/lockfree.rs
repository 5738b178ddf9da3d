//! Chunked next fit that publishes packs through a lock-free queue.

use std::thread;

use crossbeam::queue::SegQueue;
use tracing::debug;

use super::next_fit::{next_fit_pass, sequential_next_fit};
use super::{PARALLEL_THRESHOLD, PackOutcome, PackStrategy, StrategyKind, UnplacedItem, renumber};
use crate::model::{Item, Pack};
use crate::sort::chunk_ranges;
use crate::types::{MAX_THREADS, PackCounter, PackLimits, SafetyLimits};

/// Like [`super::ParallelChunkedStrategy`], but workers push each pack into a
/// [`SegQueue`] the moment it is closed instead of merging under a lock.
///
/// The drained packs are sorted by (chunk, creation number) and renumbered.
#[derive(Clone, Debug)]
pub struct LockFreeStrategy {
    threads: usize,
    parallel_threshold: usize,
    safety: SafetyLimits,
}

impl LockFreeStrategy {
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

impl PackStrategy for LockFreeStrategy {
    fn name(&self) -> String {
        format!("Lock-Free ({} threads)", self.threads)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LockFree
    }

    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome {
        if self.threads <= 1 || items.len() < self.parallel_threshold.max(2) {
            debug!(items = items.len(), "Input below parallel threshold, running next fit");
            return sequential_next_fit(items, &limits, &self.safety);
        }

        let ranges = chunk_ranges(items.len(), self.threads);
        debug!(items = items.len(), workers = ranges.len(), "Running lock-free next fit");

        let counter = PackCounter::default();
        let finished: SegQueue<(usize, Pack)> = SegQueue::new();
        let dropped: SegQueue<(usize, UnplacedItem)> = SegQueue::new();
        thread::scope(|s| {
            for (chunk, range) in ranges.into_iter().enumerate() {
                let counter = &counter;
                let finished = &finished;
                let dropped = &dropped;
                let safety = &self.safety;
                let limits = &limits;
                s.spawn(move || {
                    let unplaced =
                        next_fit_pass(&items[range], limits, safety, counter, |pack| {
                            finished.push((chunk, pack))
                        });
                    for item in unplaced {
                        dropped.push((chunk, item));
                    }
                });
            }
        });

        let mut packs: Vec<(usize, Pack)> = std::iter::from_fn(|| finished.pop()).collect();
        packs.sort_by_key(|(chunk, pack)| (*chunk, pack.number()));

        // Stable sort keeps the per-chunk order of the abandoned entries.
        let mut unplaced: Vec<(usize, UnplacedItem)> =
            std::iter::from_fn(|| dropped.pop()).collect();
        unplaced.sort_by_key(|(chunk, _)| *chunk);

        PackOutcome {
            packs: renumber(packs.into_iter().map(|(_, pack)| pack).collect()),
            unplaced: unplaced.into_iter().map(|(_, item)| item).collect(),
        }
    }
}
