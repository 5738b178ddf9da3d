//! Scaffolding shared by the parallel radix and counting backends.
//!
//! The input is split into one contiguous chunk per worker. Workers count
//! their chunk into a private histogram, the histograms are merged into
//! per-worker write offsets for every bucket, and each worker then scatters
//! its chunk into the positions reserved for it. Worker `w` owns the slots
//! of bucket `b` that precede those of worker `w + 1`, so the scatter is
//! stable.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ScopedJoinHandle};

use super::{Direction, KeyRange};
use crate::model::Item;

/// Below this many items per worker a parallel backend is not worth its threads.
pub(crate) const MIN_ITEMS_PER_WORKER: usize = 1_024;

/// Number of workers worth spawning for `len` items, at most `threads`.
pub(crate) fn worker_count(len: usize, threads: usize) -> usize {
    threads.min(len / MIN_ITEMS_PER_WORKER).max(1)
}

/// Splits `len` elements into at most `workers` contiguous, non-empty ranges.
///
/// The first `len % workers` ranges receive one extra element.
pub(crate) fn chunk_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, len.max(1));
    let base = len / workers;
    let remainder = len % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let size = base + usize::from(w < remainder);
        if size == 0 {
            continue;
        }
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Joins a scoped worker, re-raising its panic on the calling thread.
pub(crate) fn join_worker<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// Key range of `items`, computed with one worker per chunk.
pub(crate) fn parallel_key_range(items: &[Item], workers: usize) -> Option<KeyRange> {
    let ranges = chunk_ranges(items.len(), workers);
    thread::scope(|s| {
        let handles: Vec<_> = ranges
            .into_iter()
            .map(|range| s.spawn(move || KeyRange::of(&items[range])))
            .collect();
        handles
            .into_iter()
            .filter_map(join_worker)
            .reduce(KeyRange::merge)
    })
}

/// Stable parallel distribution of `items` into `buckets` buckets.
///
/// # Parameters
/// * `items` - Input sequence
/// * `buckets` - Number of buckets produced by `bucket_of`
/// * `bucket_of` - Bucket index of an item, must be `< buckets`
/// * `direction` - Ascending emits bucket 0 first, descending the last bucket first
/// * `workers` - Number of worker threads
///
/// # Returns
/// The items grouped by bucket, input order preserved within a bucket.
pub(crate) fn parallel_bucket_scatter<F>(
    items: &[Item],
    buckets: usize,
    bucket_of: F,
    direction: Direction,
    workers: usize,
) -> Vec<Item>
where
    F: Fn(&Item) -> usize + Sync,
{
    let ranges = chunk_ranges(items.len(), workers);
    let bucket_of = &bucket_of;

    // Counting phase.
    let histograms: Vec<Vec<usize>> = thread::scope(|s| {
        let handles: Vec<_> = ranges
            .iter()
            .cloned()
            .map(|range| {
                s.spawn(move || {
                    let mut counts = vec![0usize; buckets];
                    for item in &items[range] {
                        counts[bucket_of(item)] += 1;
                    }
                    counts
                })
            })
            .collect();
        handles
            .into_iter()
            .map(join_worker)
            .collect()
    });

    // Merge into per-worker offsets.
    let mut offsets = vec![vec![0usize; buckets]; histograms.len()];
    let mut running = 0usize;
    let mut visit = |bucket: usize| {
        for (worker, counts) in histograms.iter().enumerate() {
            offsets[worker][bucket] = running;
            running += counts[bucket];
        }
    };
    match direction {
        Direction::Ascending => (0..buckets).for_each(&mut visit),
        Direction::Descending => (0..buckets).rev().for_each(&mut visit),
    }

    // Scatter phase: slot `p` receives the source index of the item at output position `p`.
    let slots: Vec<AtomicUsize> = (0..items.len()).map(|_| AtomicUsize::new(0)).collect();
    let slots_ref = &slots;
    thread::scope(|s| {
        for (range, mut positions) in ranges.into_iter().zip(offsets) {
            s.spawn(move || {
                for index in range {
                    let bucket = bucket_of(&items[index]);
                    slots_ref[positions[bucket]].store(index, Ordering::Relaxed);
                    positions[bucket] += 1;
                }
            });
        }
    });

    slots
        .iter()
        .map(|slot| items[slot.load(Ordering::Relaxed)])
        .collect()
}
