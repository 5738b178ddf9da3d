//! Counting sort backends for dense key ranges.

use super::comparison::comparison_sort;
use super::parallel::{parallel_bucket_scatter, parallel_key_range, worker_count};
use super::radix::parallel_radix_sort;
use super::{Direction, KeyRange, bucket_offsets};
use crate::model::Item;

/// Largest key range (max - min + 1) the counting backends allocate buckets for.
pub const COUNTING_RANGE_LIMIT: u64 = 1_000_000;

/// Ceiling for the combined size of all per-worker histograms.
const PARALLEL_HISTOGRAM_LIMIT: u64 = 1 << 24;

/// Counting sort; ranges above [`COUNTING_RANGE_LIMIT`] use the comparison sort.
pub(crate) fn counting_sort(items: &mut Vec<Item>, direction: Direction) {
    let Some(range) = KeyRange::of(items) else {
        return;
    };
    if range.span() > COUNTING_RANGE_LIMIT {
        comparison_sort(items, direction);
        return;
    }
    if range.span() == 1 {
        return;
    }

    let mut counts = vec![0usize; range.span() as usize];
    for item in items.iter() {
        counts[(item.length - range.min) as usize] += 1;
    }

    let mut offsets = bucket_offsets(&counts, direction);
    let mut sorted = items.clone();
    for item in items.iter() {
        let bucket = (item.length - range.min) as usize;
        sorted[offsets[bucket]] = *item;
        offsets[bucket] += 1;
    }
    *items = sorted;
}

/// Counting sort with per-worker histograms and a parallel scatter.
///
/// Small inputs run [`counting_sort`]; key ranges whose histograms would
/// not fit [`PARALLEL_HISTOGRAM_LIMIT`] run the parallel radix sort.
pub(crate) fn parallel_counting_sort(items: &mut Vec<Item>, direction: Direction, threads: usize) {
    let workers = worker_count(items.len(), threads);
    if workers <= 1 {
        counting_sort(items, direction);
        return;
    }

    let Some(range) = parallel_key_range(items, workers) else {
        return;
    };
    let span = range.span();
    if span > COUNTING_RANGE_LIMIT || span * workers as u64 > PARALLEL_HISTOGRAM_LIMIT {
        parallel_radix_sort(items, direction, threads);
        return;
    }
    if span == 1 {
        return;
    }

    let min = range.min;
    *items = parallel_bucket_scatter(
        items,
        span as usize,
        |item| (item.length - min) as usize,
        direction,
        workers,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::test_support::random_items;

    fn lengths(items: &[Item]) -> Vec<u32> {
        items.iter().map(|i| i.length).collect()
    }

    #[test]
    fn counting_sort_with_offset_range() {
        let mut items = random_items(200, 50, 4);
        for item in &mut items {
            item.length += 1_000_000;
        }
        counting_sort(&mut items, Direction::Ascending);
        assert!(lengths(&items).windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn counting_sort_wide_range_falls_back() {
        let mut items = random_items(100, 10, 8);
        items[0].length = 0;
        items[1].length = u32::MAX;
        counting_sort(&mut items, Direction::Descending);
        assert_eq!(items[0].length, u32::MAX);
        assert!(lengths(&items).windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn parallel_counting_uniform_keys_untouched() {
        let mut items = random_items(10_000, 1, 2);
        let before = items.clone();
        parallel_counting_sort(&mut items, Direction::Descending, 4);
        assert_eq!(items, before);
    }
}
