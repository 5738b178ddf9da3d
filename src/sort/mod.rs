//! Sort stage: reorders items by length before packing.
//!
//! Every backend orders by `length` only and is stable, so items with equal
//! lengths keep their input order and re-sorting a sorted sequence is a
//! no-op. Backends differ only in speed:
//! - `Insertion` / `Comparison` for small inputs
//! - `Radix` (8-bit LSD passes) and `Counting` (dense key ranges)
//! - `ParallelRadix` / `ParallelCounting` for large inputs
//! - `VectorizedRadix`, a lane-unrolled `Radix`
//! - `ParallelComparison`, a rayon merge sort

mod comparison;
mod counting;
mod parallel;
mod radix;
mod vectorized;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::model::Item;
use crate::types::{MAX_THREADS, SortOrder};

pub use counting::COUNTING_RANGE_LIMIT;
pub(crate) use parallel::chunk_ranges;

/// Inputs up to this size are insertion sorted.
pub const INSERTION_THRESHOLD: usize = 32;
/// Inputs below this size use the comparison sort.
pub const COMPARISON_THRESHOLD: usize = 1_000;
/// Inputs from this size on use a parallel backend when threads allow.
pub const PARALLEL_SORT_THRESHOLD: usize = 100_000;

/// Direction of a length sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn from_order(order: SortOrder) -> Option<Self> {
        match order {
            SortOrder::Natural => None,
            SortOrder::ShortToLong => Some(Direction::Ascending),
            SortOrder::LongToShort => Some(Direction::Descending),
        }
    }
}

/// Sort algorithm used by the sort stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortBackend {
    /// Pick a backend from input size, key range and thread count.
    #[default]
    Auto,
    Insertion,
    Comparison,
    ParallelComparison,
    Radix,
    VectorizedRadix,
    Counting,
    ParallelRadix,
    ParallelCounting,
}

impl SortBackend {
    /// All concrete backends (everything except `Auto`).
    pub const CONCRETE: [SortBackend; 8] = [
        SortBackend::Insertion,
        SortBackend::Comparison,
        SortBackend::ParallelComparison,
        SortBackend::Radix,
        SortBackend::VectorizedRadix,
        SortBackend::Counting,
        SortBackend::ParallelRadix,
        SortBackend::ParallelCounting,
    ];

    /// Parses a backend name, case-insensitively. `-` and `_` are interchangeable.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let backend = match normalized.as_str() {
            "auto" => SortBackend::Auto,
            "insertion" => SortBackend::Insertion,
            "comparison" | "std" => SortBackend::Comparison,
            "parallel_comparison" | "parallel_merge" => SortBackend::ParallelComparison,
            "radix" => SortBackend::Radix,
            "vectorized_radix" | "simd_radix" | "simd" => SortBackend::VectorizedRadix,
            "counting" => SortBackend::Counting,
            "parallel_radix" => SortBackend::ParallelRadix,
            "parallel_counting" => SortBackend::ParallelCounting,
            _ => return None,
        };
        Some(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SortBackend::Auto => "auto",
            SortBackend::Insertion => "insertion",
            SortBackend::Comparison => "comparison",
            SortBackend::ParallelComparison => "parallel_comparison",
            SortBackend::Radix => "radix",
            SortBackend::VectorizedRadix => "vectorized_radix",
            SortBackend::Counting => "counting",
            SortBackend::ParallelRadix => "parallel_radix",
            SortBackend::ParallelCounting => "parallel_counting",
        }
    }
}

impl fmt::Display for SortBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive range of lengths in a slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct KeyRange {
    pub min: u32,
    pub max: u32,
}

impl KeyRange {
    pub fn of(items: &[Item]) -> Option<Self> {
        items.iter().fold(None, |range, item| {
            Some(match range {
                None => KeyRange {
                    min: item.length,
                    max: item.length,
                },
                Some(r) => r.merge(KeyRange {
                    min: item.length,
                    max: item.length,
                }),
            })
        })
    }

    pub fn merge(self, other: KeyRange) -> KeyRange {
        KeyRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Number of distinct values the range can hold.
    pub fn span(&self) -> u64 {
        u64::from(self.max - self.min) + 1
    }
}

/// Start position of every bucket in the output for the given counts.
///
/// Descending order lays the buckets out from the last to the first, which
/// keeps a single scatter stable in both directions.
pub(crate) fn bucket_offsets(counts: &[usize], direction: Direction) -> Vec<usize> {
    let mut offsets = vec![0usize; counts.len()];
    let mut running = 0usize;
    let mut visit = |bucket: usize| {
        offsets[bucket] = running;
        running += counts[bucket];
    };
    match direction {
        Direction::Ascending => (0..counts.len()).for_each(&mut visit),
        Direction::Descending => (0..counts.len()).rev().for_each(&mut visit),
    }
    offsets
}

/// Chooses the backend `Auto` resolves to.
pub fn select_backend(items: &[Item], threads: usize) -> SortBackend {
    let n = items.len();
    if n <= INSERTION_THRESHOLD {
        return SortBackend::Insertion;
    }
    if n < COMPARISON_THRESHOLD {
        return SortBackend::Comparison;
    }

    let dense = KeyRange::of(items)
        .map(|range| range.span() <= n as u64 && range.span() <= COUNTING_RANGE_LIMIT)
        .unwrap_or(false);

    match (n >= PARALLEL_SORT_THRESHOLD, threads > 1, dense) {
        (false, _, true) => SortBackend::Counting,
        (false, _, false) => SortBackend::Radix,
        (true, true, true) => SortBackend::ParallelCounting,
        (true, true, false) => SortBackend::ParallelRadix,
        (true, false, _) => SortBackend::VectorizedRadix,
    }
}

/// Sorts items by length in the requested order.
///
/// # Parameters
/// * `items` - Items to reorder in place
/// * `order` - Requested order; `Natural` leaves the items untouched
/// * `backend` - Algorithm to use; `Auto` selects one by input shape
/// * `threads` - Worker threads for parallel backends, clamped to `[1, 32]`
///
/// # Returns
/// The backend that ran, or `None` for `Natural` order.
pub fn sort_items(
    items: &mut Vec<Item>,
    order: SortOrder,
    backend: SortBackend,
    threads: usize,
) -> Option<SortBackend> {
    let direction = Direction::from_order(order)?;
    let threads = threads.clamp(1, MAX_THREADS);
    let backend = match backend {
        SortBackend::Auto => select_backend(items, threads),
        concrete => concrete,
    };

    debug!(
        backend = backend.name(),
        items = items.len(),
        threads,
        order = %order,
        "Sorting items"
    );

    match backend {
        SortBackend::Auto | SortBackend::Comparison => {
            comparison::comparison_sort(items, direction)
        }
        SortBackend::Insertion => comparison::insertion_sort(items, direction),
        SortBackend::ParallelComparison => {
            comparison::parallel_comparison_sort(items, direction, threads)
        }
        SortBackend::Radix => radix::radix_sort(items, direction),
        SortBackend::VectorizedRadix => radix::vectorized_radix_sort(items, direction),
        SortBackend::Counting => counting::counting_sort(items, direction),
        SortBackend::ParallelRadix => radix::parallel_radix_sort(items, direction, threads),
        SortBackend::ParallelCounting => {
            counting::parallel_counting_sort(items, direction, threads)
        }
    }

    Some(backend)
}


#[cfg(test)]
mod tests {
    use super::test_support::random_items;
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Reference result: std stable sort by length.
    fn reference(items: &[Item], order: SortOrder) -> Vec<Item> {
        let mut expected = items.to_vec();
        match order {
            SortOrder::Natural => {}
            SortOrder::ShortToLong => expected.sort_by_key(|i| i.length),
            SortOrder::LongToShort => expected.sort_by(|a, b| b.length.cmp(&a.length)),
        }
        expected
    }

    fn sorted_with(items: &[Item], order: SortOrder, backend: SortBackend) -> Vec<Item> {
        let mut sorted = items.to_vec();
        sort_items(&mut sorted, order, backend, 4);
        sorted
    }

    #[test]
    fn natural_order_is_identity() {
        let items = random_items(500, 1000, 7);
        for backend in SortBackend::CONCRETE {
            let mut sorted = items.clone();
            assert_eq!(sort_items(&mut sorted, SortOrder::Natural, backend, 4), None);
            assert_eq!(sorted, items);
        }
    }

    #[test]
    fn every_backend_matches_stable_reference() {
        let items = random_items(3_000, 5_000, 11);
        for order in [SortOrder::ShortToLong, SortOrder::LongToShort] {
            let expected = reference(&items, order);
            for backend in SortBackend::CONCRETE {
                assert_eq!(
                    sorted_with(&items, order, backend),
                    expected,
                    "backend {backend} with order {order}"
                );
            }
        }
    }

    #[test]
    fn large_keys_need_all_radix_passes() {
        let mut items = random_items(2_000, 1_000, 3);
        for (i, item) in items.iter_mut().enumerate() {
            item.length = u32::MAX - (i as u32).wrapping_mul(2_654_435_761) % 100_000_000;
        }
        let expected = reference(&items, SortOrder::ShortToLong);
        for backend in [
            SortBackend::Radix,
            SortBackend::VectorizedRadix,
            SortBackend::ParallelRadix,
            SortBackend::Counting,
            SortBackend::ParallelCounting,
        ] {
            assert_eq!(
                sorted_with(&items, SortOrder::ShortToLong, backend),
                expected,
                "backend {backend}"
            );
        }
    }

    #[test]
    fn resorting_sorted_sequence_is_noop() {
        let items = random_items(2_500, 50, 19);
        for order in [SortOrder::ShortToLong, SortOrder::LongToShort] {
            for backend in SortBackend::CONCRETE {
                let once = sorted_with(&items, order, backend);
                let twice = sorted_with(&once, order, backend);
                assert_eq!(twice, once, "backend {backend} with order {order}");
            }
        }
    }

    #[test]
    fn empty_and_single_inputs() {
        for backend in SortBackend::CONCRETE {
            let mut empty: Vec<Item> = Vec::new();
            sort_items(&mut empty, SortOrder::ShortToLong, backend, 4);
            assert!(empty.is_empty());

            let single = random_items(1, 10, 5);
            assert_eq!(sorted_with(&single, SortOrder::LongToShort, backend), single);
        }
    }

    #[test]
    fn auto_selection_by_size_and_range() {
        assert_eq!(select_backend(&random_items(10, 100, 1), 4), SortBackend::Insertion);
        assert_eq!(select_backend(&random_items(500, 100, 1), 4), SortBackend::Comparison);
        assert_eq!(select_backend(&random_items(5_000, 100, 1), 4), SortBackend::Counting);
        assert_eq!(
            select_backend(&random_items(5_000, 1_000_000, 1), 4),
            SortBackend::Radix
        );
        assert_eq!(
            select_backend(&random_items(100_000, 1_000, 1), 4),
            SortBackend::ParallelCounting
        );
        assert_eq!(
            select_backend(&random_items(100_000, 50_000_000, 1), 4),
            SortBackend::ParallelRadix
        );
        assert_eq!(
            select_backend(&random_items(100_000, 1_000, 1), 1),
            SortBackend::VectorizedRadix
        );
    }

    #[test]
    fn auto_reports_resolved_backend() {
        let mut items = random_items(10, 100, 2);
        assert_eq!(
            sort_items(&mut items, SortOrder::ShortToLong, SortBackend::Auto, 1),
            Some(SortBackend::Insertion)
        );
    }

    #[test]
    fn large_parallel_input_matches_reference() {
        let items = random_items(120_000, 10_000, 23);
        let expected = reference(&items, SortOrder::LongToShort);
        for backend in [
            SortBackend::ParallelRadix,
            SortBackend::ParallelCounting,
            SortBackend::ParallelComparison,
            SortBackend::Auto,
        ] {
            let mut sorted = items.clone();
            sort_items(&mut sorted, SortOrder::LongToShort, backend, 8);
            assert_eq!(sorted, expected, "backend {backend}");
        }
    }

    #[test]
    fn backend_parse_accepts_synonyms() {
        assert_eq!(SortBackend::parse("AUTO"), Some(SortBackend::Auto));
        assert_eq!(SortBackend::parse("parallel-radix"), Some(SortBackend::ParallelRadix));
        assert_eq!(SortBackend::parse("simd"), Some(SortBackend::VectorizedRadix));
        assert_eq!(SortBackend::parse("bogo"), None);
        for backend in SortBackend::CONCRETE {
            assert_eq!(SortBackend::parse(backend.name()), Some(backend));
        }
    }

    proptest! {
        #[test]
        fn prop_backends_agree_with_reference(
            lengths in prop::collection::vec(0u32..2_000, 0..300),
            descending in any::<bool>(),
        ) {
            let items: Vec<Item> = lengths
                .iter()
                .enumerate()
                .map(|(id, &length)| Item { id: id as i64, length, quantity: 1, weight: 1.0 })
                .collect();
            let order = if descending { SortOrder::LongToShort } else { SortOrder::ShortToLong };
            let expected = reference(&items, order);
            for backend in SortBackend::CONCRETE {
                prop_assert_eq!(sorted_with(&items, order, backend), expected.clone());
            }
        }
    }
}
