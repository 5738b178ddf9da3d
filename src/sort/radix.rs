//! LSD radix backends over the 32-bit length key.

use super::parallel::{parallel_bucket_scatter, parallel_key_range, worker_count};
use super::{Direction, bucket_offsets, vectorized};
use crate::model::Item;

const RADIX_BITS: u32 = 8;
pub(super) const BUCKETS: usize = 1 << RADIX_BITS;
const DIGIT_MASK: u32 = (BUCKETS - 1) as u32;

/// Digit of `length` for the pass starting at bit `shift`.
#[inline]
pub(super) fn digit(length: u32, shift: u32) -> usize {
    ((length >> shift) & DIGIT_MASK) as usize
}

/// Number of 8-bit passes needed to cover every bit of `max_key`.
fn passes_for(max_key: u32) -> u32 {
    let bits = u32::BITS - max_key.leading_zeros();
    bits.div_ceil(RADIX_BITS)
}

fn histogram(items: &[Item], shift: u32) -> [usize; BUCKETS] {
    let mut counts = [0usize; BUCKETS];
    for item in items {
        counts[digit(item.length, shift)] += 1;
    }
    counts
}

/// Runs the LSD passes with the given max key and histogram routine.
///
/// A pass whose digits are all equal would leave the order untouched and
/// is skipped.
fn lsd_sort<H>(items: &mut Vec<Item>, direction: Direction, max_key: u32, histogram: H)
where
    H: Fn(&[Item], u32) -> [usize; BUCKETS],
{
    if items.len() < 2 {
        return;
    }

    let mut scratch = items.clone();
    for pass in 0..passes_for(max_key) {
        let shift = pass * RADIX_BITS;
        let counts = histogram(items, shift);
        if counts.contains(&items.len()) {
            continue;
        }

        let mut offsets = bucket_offsets(&counts, direction);
        for item in items.iter() {
            let bucket = digit(item.length, shift);
            scratch[offsets[bucket]] = *item;
            offsets[bucket] += 1;
        }
        std::mem::swap(items, &mut scratch);
    }
}

pub(crate) fn radix_sort(items: &mut Vec<Item>, direction: Direction) {
    let max_key = items.iter().map(|item| item.length).max().unwrap_or(0);
    lsd_sort(items, direction, max_key, histogram);
}

/// Same passes as [`radix_sort`], with lane-unrolled max finding and
/// interleaved histograms.
pub(crate) fn vectorized_radix_sort(items: &mut Vec<Item>, direction: Direction) {
    let max_key = vectorized::max_length(items);
    lsd_sort(items, direction, max_key, vectorized::histogram);
}

/// LSD radix where every pass is a parallel stable scatter.
pub(crate) fn parallel_radix_sort(items: &mut Vec<Item>, direction: Direction, threads: usize) {
    let workers = worker_count(items.len(), threads);
    if workers <= 1 {
        radix_sort(items, direction);
        return;
    }

    let Some(range) = parallel_key_range(items, workers) else {
        return;
    };
    for pass in 0..passes_for(range.max) {
        let shift = pass * RADIX_BITS;
        if (range.min >> shift) == (range.max >> shift) {
            // Every key shares this digit and all higher ones.
            break;
        }
        *items = parallel_bucket_scatter(
            items,
            BUCKETS,
            |item| digit(item.length, shift),
            direction,
            workers,
        );
    }
}
