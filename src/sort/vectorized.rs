//! Lane-unrolled kernels for the vectorized radix backend.
//!
//! The loops are written over fixed-size chunks with independent
//! accumulators so the compiler can keep them in vector registers. No
//! intrinsics; results are identical to the scalar kernels.

use super::radix::{BUCKETS, digit};
use crate::model::Item;

const MAX_LANES: usize = 8;
const HISTOGRAM_LANES: usize = 4;

/// Largest length in `items`, 0 when empty.
pub(crate) fn max_length(items: &[Item]) -> u32 {
    let mut lanes = [0u32; MAX_LANES];
    let chunks = items.chunks_exact(MAX_LANES);
    let tail = chunks.remainder();

    for chunk in chunks {
        for (lane, item) in lanes.iter_mut().zip(chunk) {
            *lane = (*lane).max(item.length);
        }
    }

    let head = lanes.into_iter().max().unwrap_or(0);
    tail.iter().map(|item| item.length).fold(head, u32::max)
}

/// Digit histogram built from four interleaved partial histograms.
///
/// Consecutive items land in different tables, which avoids the
/// store-to-load stall when neighbouring keys share a digit.
pub(crate) fn histogram(items: &[Item], shift: u32) -> [usize; BUCKETS] {
    let mut tables = [[0usize; BUCKETS]; HISTOGRAM_LANES];
    let chunks = items.chunks_exact(HISTOGRAM_LANES);
    let tail = chunks.remainder();

    for chunk in chunks {
        for (table, item) in tables.iter_mut().zip(chunk) {
            table[digit(item.length, shift)] += 1;
        }
    }
    for item in tail {
        tables[0][digit(item.length, shift)] += 1;
    }

    let mut counts = [0usize; BUCKETS];
    for table in &tables {
        for (total, partial) in counts.iter_mut().zip(table) {
            *total += partial;
        }
    }
    counts
}
