//! Comparison-based backends.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::warn;

use super::Direction;
use crate::model::Item;

#[inline]
fn compare(a: &Item, b: &Item, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => a.length.cmp(&b.length),
        Direction::Descending => b.length.cmp(&a.length),
    }
}

/// Stable insertion sort; only moves an item past strictly out-of-order neighbours.
pub(crate) fn insertion_sort(items: &mut [Item], direction: Direction) {
    for i in 1..items.len() {
        let current = items[i];
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &current, direction) == Ordering::Greater {
            items[j] = items[j - 1];
            j -= 1;
        }
        items[j] = current;
    }
}

/// Standard library stable sort.
pub(crate) fn comparison_sort(items: &mut [Item], direction: Direction) {
    items.sort_by(|a, b| compare(a, b, direction));
}

/// Rayon parallel stable sort on a pool sized to `threads`.
pub(crate) fn parallel_comparison_sort(items: &mut [Item], direction: Direction, threads: usize) {
    if threads <= 1 || items.len() < 2 {
        comparison_sort(items, direction);
        return;
    }

    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| items.par_sort_by(|a, b| compare(a, b, direction))),
        Err(err) => {
            warn!("Could not build sort thread pool ({err}), sorting sequentially");
            comparison_sort(items, direction);
        }
    }
}
