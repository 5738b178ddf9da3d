//! Best fit over a min-heap of open packs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use super::{PackOutcome, PackStrategy, StrategyKind, UnplacedItem, UnplacedReason, abandon};
use crate::model::{Item, Pack};
use crate::types::{PackCounter, PackLimits, SafetyLimits};

/// Heap entry for a pack that can still take pieces.
#[derive(Clone, Copy, Debug)]
struct OpenPack {
    index: usize,
    remaining_weight: f64,
    remaining_items: u32,
}

impl OpenPack {
    /// Entry for `pack`, or `None` once it has no room left.
    fn of(index: usize, pack: &Pack, limits: &PackLimits) -> Option<Self> {
        let remaining_items = pack.remaining_items(limits);
        let remaining_weight = pack.remaining_weight(limits);
        (remaining_items > 0 && remaining_weight > limits.closing_threshold()).then_some(Self {
            index,
            remaining_weight,
            remaining_items,
        })
    }
}

// Reversed so the std max-heap pops the tightest pack first: least
// remaining weight, then fewest free slots, then the oldest pack.
impl Ord for OpenPack {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .remaining_weight
            .total_cmp(&self.remaining_weight)
            .then_with(|| other.remaining_items.cmp(&self.remaining_items))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenPack {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenPack {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenPack {}

/// Best-fit state owned by one thread.
///
/// Packs are kept in creation order; the heap indexes into them.
pub(crate) struct BestFitWorker<'a> {
    limits: PackLimits,
    safety: SafetyLimits,
    counter: &'a PackCounter,
    packs: Vec<Pack>,
    open: BinaryHeap<OpenPack>,
    rejected: Vec<OpenPack>,
    unplaced: Vec<UnplacedItem>,
}

impl<'a> BestFitWorker<'a> {
    pub(crate) fn new(limits: PackLimits, safety: SafetyLimits, counter: &'a PackCounter) -> Self {
        Self {
            limits,
            safety,
            counter,
            packs: Vec::new(),
            open: BinaryHeap::new(),
            rejected: Vec::new(),
            unplaced: Vec::new(),
        }
    }

    /// Places every piece of `item`, or records why the rest was dropped.
    pub(crate) fn place(&mut self, item: &Item) {
        if item.quantity == 0 {
            return;
        }
        if !self.limits.admits_piece(item.weight) {
            abandon(&mut self.unplaced, item, item.quantity, UnplacedReason::TooHeavy);
            return;
        }

        let mut remaining = item.quantity;
        let mut iterations = 0usize;
        while remaining > 0 {
            iterations += 1;
            if iterations > self.safety.max_item_iterations {
                abandon(
                    &mut self.unplaced,
                    item,
                    remaining,
                    UnplacedReason::IterationLimitReached,
                );
                return;
            }

            let placed = self.place_in_open_pack(item, remaining);
            if placed > 0 {
                remaining -= placed;
                continue;
            }

            if self.packs.len() >= self.safety.max_packs {
                abandon(
                    &mut self.unplaced,
                    item,
                    remaining,
                    UnplacedReason::PackLimitReached,
                );
                return;
            }

            let mut fresh = Pack::new(self.counter.next());
            let placed = fresh.add_partial(item, remaining, &self.limits);
            if placed == 0 {
                debug_assert!(false, "fresh pack refused item {}", item.id);
                abandon(&mut self.unplaced, item, remaining, UnplacedReason::Stalled);
                return;
            }
            remaining -= placed;

            let index = self.packs.len();
            if let Some(entry) = OpenPack::of(index, &fresh, &self.limits) {
                self.open.push(entry);
            }
            self.packs.push(fresh);
        }
    }

    /// Fills the tightest open pack that takes at least one piece.
    fn place_in_open_pack(&mut self, item: &Item, remaining: u32) -> u32 {
        let mut placed = 0;
        while let Some(entry) = self.open.pop() {
            let pack = &mut self.packs[entry.index];
            placed = pack.add_partial(item, remaining, &self.limits);
            if placed > 0 {
                if let Some(updated) = OpenPack::of(entry.index, pack, &self.limits) {
                    self.open.push(updated);
                }
                break;
            }
            self.rejected.push(entry);
        }
        self.open.extend(self.rejected.drain(..));
        placed
    }

    /// Packs in creation order and the abandoned quantities.
    pub(crate) fn finish(self) -> (Vec<Pack>, Vec<UnplacedItem>) {
        (self.packs, self.unplaced)
    }
}

/// Best fit: each piece goes to the open pack with the least remaining weight
/// that still takes it.
#[derive(Clone, Debug, Default)]
pub struct BestFitStrategy {
    safety: SafetyLimits,
}

impl BestFitStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_safety(mut self, safety: SafetyLimits) -> Self {
        self.safety = safety.sanitized();
        self
    }
}

/// Sequential best fit on the caller's thread.
pub(crate) fn sequential_best_fit(
    items: &[Item],
    limits: PackLimits,
    safety: SafetyLimits,
) -> PackOutcome {
    let counter = PackCounter::default();
    let mut worker = BestFitWorker::new(limits, safety, &counter);
    for item in items {
        worker.place(item);
    }
    let (packs, unplaced) = worker.finish();
    PackOutcome { packs, unplaced }
}

impl PackStrategy for BestFitStrategy {
    fn name(&self) -> String {
        StrategyKind::BestFit.display_name().to_string()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::BestFit
    }

    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome {
        debug!(items = items.len(), "Running best fit");
        sequential_best_fit(items, limits, self.safety)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::NextFitStrategy;
    use crate::strategy::test_support::{assert_valid_outcome, item};
    use crate::sort::test_support::random_items;
    use pretty_assertions::assert_eq;

    #[test]
    fn heap_pops_tightest_pack_first() {
        let mut heap = BinaryHeap::new();
        for (index, remaining_weight, remaining_items) in
            [(0, 9.0, 3), (1, 2.0, 5), (2, 2.0, 1), (3, 2.0, 1)]
        {
            heap.push(OpenPack {
                index,
                remaining_weight,
                remaining_items,
            });
        }
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|e| e.index)).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn revisits_older_pack_with_room() {
        // Next fit would open a third pack for the 1.0 piece.
        let items = vec![item(1, 10, 1, 8.0), item(2, 10, 1, 5.0), item(3, 10, 1, 2.0)];
        let limits = PackLimits::new(10, 10.0);
        let outcome = BestFitStrategy::new().pack_with_report(&items, limits);

        assert_valid_outcome(&items, limits, &outcome);
        let ids: Vec<Vec<i64>> = outcome
            .packs
            .iter()
            .map(|p| p.items().iter().map(|i| i.id).collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 3], vec![2]]);
    }

    #[test]
    fn closed_packs_leave_the_heap() {
        let items = vec![item(1, 10, 4, 2.5), item(2, 10, 1, 0.0)];
        let limits = PackLimits::new(10, 10.0);
        let outcome = BestFitStrategy::new().pack_with_report(&items, limits);

        assert_valid_outcome(&items, limits, &outcome);
        // Pack 1 is full by weight, so the weightless piece opens pack 2.
        assert_eq!(outcome.pack_count(), 2);
    }

    #[test]
    fn fills_gaps_next_fit_leaves_behind() {
        let items = vec![
            item(1, 10, 1, 6.0),
            item(2, 10, 1, 6.0),
            item(3, 10, 1, 4.0),
            item(4, 10, 1, 4.0),
        ];
        let limits = PackLimits::new(10, 10.0);
        let best = BestFitStrategy::new().pack_with_report(&items, limits);
        let next = NextFitStrategy::new().pack_with_report(&items, limits);

        assert_eq!(best.pack_count(), 2);
        assert_eq!(next.pack_count(), 3);
    }

    #[test]
    fn weightless_items_share_packs_under_tiny_weight_limit() {
        let items: Vec<Item> = (1..=20).map(|id| item(id, 10, 1, 0.0)).collect();
        let limits = PackLimits::new(10, 0.0005);

        let best = BestFitStrategy::new().pack_with_report(&items, limits);
        let next = NextFitStrategy::new().pack_with_report(&items, limits);

        assert_valid_outcome(&items, limits, &best);
        assert_eq!(best.pack_count(), 2);
        assert_eq!(best.pack_count(), next.pack_count());
    }

    #[test]
    fn random_input_is_conserved() {
        let items = random_items(2_000, 500, 77);
        let limits = PackLimits::new(20, 45.0);
        let outcome = BestFitStrategy::new().pack_with_report(&items, limits);
        assert_valid_outcome(&items, limits, &outcome);
        assert!(outcome.is_complete());
    }
}
