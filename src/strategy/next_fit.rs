//! Next fit and the sequential pass shared by the chunked strategies.

use tracing::debug;

use super::{PackOutcome, PackStrategy, StrategyKind, UnplacedItem, UnplacedReason, abandon};
use crate::model::{Item, Pack};
use crate::types::{PackCounter, PackLimits, SafetyLimits};

/// Runs next fit over `items`.
///
/// Only the most recent pack is ever filled. A pack is handed to `emit`
/// as soon as it is replaced by a fresh one (and once more at the end for
/// the last pack), so it can be collected or published while the pass
/// continues.
///
/// # Parameters
/// * `items` - Items in placement order
/// * `limits` - Clamped pack limits
/// * `safety` - Iteration and pack-count bounds for this pass
/// * `counter` - Source of pack numbers
/// * `emit` - Receives every finished, non-empty pack in creation order
///
/// # Returns
/// The abandoned quantities.
pub(crate) fn next_fit_pass<'a, I, F>(
    items: I,
    limits: &PackLimits,
    safety: &SafetyLimits,
    counter: &PackCounter,
    mut emit: F,
) -> Vec<UnplacedItem>
where
    I: IntoIterator<Item = &'a Item>,
    F: FnMut(Pack),
{
    let mut unplaced = Vec::new();
    let mut current: Option<Pack> = None;
    let mut opened = 0usize;

    for item in items {
        if item.quantity == 0 {
            continue;
        }
        if !limits.admits_piece(item.weight) {
            abandon(&mut unplaced, item, item.quantity, UnplacedReason::TooHeavy);
            continue;
        }

        let mut remaining = item.quantity;
        let mut iterations = 0usize;
        while remaining > 0 {
            iterations += 1;
            if iterations > safety.max_item_iterations {
                abandon(
                    &mut unplaced,
                    item,
                    remaining,
                    UnplacedReason::IterationLimitReached,
                );
                break;
            }

            if let Some(pack) = current.as_mut() {
                let placed = pack.add_partial(item, remaining, limits);
                if placed > 0 {
                    remaining -= placed;
                    continue;
                }
            }

            if opened >= safety.max_packs {
                abandon(&mut unplaced, item, remaining, UnplacedReason::PackLimitReached);
                break;
            }

            let mut fresh = Pack::new(counter.next());
            opened += 1;
            let placed = fresh.add_partial(item, remaining, limits);
            if let Some(full) = current.replace(fresh).filter(|pack| !pack.is_empty()) {
                emit(full);
            }
            if placed == 0 {
                debug_assert!(false, "fresh pack refused item {}", item.id);
                abandon(&mut unplaced, item, remaining, UnplacedReason::Stalled);
                break;
            }
            remaining -= placed;
        }
    }

    if let Some(last) = current.filter(|pack| !pack.is_empty()) {
        emit(last);
    }
    unplaced
}

/// Sequential next fit on the caller's thread.
pub(crate) fn sequential_next_fit(
    items: &[Item],
    limits: &PackLimits,
    safety: &SafetyLimits,
) -> PackOutcome {
    let counter = PackCounter::default();
    let mut packs = Vec::new();
    let unplaced = next_fit_pass(items, limits, safety, &counter, |pack| packs.push(pack));
    PackOutcome { packs, unplaced }
}

/// Next fit: fills the current pack and opens a new one when it refuses a piece.
#[derive(Clone, Debug, Default)]
pub struct NextFitStrategy {
    safety: SafetyLimits,
}

impl NextFitStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_safety(mut self, safety: SafetyLimits) -> Self {
        self.safety = safety.sanitized();
        self
    }
}

impl PackStrategy for NextFitStrategy {
    fn name(&self) -> String {
        StrategyKind::NextFit.display_name().to_string()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::NextFit
    }

    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome {
        debug!(items = items.len(), "Running next fit");
        sequential_next_fit(items, &limits, &self.safety)
    }
}
