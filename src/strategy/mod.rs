//! Packing strategies.
//!
//! Every strategy turns an (optionally sorted) item stream into packs under
//! the same contract:
//! - limits are clamped through [`PackLimits::new`]
//! - items without pieces are skipped
//! - items whose single piece exceeds the weight limit are reported as
//!   [`UnplacedReason::TooHeavy`] before any pack is opened for them
//! - [`SafetyLimits`] bound the work per item and the packs per worker;
//!   tripping a bound abandons the rest of the item and reports it
//!
//! No strategy emits an empty pack. Output packs are numbered `1..=K`.

mod best_fit;
mod first_fit;
mod lockfree;
mod next_fit;
mod parallel;
mod parallel_best_fit;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::model::{Item, Pack};
use crate::types::{PackLimits, SafetyLimits, hardware_threads};

pub use best_fit::BestFitStrategy;
pub use first_fit::FirstFitStrategy;
pub use lockfree::LockFreeStrategy;
pub use next_fit::NextFitStrategy;
pub use parallel::ParallelChunkedStrategy;
pub use parallel_best_fit::ParallelBestFitStrategy;

/// Inputs below this many items are packed sequentially by the parallel strategies.
pub const PARALLEL_THRESHOLD: usize = 5_000;

/// Why (part of) an item ended up outside every pack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    /// A single piece is heavier than the pack weight limit.
    TooHeavy,
    /// The worker reached `SafetyLimits::max_packs`.
    PackLimitReached,
    /// The item used up `SafetyLimits::max_item_iterations`.
    IterationLimitReached,
    /// A fresh pack refused a piece that passed the weight check.
    Stalled,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::TooHeavy => "too_heavy",
            UnplacedReason::PackLimitReached => "pack_limit_reached",
            UnplacedReason::IterationLimitReached => "iteration_limit_reached",
            UnplacedReason::Stalled => "stalled",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::TooHeavy => write!(f, "Piece exceeds the maximum pack weight"),
            UnplacedReason::PackLimitReached => write!(f, "Maximum number of packs reached"),
            UnplacedReason::IterationLimitReached => {
                write!(f, "Placement iteration limit reached")
            }
            UnplacedReason::Stalled => write!(f, "Empty pack could not take a single piece"),
        }
    }
}

/// Quantity of an item that was not placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UnplacedItem {
    pub id: i64,
    pub quantity: u32,
    pub reason: UnplacedReason,
}

/// Packs plus everything that could not be placed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackOutcome {
    pub packs: Vec<Pack>,
    pub unplaced: Vec<UnplacedItem>,
}

impl PackOutcome {
    /// Returns `true` when every piece was placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Pieces placed across all packs.
    pub fn placed_quantity(&self) -> u64 {
        self.packs
            .iter()
            .map(|pack| u64::from(pack.total_items()))
            .sum()
    }

    /// Pieces left out, across all reasons.
    pub fn unplaced_quantity(&self) -> u64 {
        self.unplaced
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }
}

/// A packing algorithm.
pub trait PackStrategy: Send + Sync {
    /// Human readable name, including the thread count for parallel strategies.
    fn name(&self) -> String;

    fn kind(&self) -> StrategyKind;

    /// Packs `items` and reports what could not be placed.
    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome;

    /// Packs `items` under raw limits, which are clamped first.
    ///
    /// Unplaced quantities are dropped; use [`PackStrategy::pack_with_report`]
    /// to see them.
    fn pack(&self, items: &[Item], max_items: i64, max_weight: f64) -> Vec<Pack> {
        self.pack_with_report(items, PackLimits::new(max_items, max_weight))
            .packs
    }
}

/// Records an abandoned remainder.
pub(crate) fn abandon(
    unplaced: &mut Vec<UnplacedItem>,
    item: &Item,
    quantity: u32,
    reason: UnplacedReason,
) {
    match reason {
        UnplacedReason::TooHeavy => debug!(
            id = item.id,
            weight = item.weight,
            quantity,
            "Item heavier than a pack, dropping"
        ),
        _ => warn!(
            id = item.id,
            quantity,
            reason = reason.code(),
            "Abandoning rest of item: {reason}"
        ),
    }
    unplaced.push(UnplacedItem {
        id: item.id,
        quantity,
        reason,
    });
}

/// Renumbers packs `1..=K` in their current order.
pub(crate) fn renumber(packs: Vec<Pack>) -> Vec<Pack> {
    packs
        .into_iter()
        .enumerate()
        .map(|(index, pack)| pack.renumbered(index + 1))
        .collect()
}

/// Available packing strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Blocking first fit; only ever fills the most recent pack.
    FirstFit,
    /// Next fit; never revisits a closed pack.
    #[default]
    NextFit,
    /// Best fit over a min-heap of open packs.
    BestFit,
    /// Next fit over contiguous chunks, one per worker.
    ParallelChunked,
    /// Best fit per worker over batches pulled from a shared cursor.
    ParallelBestFit,
    /// Chunked next fit merged through a lock-free queue.
    LockFree,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::FirstFit,
        StrategyKind::NextFit,
        StrategyKind::BestFit,
        StrategyKind::ParallelChunked,
        StrategyKind::ParallelBestFit,
        StrategyKind::LockFree,
    ];

    /// Parses a strategy name; `None` for unknown names.
    pub fn try_parse(raw: &str) -> Option<Self> {
        let kind = match raw.trim().to_ascii_lowercase().as_str() {
            "first_fit" | "first-fit" | "firstfit" | "blocking" | "ff" => StrategyKind::FirstFit,
            "next_fit" | "next-fit" | "nextfit" | "nf" => StrategyKind::NextFit,
            "best_fit" | "best-fit" | "bestfit" | "bf" => StrategyKind::BestFit,
            "parallel" | "parallel_chunked" | "parallel-chunked" | "chunked" => {
                StrategyKind::ParallelChunked
            }
            "parallel_best_fit" | "parallel-best-fit" | "work_stealing" | "work-stealing" => {
                StrategyKind::ParallelBestFit
            }
            "lockfree" | "lock_free" | "lock-free" => StrategyKind::LockFree,
            _ => return None,
        };
        Some(kind)
    }

    /// Parses a strategy name, case-insensitively; unknown names select next fit.
    pub fn parse(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or(StrategyKind::NextFit)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::FirstFit => "Blocking First Fit",
            StrategyKind::NextFit => "Next Fit",
            StrategyKind::BestFit => "Best Fit",
            StrategyKind::ParallelChunked => "Parallel Chunked",
            StrategyKind::ParallelBestFit => "Parallel Best Fit",
            StrategyKind::LockFree => "Lock-Free",
        }
    }

    /// Serialized identifier, as accepted by [`StrategyKind::parse`].
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::FirstFit => "first_fit",
            StrategyKind::NextFit => "next_fit",
            StrategyKind::BestFit => "best_fit",
            StrategyKind::ParallelChunked => "parallel_chunked",
            StrategyKind::ParallelBestFit => "parallel_best_fit",
            StrategyKind::LockFree => "lock_free",
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(
            self,
            StrategyKind::ParallelChunked | StrategyKind::ParallelBestFit | StrategyKind::LockFree
        )
    }

    /// 1 for sequential kinds, the hardware thread count for parallel ones.
    pub fn default_threads(&self) -> usize {
        if self.is_parallel() {
            hardware_threads()
        } else {
            1
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Builds a strategy with the default safety limits.
pub fn create_strategy(kind: StrategyKind, threads: usize) -> Box<dyn PackStrategy> {
    create_strategy_with_limits(kind, threads, SafetyLimits::default())
}

/// Builds a strategy; `threads` is ignored by sequential kinds.
pub fn create_strategy_with_limits(
    kind: StrategyKind,
    threads: usize,
    safety: SafetyLimits,
) -> Box<dyn PackStrategy> {
    let safety = safety.sanitized();
    match kind {
        StrategyKind::FirstFit => Box::new(FirstFitStrategy::new().with_safety(safety)),
        StrategyKind::NextFit => Box::new(NextFitStrategy::new().with_safety(safety)),
        StrategyKind::BestFit => Box::new(BestFitStrategy::new().with_safety(safety)),
        StrategyKind::ParallelChunked => {
            Box::new(ParallelChunkedStrategy::new(threads).with_safety(safety))
        }
        StrategyKind::ParallelBestFit => {
            Box::new(ParallelBestFitStrategy::new(threads).with_safety(safety))
        }
        StrategyKind::LockFree => Box::new(LockFreeStrategy::new(threads).with_safety(safety)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use super::*;
    use crate::types::WEIGHT_EPSILON;

    pub fn item(id: i64, length: u32, quantity: u32, weight: f64) -> Item {
        Item {
            id,
            length,
            quantity,
            weight,
        }
    }

    /// Every strategy, parallel ones forced onto their parallel path.
    pub fn all_strategies(threads: usize) -> Vec<Box<dyn PackStrategy>> {
        vec![
            Box::new(FirstFitStrategy::new()),
            Box::new(NextFitStrategy::new()),
            Box::new(BestFitStrategy::new()),
            Box::new(ParallelChunkedStrategy::new(threads).with_parallel_threshold(1)),
            Box::new(ParallelBestFitStrategy::new(threads).with_parallel_threshold(1)),
            Box::new(LockFreeStrategy::new(threads).with_parallel_threshold(1)),
        ]
    }

    /// Checks capacity, totals, numbering and per-id conservation.
    pub fn assert_valid_outcome(items: &[Item], limits: PackLimits, outcome: &PackOutcome) {
        let mut placed: HashMap<i64, u64> = HashMap::new();
        for (index, pack) in outcome.packs.iter().enumerate() {
            assert_eq!(pack.number(), index + 1, "packs must be numbered 1..=K");
            assert!(!pack.is_empty(), "empty pack {}", pack.number());
            assert!(pack.total_items() <= limits.max_items);
            assert!(pack.total_weight() <= limits.max_weight + WEIGHT_EPSILON);

            let fragments: u32 = pack.items().iter().map(|i| i.quantity).sum();
            assert_eq!(fragments, pack.total_items());
            for fragment in pack.items() {
                *placed.entry(fragment.id).or_default() += u64::from(fragment.quantity);
            }
        }
        for missing in &outcome.unplaced {
            *placed.entry(missing.id).or_default() += u64::from(missing.quantity);
        }

        let mut expected: HashMap<i64, u64> = HashMap::new();
        for item in items.iter().filter(|item| item.quantity > 0) {
            *expected.entry(item.id).or_default() += u64::from(item.quantity);
        }
        assert_eq!(placed, expected, "placed plus unplaced must equal input");
    }
}
