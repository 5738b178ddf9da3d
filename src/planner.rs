//! Planning pipeline: sanitize, sort, pack, summarize.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::model::{Item, Pack};
use crate::sort::{SortBackend, sort_items};
use crate::strategy::{
    PackStrategy, StrategyKind, UnplacedItem, create_strategy_with_limits,
};
use crate::types::{MAX_THREADS, PackLimits, SafetyLimits, SortOrder};

/// Settings for one planning run.
///
/// Values are taken as given and sanitized by the planner: zero threads
/// means the strategy's default, other counts are clamped to `[1, 32]`,
/// and the pack limits go through [`PackLimits::new`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlanConfig {
    pub sort_order: SortOrder,
    pub max_items_per_pack: i64,
    pub max_weight_per_pack: f64,
    pub strategy: StrategyKind,
    /// Worker threads for parallel strategies and sort backends.
    pub threads: usize,
    pub sort_backend: SortBackend,
    pub safety: SafetyLimits,
}

impl PlanConfig {
    pub const DEFAULT_MAX_ITEMS: i64 = 100;
    pub const DEFAULT_MAX_WEIGHT: f64 = 200.0;

    pub fn new(sort_order: SortOrder, max_items_per_pack: i64, max_weight_per_pack: f64) -> Self {
        Self {
            sort_order,
            max_items_per_pack,
            max_weight_per_pack,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self.threads = strategy.default_threads();
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_sort_backend(mut self, backend: SortBackend) -> Self {
        self.sort_backend = backend;
        self
    }

    pub fn with_safety(mut self, safety: SafetyLimits) -> Self {
        self.safety = safety;
        self
    }

    /// Clamped pack limits of this configuration.
    pub fn limits(&self) -> PackLimits {
        PackLimits::new(self.max_items_per_pack, self.max_weight_per_pack)
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::Natural,
            max_items_per_pack: Self::DEFAULT_MAX_ITEMS,
            max_weight_per_pack: Self::DEFAULT_MAX_WEIGHT,
            strategy: StrategyKind::default(),
            threads: 1,
            sort_backend: SortBackend::Auto,
            safety: SafetyLimits::default(),
        }
    }
}

/// Result of a planning run.
#[derive(Clone, Debug, Default)]
pub struct PlanResult {
    pub packs: Vec<Pack>,
    pub sort_duration: Duration,
    pub pack_duration: Duration,
    pub total_duration: Duration,
    /// Sum of the input quantities, whatever was placed.
    pub total_items: u64,
    /// Average weight fill of the non-empty packs, in `[0, 100]`.
    pub utilization_percent: f64,
    pub strategy_name: String,
    pub unplaced: Vec<UnplacedItem>,
    /// Backend the sort stage used; `None` for natural order.
    pub sort_backend: Option<SortBackend>,
}

impl PlanResult {
    pub fn non_empty_packs(&self) -> impl Iterator<Item = &Pack> {
        self.packs.iter().filter(|pack| !pack.is_empty())
    }

    pub fn pack_count(&self) -> usize {
        self.non_empty_packs().count()
    }

    pub fn unplaced_quantity(&self) -> u64 {
        self.unplaced
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }
}

/// Average fill of the non-empty packs relative to `max_weight`, in percent.
pub fn utilization_percent(packs: &[Pack], max_weight: f64) -> f64 {
    let (count, weight) = packs
        .iter()
        .filter(|pack| !pack.is_empty())
        .fold((0usize, 0.0f64), |(count, weight), pack| {
            (count + 1, weight + pack.total_weight())
        });
    if count == 0 || max_weight <= 0.0 {
        return 0.0;
    }
    let percent = 100.0 * weight / (count as f64 * max_weight);
    if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

struct CachedStrategy {
    kind: StrategyKind,
    threads: usize,
    safety: SafetyLimits,
    strategy: Arc<dyn PackStrategy>,
}

/// Runs plans and keeps the last strategy instance for reuse.
///
/// Shareable between threads: the cache lock is only held while the
/// strategy is looked up, never while sorting or packing.
#[derive(Default)]
pub struct Planner {
    cached: Mutex<Option<CachedStrategy>>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans `items` under `config`.
    ///
    /// # Parameters
    /// * `config` - Sort order, pack limits, strategy and threads
    /// * `items` - Items to pack; entries without pieces or with an invalid
    ///   weight are dropped silently
    ///
    /// # Returns
    /// The packs, summary statistics and timings. Never fails: pieces that
    /// could not be placed are listed in `unplaced`.
    pub fn plan(&self, config: &PlanConfig, items: Vec<Item>) -> PlanResult {
        let started = Instant::now();
        let threads = effective_threads(config);
        let limits = config.limits();
        let total_items = items
            .iter()
            .fold(0u64, |sum, item| sum.saturating_add(u64::from(item.quantity)));

        let mut items: Vec<Item> = items.into_iter().filter(Item::is_packable).collect();
        if items.is_empty() {
            debug!("No packable items, returning empty plan");
            return PlanResult {
                total_items,
                strategy_name: self.strategy(config.strategy, threads, config.safety).name(),
                total_duration: started.elapsed(),
                ..PlanResult::default()
            };
        }

        let sort_started = Instant::now();
        let sort_backend = sort_items(&mut items, config.sort_order, config.sort_backend, threads);
        let sort_duration = sort_started.elapsed();

        let strategy = self.strategy(config.strategy, threads, config.safety);
        let strategy_name = strategy.name();
        let pack_started = Instant::now();
        let outcome = strategy.pack_with_report(&items, limits);
        let pack_duration = pack_started.elapsed();

        let utilization_percent = utilization_percent(&outcome.packs, limits.max_weight);
        let total_duration = started.elapsed();

        info!(
            strategy = %strategy_name,
            order = %config.sort_order,
            items = items.len(),
            packs = outcome.packs.len(),
            unplaced = outcome.unplaced.len(),
            utilization = utilization_percent,
            elapsed_ms = total_duration.as_millis() as u64,
            "Plan complete"
        );

        PlanResult {
            packs: outcome.packs,
            sort_duration,
            pack_duration,
            total_duration,
            total_items,
            utilization_percent,
            strategy_name,
            unplaced: outcome.unplaced,
            sort_backend,
        }
    }

    /// Strategy for the given settings, rebuilt only when they changed.
    fn strategy(
        &self,
        kind: StrategyKind,
        threads: usize,
        safety: SafetyLimits,
    ) -> Arc<dyn PackStrategy> {
        let mut cached = self.cached.lock();
        if let Some(hit) = cached
            .as_ref()
            .filter(|c| c.kind == kind && c.threads == threads && c.safety == safety)
        {
            return Arc::clone(&hit.strategy);
        }

        debug!(strategy = kind.id(), threads, "Creating strategy");
        let strategy: Arc<dyn PackStrategy> =
            Arc::from(create_strategy_with_limits(kind, threads, safety));
        *cached = Some(CachedStrategy {
            kind,
            threads,
            safety,
            strategy: Arc::clone(&strategy),
        });
        strategy
    }

    #[cfg(test)]
    fn cached_strategy(&self) -> Option<Arc<dyn PackStrategy>> {
        self.cached.lock().as_ref().map(|c| Arc::clone(&c.strategy))
    }
}

/// Worker threads for `config`: zero means the strategy's default, the
/// result is clamped to `[1, MAX_THREADS]`.
fn effective_threads(config: &PlanConfig) -> usize {
    let requested = match config.threads {
        0 => config.strategy.default_threads(),
        threads => threads,
    };
    requested.clamp(1, MAX_THREADS)
}

/// Plans with a fresh [`Planner`].
pub fn plan(config: &PlanConfig, items: Vec<Item>) -> PlanResult {
    Planner::new().plan(config, items)
}
