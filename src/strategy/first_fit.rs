//! Blocking first fit, the baseline strategy.

use tracing::debug;

use super::next_fit::sequential_next_fit;
use super::{PackOutcome, PackStrategy, StrategyKind};
use crate::model::Item;
use crate::types::{PackLimits, SafetyLimits};

/// Places pieces into the last pack only, opening a new one when it is full.
///
/// Behaves like next fit; kept as its own kind so plans can name the
/// baseline explicitly.
#[derive(Clone, Debug, Default)]
pub struct FirstFitStrategy {
    safety: SafetyLimits,
}

impl FirstFitStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_safety(mut self, safety: SafetyLimits) -> Self {
        self.safety = safety.sanitized();
        self
    }
}

impl PackStrategy for FirstFitStrategy {
    fn name(&self) -> String {
        StrategyKind::FirstFit.display_name().to_string()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::FirstFit
    }

    fn pack_with_report(&self, items: &[Item], limits: PackLimits) -> PackOutcome {
        debug!(items = items.len(), "Running blocking first fit");
        sequential_next_fit(items, &limits, &self.safety)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::NextFitStrategy;
    use crate::sort::test_support::random_items;

    #[test]
    fn matches_next_fit() {
        let items = random_items(800, 1_000, 13);
        let limits = PackLimits::new(12, 30.0);
        assert_eq!(
            FirstFitStrategy::new().pack_with_report(&items, limits),
            NextFitStrategy::new().pack_with_report(&items, limits)
        );
    }
}
