//! Common types shared by the sort stage, the strategies and the planner.
//!
//! This module defines the numeric tolerances, the sort order, the clamped
//! capacity limits every strategy works with and the atomic pack counter.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tolerance for weight comparisons against the pack capacity.
///
/// Absorbs floating point accumulation when fragments are added one by one.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Remaining weight below which a best-fit pack is considered closed.
///
/// Scaled down for limits under one unit, see [`PackLimits::closing_threshold`].
pub const BEST_FIT_EPSILON: f64 = 1e-3;

/// Floor applied to non-positive maximum pack weights.
pub const MIN_MAX_WEIGHT: f64 = 0.1;

/// Upper bound for worker threads in parallel strategies and sort backends.
pub const MAX_THREADS: usize = 32;

/// Order in which items are fed to the packing strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    /// Keep the input order.
    #[default]
    Natural,
    /// Ascending by length.
    ShortToLong,
    /// Descending by length.
    LongToShort,
}

impl SortOrder {
    /// Parses a sort order, case-insensitively.
    ///
    /// Accepts the long names (`NATURAL`, `SHORT_TO_LONG`, `LONG_TO_SHORT`)
    /// and the short codes (`NAT`, `STL`, `LTS`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NATURAL" | "NAT" => Some(SortOrder::Natural),
            "SHORT_TO_LONG" | "STL" => Some(SortOrder::ShortToLong),
            "LONG_TO_SHORT" | "LTS" => Some(SortOrder::LongToShort),
            _ => None,
        }
    }

    /// Short code used in compact reports.
    pub fn code(&self) -> &'static str {
        match self {
            SortOrder::Natural => "NAT",
            SortOrder::ShortToLong => "STL",
            SortOrder::LongToShort => "LTS",
        }
    }

    /// Returns `true` when items are reordered at all.
    pub fn is_sorted_order(&self) -> bool {
        !matches!(self, SortOrder::Natural)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::Natural => "NATURAL",
            SortOrder::ShortToLong => "SHORT_TO_LONG",
            SortOrder::LongToShort => "LONG_TO_SHORT",
        };
        f.write_str(name)
    }
}

/// Capacity limits of a single pack, already clamped to safe values.
///
/// Strategies never trust raw limits; they always go through
/// [`PackLimits::new`], which floors `max_items` to 1 and replaces
/// non-positive or non-finite weights with [`MIN_MAX_WEIGHT`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackLimits {
    pub max_items: u32,
    pub max_weight: f64,
}

impl PackLimits {
    pub fn new(max_items: i64, max_weight: f64) -> Self {
        let max_items = max_items.clamp(1, i64::from(u32::MAX)) as u32;
        let max_weight = if max_weight.is_finite() && max_weight > 0.0 {
            max_weight
        } else if max_weight == f64::INFINITY {
            f64::MAX
        } else {
            MIN_MAX_WEIGHT
        };
        Self {
            max_items,
            max_weight,
        }
    }

    /// Checks whether a single piece of the given weight fits an empty pack.
    #[inline]
    pub fn admits_piece(&self, piece_weight: f64) -> bool {
        piece_weight <= self.max_weight + WEIGHT_EPSILON
    }

    /// Remaining weight at or below which a pack takes no further pieces in
    /// best fit. Never more than a thousandth of `max_weight`.
    #[inline]
    pub fn closing_threshold(&self) -> f64 {
        BEST_FIT_EPSILON.min(self.max_weight * 1e-3)
    }
}

/// Termination guards applied by every strategy.
///
/// The placement loop terminates on its own (each iteration places at least
/// one unit or opens a fresh pack), the limits bound memory and time for
/// pathological inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SafetyLimits {
    /// Maximum number of packs a single strategy run (or worker) may open.
    pub max_packs: usize,
    /// Maximum placement iterations spent on one item.
    pub max_item_iterations: usize,
}

impl SafetyLimits {
    pub const DEFAULT_MAX_PACKS: usize = 1_000_000;
    pub const DEFAULT_MAX_ITEM_ITERATIONS: usize = 2_000_000;

    /// Replaces zero limits with the defaults.
    pub fn sanitized(self) -> Self {
        Self {
            max_packs: if self.max_packs == 0 {
                Self::DEFAULT_MAX_PACKS
            } else {
                self.max_packs
            },
            max_item_iterations: if self.max_item_iterations == 0 {
                Self::DEFAULT_MAX_ITEM_ITERATIONS
            } else {
                self.max_item_iterations
            },
        }
    }
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_packs: Self::DEFAULT_MAX_PACKS,
            max_item_iterations: Self::DEFAULT_MAX_ITEM_ITERATIONS,
        }
    }
}

/// Source of pack numbers, shareable across worker threads.
///
/// Only supports fetch-and-increment, so numbers are unique but carry no
/// ordering between workers.
#[derive(Debug)]
pub struct PackCounter(AtomicUsize);

impl PackCounter {
    pub fn new(first: usize) -> Self {
        Self(AtomicUsize::new(first))
    }

    /// Reserves the next pack number.
    #[inline]
    pub fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for PackCounter {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Number of hardware threads, clamped to `[1, MAX_THREADS]`.
pub fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_THREADS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("NATURAL"), Some(SortOrder::Natural));
        assert_eq!(SortOrder::parse("short_to_long"), Some(SortOrder::ShortToLong));
        assert_eq!(SortOrder::parse(" LTS "), Some(SortOrder::LongToShort));
        assert_eq!(SortOrder::parse("sideways"), None);
    }

    #[test]
    fn test_sort_order_display_round_trip() {
        for order in [
            SortOrder::Natural,
            SortOrder::ShortToLong,
            SortOrder::LongToShort,
        ] {
            assert_eq!(SortOrder::parse(&order.to_string()), Some(order));
            assert_eq!(SortOrder::parse(order.code()), Some(order));
        }
    }

    #[test]
    fn test_pack_limits_clamp() {
        let limits = PackLimits::new(0, -5.0);
        assert_eq!(limits.max_items, 1);
        assert!((limits.max_weight - MIN_MAX_WEIGHT).abs() < WEIGHT_EPSILON);

        let limits = PackLimits::new(-3, f64::NAN);
        assert_eq!(limits.max_items, 1);
        assert!((limits.max_weight - MIN_MAX_WEIGHT).abs() < WEIGHT_EPSILON);

        let limits = PackLimits::new(i64::MAX, 25.0);
        assert_eq!(limits.max_items, u32::MAX);
        assert!((limits.max_weight - 25.0).abs() < WEIGHT_EPSILON);
    }

    #[test]
    fn test_pack_limits_admits_piece() {
        let limits = PackLimits::new(10, 25.0);
        assert!(limits.admits_piece(25.0));
        assert!(limits.admits_piece(0.0));
        assert!(!limits.admits_piece(25.1));
    }

    #[test]
    fn test_closing_threshold_scales_with_small_limits() {
        assert_eq!(PackLimits::new(10, 25.0).closing_threshold(), BEST_FIT_EPSILON);
        let tiny = PackLimits::new(10, 0.0005);
        assert!(tiny.closing_threshold() < tiny.max_weight);
        assert!((tiny.closing_threshold() - 5e-7).abs() < 1e-12);
    }

    #[test]
    fn test_safety_limits_sanitized() {
        let limits = SafetyLimits {
            max_packs: 0,
            max_item_iterations: 7,
        }
        .sanitized();
        assert_eq!(limits.max_packs, SafetyLimits::DEFAULT_MAX_PACKS);
        assert_eq!(limits.max_item_iterations, 7);
    }

    #[test]
    fn test_pack_counter_unique_across_threads() {
        let counter = PackCounter::new(1);
        let numbers = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..250).map(|_| counter.next()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        let unique: HashSet<_> = numbers.iter().copied().collect();
        assert_eq!(unique.len(), 1000);
        assert_eq!(unique.iter().min(), Some(&1));
        assert_eq!(unique.iter().max(), Some(&1000));
    }

    #[test]
    fn test_hardware_threads_in_range() {
        let threads = hardware_threads();
        assert!((1..=MAX_THREADS).contains(&threads));
    }
}
