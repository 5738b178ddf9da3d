//! Data models for pack planning.
//!
//! This module defines the fundamental data structures:
//! - `Item`: a divisible unit with id, length, quantity and per-piece weight
//! - `Pack`: a capacity-bounded container holding item fragments
//!
//! A fragment is an `Item` whose quantity is the portion placed in one pack.

use std::fmt;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{PackLimits, WEIGHT_EPSILON};

/// Validation error for item data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid length: {0}")]
    InvalidLength(String),
}

fn validate_quantity(id: i64, value: i64) -> Result<u32, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::InvalidQuantity(format!(
            "item {id}: quantity must be positive, got: {value}"
        )));
    }
    u32::try_from(value).map_err(|_| {
        ValidationError::InvalidQuantity(format!(
            "item {id}: quantity {value} exceeds {}",
            u32::MAX
        ))
    })
}

fn validate_length(id: i64, value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::InvalidLength(format!(
            "item {id}: length must not be negative, got: {value}"
        )));
    }
    u32::try_from(value).map_err(|_| {
        ValidationError::InvalidLength(format!("item {id}: length {value} exceeds {}", u32::MAX))
    })
}

fn validate_weight(id: i64, value: f64) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "item {id}: weight must be a finite, non-negative number, got: {value}"
        )));
    }
    Ok(())
}

/// An item to be packed.
///
/// # Fields
/// * `id` - Identification number of the item
/// * `length` - Length of one piece, used as the sort key
/// * `quantity` - Number of pieces
/// * `weight` - Weight of one piece
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "id": 1, "length": 100, "quantity": 5, "weight": 2.0 }))]
pub struct Item {
    pub id: i64,
    pub length: u32,
    pub quantity: u32,
    pub weight: f64,
}

impl Item {
    /// Creates a new item with validation.
    ///
    /// # Returns
    /// `Ok(Item)` for valid values, otherwise `Err(ValidationError)` when
    /// the quantity is not positive, the length is negative or the weight
    /// is negative or not finite.
    ///
    /// # Examples
    /// ```
    /// use pack_planner::model::Item;
    ///
    /// assert!(Item::new(1, 100, 5, 2.0).is_ok());
    /// assert!(Item::new(1, 100, 0, 2.0).is_err());
    /// assert!(Item::new(1, -1, 5, 2.0).is_err());
    /// ```
    pub fn new(id: i64, length: i64, quantity: i64, weight: f64) -> Result<Self, ValidationError> {
        let length = validate_length(id, length)?;
        let quantity = validate_quantity(id, quantity)?;
        validate_weight(id, weight)?;
        Ok(Self {
            id,
            length,
            quantity,
            weight,
        })
    }

    /// Total weight of all pieces.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        f64::from(self.quantity) * self.weight
    }

    /// Copy of this item carrying a different quantity.
    #[inline]
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self { quantity, ..*self }
    }

    /// Checks whether the item may reach a strategy on the permissive path.
    ///
    /// Items with no pieces or a negative / non-finite weight are filtered
    /// out silently before packing.
    #[inline]
    pub fn is_packable(&self) -> bool {
        self.quantity > 0 && self.weight.is_finite() && self.weight >= 0.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{:.3}",
            self.id, self.length, self.quantity, self.weight
        )
    }
}

/// A pack with its fragments and running totals.
///
/// Totals are maintained on every mutation, so `total_items` always equals
/// the sum of fragment quantities and `total_weight` the sum of fragment
/// weights. Only [`Pack::add_partial`] mutates a pack; renumbering produces
/// a new value.
#[derive(Clone, Debug, PartialEq)]
pub struct Pack {
    number: usize,
    items: Vec<Item>,
    total_items: u32,
    total_weight: f64,
    max_length: u32,
}

impl Pack {
    /// Creates an empty pack.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            items: Vec::with_capacity(8),
            total_items: 0,
            total_weight: 0.0,
            max_length: 0,
        }
    }

    /// Number of pieces of the given weight this pack can still take.
    ///
    /// Bounded by the remaining item slots and, for pieces with a positive
    /// weight, by the remaining weight capacity.
    pub fn capacity_for(&self, piece_weight: f64, limits: &PackLimits) -> u32 {
        let by_items = limits.max_items.saturating_sub(self.total_items);
        if by_items == 0 {
            return 0;
        }
        if piece_weight <= 0.0 {
            return by_items;
        }

        let headroom = limits.max_weight - self.total_weight + WEIGHT_EPSILON;
        if headroom < piece_weight {
            return 0;
        }

        let by_weight = (headroom / piece_weight).floor();
        let mut fits = if by_weight >= f64::from(by_items) {
            by_items
        } else {
            by_weight as u32
        };
        // Division rounding may overshoot by one piece.
        while fits > 0
            && self.total_weight + f64::from(fits) * piece_weight
                > limits.max_weight + WEIGHT_EPSILON
        {
            fits -= 1;
        }
        fits
    }

    /// Adds as many pieces of `item` as fit, up to `remaining`.
    ///
    /// # Returns
    /// The number of pieces placed; 0 if none fit.
    pub fn add_partial(&mut self, item: &Item, remaining: u32, limits: &PackLimits) -> u32 {
        let fits = self.capacity_for(item.weight, limits).min(remaining);
        if fits == 0 {
            return 0;
        }

        self.items.push(item.with_quantity(fits));
        self.total_items += fits;
        self.total_weight += f64::from(fits) * item.weight;
        self.max_length = self.max_length.max(item.length);
        fits
    }

    /// The same pack under a new number.
    pub fn renumbered(self, number: usize) -> Self {
        Self { number, ..self }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Fragments in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Longest fragment in the pack (a reported dimension, not a limit).
    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item slots still free under the given limits.
    pub fn remaining_items(&self, limits: &PackLimits) -> u32 {
        limits.max_items.saturating_sub(self.total_items)
    }

    /// Weight capacity still free under the given limits (never negative).
    pub fn remaining_weight(&self, limits: &PackLimits) -> f64 {
        (limits.max_weight - self.total_weight).max(0.0)
    }
}

impl fmt::Display for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pack Number: {}", self.number)?;
        for item in &self.items {
            writeln!(f, "{item}")?;
        }
        write!(
            f,
            "Pack Length: {}, Pack Weight: {:.2}",
            self.max_length, self.total_weight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn limits(max_items: i64, max_weight: f64) -> PackLimits {
        PackLimits::new(max_items, max_weight)
    }

    #[test]
    fn test_item_new_valid() {
        let item = Item::new(7, 120, 3, 1.5).unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.length, 120);
        assert_eq!(item.quantity, 3);
        assert!((item.total_weight() - 4.5).abs() < WEIGHT_EPSILON);
    }

    #[test]
    fn test_item_new_rejects_invalid_values() {
        assert!(matches!(
            Item::new(1, 100, 0, 1.0),
            Err(ValidationError::InvalidQuantity(_))
        ));
        assert!(matches!(
            Item::new(1, 100, -4, 1.0),
            Err(ValidationError::InvalidQuantity(_))
        ));
        assert!(matches!(
            Item::new(1, -1, 4, 1.0),
            Err(ValidationError::InvalidLength(_))
        ));
        assert!(matches!(
            Item::new(1, 100, 4, -0.5),
            Err(ValidationError::InvalidWeight(_))
        ));
        assert!(matches!(
            Item::new(1, 100, 4, f64::NAN),
            Err(ValidationError::InvalidWeight(_))
        ));
    }

    #[test]
    fn test_item_zero_length_and_weight_allowed() {
        assert!(Item::new(1, 0, 1, 0.0).is_ok());
    }

    #[test]
    fn test_item_is_packable() {
        let item = Item::new(1, 10, 2, 1.0).unwrap();
        assert!(item.is_packable());
        assert!(!item.with_quantity(0).is_packable());

        let broken = Item {
            weight: -1.0,
            ..item
        };
        assert!(!broken.is_packable());
    }

    #[test]
    fn test_item_display() {
        let item = Item::new(3, 300, 2, 5.0).unwrap();
        assert_eq!(item.to_string(), "3,300,2,5.000");
    }

    #[test]
    fn test_add_partial_bounded_by_items() {
        let limits = limits(10, 100.0);
        let item = Item::new(1, 100, 25, 1.0).unwrap();
        let mut pack = Pack::new(1);

        assert_eq!(pack.add_partial(&item, 25, &limits), 10);
        assert_eq!(pack.total_items(), 10);
        assert_eq!(pack.add_partial(&item, 15, &limits), 0);
        assert_eq!(pack.remaining_items(&limits), 0);
    }

    #[test]
    fn test_add_partial_bounded_by_weight() {
        let limits = limits(10, 25.0);
        let mut pack = Pack::new(1);
        let light = Item::new(1, 100, 5, 2.0).unwrap();
        let medium = Item::new(2, 200, 3, 3.0).unwrap();
        let heavy = Item::new(3, 300, 2, 5.0).unwrap();

        assert_eq!(pack.add_partial(&light, 5, &limits), 5);
        assert_eq!(pack.add_partial(&medium, 3, &limits), 3);
        assert_eq!(pack.add_partial(&heavy, 2, &limits), 1);
        assert_eq!(pack.total_items(), 9);
        assert!((pack.total_weight() - 24.0).abs() < WEIGHT_EPSILON);
        assert_eq!(pack.max_length(), 300);
        assert_eq!(pack.add_partial(&heavy, 1, &limits), 0);
    }

    #[test]
    fn test_add_partial_fills_weight_exactly() {
        let limits = limits(100, 1.0);
        let mut pack = Pack::new(1);
        let item = Item::new(1, 10, 20, 0.1).unwrap();

        let placed = pack.add_partial(&item, 20, &limits);
        assert_eq!(placed, 10);
        assert!(pack.total_weight() <= limits.max_weight + WEIGHT_EPSILON);
    }

    #[test]
    fn test_add_partial_zero_weight_only_bounded_by_items() {
        let limits = limits(4, 0.5);
        let mut pack = Pack::new(1);
        let feather = Item::new(1, 10, 9, 0.0).unwrap();

        assert_eq!(pack.add_partial(&feather, 9, &limits), 4);
        assert_eq!(pack.total_weight(), 0.0);
    }

    #[test]
    fn test_totals_match_fragments() {
        let limits = limits(50, 1000.0);
        let mut pack = Pack::new(1);
        for id in 0..5 {
            let item = Item::new(id, 10 * id, 3, 0.3 * id as f64).unwrap();
            pack.add_partial(&item, 3, &limits);
        }

        let qty: u32 = pack.items().iter().map(|i| i.quantity).sum();
        let weight: f64 = pack.items().iter().map(Item::total_weight).sum();
        assert_eq!(pack.total_items(), qty);
        assert!((pack.total_weight() - weight).abs() < 1e-9);
    }

    #[test]
    fn test_renumbered_keeps_contents() {
        let limits = limits(10, 25.0);
        let mut pack = Pack::new(42);
        pack.add_partial(&Item::new(1, 100, 2, 2.0).unwrap(), 2, &limits);

        let renumbered = pack.clone().renumbered(1);
        assert_eq!(renumbered.number(), 1);
        assert_eq!(renumbered.items(), pack.items());
        assert_eq!(renumbered.total_items(), pack.total_items());
    }

    #[test]
    fn test_pack_display() {
        let limits = limits(10, 25.0);
        let mut pack = Pack::new(1);
        pack.add_partial(&Item::new(1, 100, 5, 2.0).unwrap(), 5, &limits);
        pack.add_partial(&Item::new(2, 200, 3, 3.0).unwrap(), 3, &limits);

        assert_eq!(
            pack.to_string(),
            "Pack Number: 1\n1,100,5,2.000\n2,200,3,3.000\nPack Length: 200, Pack Weight: 19.00"
        );
    }
}
