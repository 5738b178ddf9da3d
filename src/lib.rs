//! Capacity-bounded pack planning.
//!
//! Items (id, length, quantity, per-piece weight) are optionally sorted by
//! length and then split across packs limited by an item count and a total
//! weight. Several packing strategies are available, sequential and
//! parallel; see [`strategy::StrategyKind`].
//!
//! ```
//! use pack_planner::model::Item;
//! use pack_planner::planner::{PlanConfig, plan};
//! use pack_planner::types::SortOrder;
//!
//! let items = vec![
//!     Item::new(1, 100, 5, 2.0).unwrap(),
//!     Item::new(2, 200, 3, 3.0).unwrap(),
//! ];
//! let result = plan(&PlanConfig::new(SortOrder::LongToShort, 10, 25.0), items);
//! assert_eq!(result.total_items, 8);
//! assert_eq!(result.pack_count(), 1);
//! ```

pub mod api;
pub mod config;
pub mod input;
pub mod model;
pub mod planner;
pub mod sort;
pub mod strategy;
pub mod types;
