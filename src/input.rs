//! Line-oriented plan input.
//!
//! ```text
//! ORDER,max_items,max_weight
//! id,length,quantity,weight
//! ...
//! ```
//!
//! Item rows are read until the end of input or the first empty line.
//! Malformed rows are skipped with a warning; a missing or malformed header
//! is an error.

use std::io::BufRead;

use thiserror::Error;
use tracing::warn;

use crate::model::Item;
use crate::types::SortOrder;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Could not read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input is empty, expected a header line ORDER,max_items,max_weight")]
    MissingHeader,
    #[error("Invalid header '{line}': {reason}")]
    InvalidHeader { line: String, reason: String },
}

/// Parsed input: the header values and the item rows.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanInput {
    pub sort_order: SortOrder,
    pub max_items: i64,
    pub max_weight: f64,
    pub items: Vec<Item>,
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn parse_header(line: &str) -> Result<(SortOrder, i64, f64), InputError> {
    let invalid = |reason: String| InputError::InvalidHeader {
        line: line.to_string(),
        reason,
    };

    let fields = split_fields(line);
    let [order, max_items, max_weight] = fields.as_slice() else {
        return Err(invalid(format!("expected 3 fields, got {}", fields.len())));
    };

    let sort_order =
        SortOrder::parse(order).ok_or_else(|| invalid(format!("unknown sort order '{order}'")))?;
    let max_items = max_items
        .parse::<i64>()
        .map_err(|err| invalid(format!("max_items '{max_items}': {err}")))?;
    let max_weight = max_weight
        .parse::<f64>()
        .map_err(|err| invalid(format!("max_weight '{max_weight}': {err}")))?;

    Ok((sort_order, max_items, max_weight))
}

fn parse_item(line: &str) -> Result<Item, String> {
    let fields = split_fields(line);
    let [id, length, quantity, weight] = fields.as_slice() else {
        return Err(format!("expected 4 fields, got {}", fields.len()));
    };

    let id = id.parse::<i64>().map_err(|err| format!("id '{id}': {err}"))?;
    let length = length
        .parse::<i64>()
        .map_err(|err| format!("length '{length}': {err}"))?;
    let quantity = quantity
        .parse::<i64>()
        .map_err(|err| format!("quantity '{quantity}': {err}"))?;
    let weight = weight
        .parse::<f64>()
        .map_err(|err| format!("weight '{weight}': {err}"))?;

    Item::new(id, length, quantity, weight).map_err(|err| err.to_string())
}

/// Reads a header and item rows from `reader`.
pub fn parse_plan_input<R: BufRead>(reader: R) -> Result<PlanInput, InputError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(InputError::MissingHeader),
    };
    if header.trim().is_empty() {
        return Err(InputError::MissingHeader);
    }
    let (sort_order, max_items, max_weight) = parse_header(header.trim())?;

    let mut items = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        match parse_item(line) {
            Ok(item) => items.push(item),
            // Header is line 1.
            Err(reason) => warn!(line = index + 2, "Skipping item row '{line}': {reason}"),
        }
    }

    Ok(PlanInput {
        sort_order,
        max_items,
        max_weight,
        items,
    })
}
