//! Allocation engine.
//!
//! Pure matching over a snapshot of per-type availability. The caller takes
//! the snapshot and commits the result inside one write transaction; see
//! [`crate::bank`].
//!
//! Policy: first-fit over [`fulfillment_priority`]. A request is always
//! filled from exactly one blood type or not at all, so the issued type is
//! unambiguous.

use serde::{Deserialize, Serialize};

use crate::compatibility::{compatible_types, fulfillment_priority};
use crate::models::BloodType;

/// Chosen source for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub requested: BloodType,
    pub chosen: BloodType,
    pub quantity_ml: i64,
    /// Availability of `chosen` before the issue
    pub available_before_ml: i64,
}

impl Allocation {
    pub fn remaining_after_ml(&self) -> i64 {
        self.available_before_ml - self.quantity_ml
    }

    pub fn is_substitution(&self) -> bool {
        self.chosen != self.requested
    }
}

/// Why no allocation was possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    /// Sum of availability over every compatible type
    pub available_ml: i64,
    /// `requested - available`, floored at zero when the union would suffice
    pub shortfall_ml: i64,
    /// Candidates in the order they were tried
    pub compatible_types: Vec<BloodType>,
}

/// Read-only view of available stock per type.
pub trait StockSnapshot {
    fn available_ml(&self, blood_type: BloodType) -> i64;
}

impl StockSnapshot for [i64; 8] {
    fn available_ml(&self, blood_type: BloodType) -> i64 {
        self[blood_type.index()]
    }
}

/// First-fit allocation of `quantity_ml` of `requested`.
pub fn allocate<S: StockSnapshot + ?Sized>(
    requested: BloodType,
    quantity_ml: i64,
    stock: &S,
) -> Result<Allocation, Shortfall> {
    let priority = fulfillment_priority(requested);

    for &candidate in &priority {
        let available = stock.available_ml(candidate);
        if available >= quantity_ml {
            return Ok(Allocation {
                requested,
                chosen: candidate,
                quantity_ml,
                available_before_ml: available,
            });
        }
    }

    let total: i64 = compatible_types(requested)
        .iter()
        .map(|t| stock.available_ml(*t))
        .sum();

    Err(Shortfall {
        available_ml: total,
        shortfall_ml: (quantity_ml - total).max(0),
        compatible_types: priority,
    })
}
