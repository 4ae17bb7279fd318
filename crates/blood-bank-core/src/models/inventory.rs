//! Derived inventory views. Nothing here is stored; every value is computed
//! from the ledger on demand.

use serde::{Deserialize, Serialize};

use super::blood_type::BloodType;

/// Below this many millilitres a type is critical.
pub const CRITICAL_THRESHOLD_ML: i64 = 1000;
/// Below this many millilitres a type is low.
pub const LOW_STOCK_THRESHOLD_ML: i64 = 2000;

/// Stock level classification for a single blood type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StockStatus {
    OutOfStock,
    Critical,
    LowStock,
    Sufficient,
}

impl StockStatus {
    /// Classify an available quantity.
    pub fn from_available(available_ml: i64) -> Self {
        if available_ml <= 0 {
            StockStatus::OutOfStock
        } else if available_ml < CRITICAL_THRESHOLD_ML {
            StockStatus::Critical
        } else if available_ml < LOW_STOCK_THRESHOLD_ML {
            StockStatus::LowStock
        } else {
            StockStatus::Sufficient
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Out of Stock",
            StockStatus::Critical => "Critical",
            StockStatus::LowStock => "Low Stock",
            StockStatus::Sufficient => "Sufficient",
        }
    }
}

/// Per-type stock line of the distribution report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodTypeStock {
    pub blood_type: BloodType,
    pub description: String,
    pub donor_count: u32,
    pub completed_donations: u32,
    pub collected_ml: i64,
    pub issued_ml: i64,
    pub available_ml: i64,
    /// Open (pending or approved) requests for this type
    pub pending_request_count: u32,
    pub pending_request_ml: i64,
    pub status: StockStatus,
}

/// Whole-pool totals and workflow counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InventorySummary {
    pub total_collected_ml: i64,
    pub total_issued_ml: i64,
    pub total_available_ml: i64,
    pub completed_donations: u32,
    pub total_donors: u32,
    pub available_donors: u32,
    pub total_requests: u32,
    pub pending_requests: u32,
    pub approved_requests: u32,
    pub fulfilled_requests: u32,
}

/// Completed donations collected in one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyDonationStat {
    /// `YYYY-MM`
    pub month: String,
    pub count: u32,
    pub total_ml: i64,
}
