//! Stock ledger.
//!
//! The ledger is the only source of truth for available stock. Availability
//! is always derived as collected minus issued; there is no stored counter.

mod integrity;

pub use integrity::*;

use rusqlite::Connection;
use thiserror::Error;

use crate::db::{self, DbError, TypeTotals};
use crate::engine::StockSnapshot;
use crate::models::{BloodType, LedgerEvent, NewLedgerEvent};

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Quantity must be positive, got {0} ml")]
    InvalidQuantity(i64),

    #[error("Derived stock for {blood_type} is negative ({available_ml} ml)")]
    ConsistencyViolation {
        blood_type: BloodType,
        available_ml: i64,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Per-type availability read from the ledger in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    totals: [TypeTotals; 8],
}

impl LedgerSnapshot {
    pub fn totals(&self, blood_type: BloodType) -> TypeTotals {
        self.totals[blood_type.index()]
    }

    /// Fails if any type in `types` has gone negative.
    pub fn check_non_negative(&self, types: &[BloodType]) -> LedgerResult<()> {
        for &t in types {
            check_available(t, self.totals(t).available_ml())?;
        }
        Ok(())
    }
}

impl StockSnapshot for LedgerSnapshot {
    fn available_ml(&self, blood_type: BloodType) -> i64 {
        self.totals(blood_type).available_ml()
    }
}

fn check_available(blood_type: BloodType, available_ml: i64) -> LedgerResult<i64> {
    if available_ml < 0 {
        tracing::error!(
            blood_type = %blood_type,
            available_ml,
            "derived stock went negative; conservation invariant violated"
        );
        return Err(LedgerError::ConsistencyViolation {
            blood_type,
            available_ml,
        });
    }
    Ok(available_ml)
}

/// Ledger view over a connection or an open transaction.
pub struct Ledger<'a> {
    conn: &'a Connection,
}

impl<'a> Ledger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one event. Callers issuing stock must hold the stock locks for
    /// the affected type and run this inside the commit transaction.
    pub fn append(&self, event: &NewLedgerEvent) -> LedgerResult<LedgerEvent> {
        if event.quantity_ml <= 0 {
            return Err(LedgerError::InvalidQuantity(event.quantity_ml));
        }
        let appended = db::insert_ledger_event(self.conn, event)?;
        tracing::debug!(
            sequence = appended.sequence,
            blood_type = %appended.blood_type,
            kind = appended.kind.as_str(),
            quantity_ml = appended.quantity_ml,
            "ledger event appended"
        );
        Ok(appended)
    }

    /// Collected minus issued for one type.
    pub fn available_ml(&self, blood_type: BloodType) -> LedgerResult<i64> {
        let totals = db::ledger_totals_for(self.conn, blood_type)?;
        check_available(blood_type, totals.available_ml())
    }

    /// Sum of [`Ledger::available_ml`] over a set of types.
    pub fn available_ml_for_set(&self, types: &[BloodType]) -> LedgerResult<i64> {
        let snapshot = self.snapshot()?;
        snapshot.check_non_negative(types)?;
        Ok(types.iter().map(|t| snapshot.available_ml(*t)).sum())
    }

    /// Read all per-type totals at once.
    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            totals: db::ledger_totals(self.conn)?,
        })
    }

    pub fn total_collected_for(&self, blood_type: BloodType) -> LedgerResult<i64> {
        Ok(db::ledger_totals_for(self.conn, blood_type)?.collected_ml)
    }

    pub fn total_issued_for(&self, blood_type: BloodType) -> LedgerResult<i64> {
        Ok(db::ledger_totals_for(self.conn, blood_type)?.issued_ml)
    }

    pub fn total_collected(&self) -> LedgerResult<i64> {
        Ok(self.snapshot()?.totals.iter().map(|t| t.collected_ml).sum())
    }

    pub fn total_issued(&self) -> LedgerResult<i64> {
        Ok(self.snapshot()?.totals.iter().map(|t| t.issued_ml).sum())
    }

    /// Pool-wide available stock. Each type is checked for consistency first.
    pub fn total_available(&self) -> LedgerResult<i64> {
        self.available_ml_for_set(&BloodType::ALL)
    }

    /// All events in append order.
    pub fn events(&self) -> LedgerResult<Vec<LedgerEvent>> {
        Ok(db::list_ledger_events(self.conn, None)?)
    }

    /// Events for one type in append order.
    pub fn events_for(&self, blood_type: BloodType) -> LedgerResult<Vec<LedgerEvent>> {
        Ok(db::list_ledger_events(self.conn, Some(blood_type))?)
    }
}
