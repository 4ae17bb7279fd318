//! Blood bank service.
//!
//! `BloodBank` is shared by reference across threads. It owns the database
//! behind a mutex and a set of per-type [`StockLocks`].
//!
//! Stock-changing operations follow the same shape:
//!
//! ```text
//! read record ──► lock types (canonical order) ──► IMMEDIATE tx
//!                                                        │
//!                                      re-read + snapshot, decide (pure)
//!                                                        │
//!                          append event, conditional UPDATE,
//!                          post-check availability ──► commit / rollback
//! ```
//!
//! The stock locks order callers within one `BloodBank`. The write
//! transaction spans the snapshot, the decision and the commit, so other
//! connections to the same file serialise on SQLite's write lock.

mod donations;
mod fulfill;
mod inventory;
mod locks;
mod requests;

pub use donations::DonationCompletion;
pub use fulfill::FulfillmentOutcome;
pub use locks::{StockGuard, StockLocks};
pub use requests::NewBloodRequest;

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::config::{BankConfig, ConfigError};
use crate::db::{Database, DbError};
use crate::ledger::LedgerError;
use crate::models::{BloodType, InvalidBloodType};

/// Service-level errors. Every variant leaves stored state unchanged.
#[derive(Error, Debug)]
pub enum BankError {
    #[error(transparent)]
    InvalidBloodType(#[from] InvalidBloodType),

    #[error("Invalid quantity: {0} ml")]
    InvalidQuantity(i64),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Donation {0} is already completed")]
    AlreadyCompleted(String),

    #[error("Donor {donor_id} is not eligible for another {days_remaining} days")]
    DonorNotEligible { donor_id: String, days_remaining: i64 },

    #[error("Insufficient compatible stock: {available_ml} ml available, {shortfall_ml} ml short")]
    InsufficientStock {
        available_ml: i64,
        shortfall_ml: i64,
        compatible_types: Vec<BloodType>,
    },

    #[error("Consistency violation: derived stock for {blood_type} is {available_ml} ml")]
    ConsistencyViolation {
        blood_type: BloodType,
        available_ml: i64,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type BankResult<T> = Result<T, BankError>;

impl From<rusqlite::Error> for BankError {
    fn from(e: rusqlite::Error) -> Self {
        BankError::Database(DbError::Sqlite(e))
    }
}

impl From<LedgerError> for BankError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Database(e) => BankError::Database(e),
            LedgerError::Json(e) => BankError::Database(DbError::Json(e)),
            LedgerError::InvalidQuantity(qty) => BankError::InvalidQuantity(qty),
            LedgerError::ConsistencyViolation {
                blood_type,
                available_ml,
            } => BankError::ConsistencyViolation {
                blood_type,
                available_ml,
            },
        }
    }
}

impl<T> From<PoisonError<T>> for BankError {
    fn from(e: PoisonError<T>) -> Self {
        BankError::LockPoisoned(e.to_string())
    }
}

/// The stock ledger plus its donation and request workflows.
pub struct BloodBank {
    db: Mutex<Database>,
    locks: StockLocks,
    config: BankConfig,
}

impl BloodBank {
    /// Open the store named by `config`, or an in-memory one when it names none.
    pub fn open(config: BankConfig) -> BankResult<Self> {
        config.validate()?;
        let db = match &config.database_path {
            Some(path) => Database::open_with_timeout(path, config.busy_timeout())?,
            None => Database::open_in_memory()?,
        };
        tracing::info!(
            path = ?config.database_path,
            policy = ?config.fulfill_policy,
            "blood bank opened"
        );
        Ok(Self::with_database(db, config))
    }

    /// In-memory bank with default settings.
    pub fn open_in_memory() -> BankResult<Self> {
        Self::open(BankConfig::default())
    }

    pub fn with_database(db: Database, config: BankConfig) -> Self {
        Self {
            db: Mutex::new(db),
            locks: StockLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    fn db(&self) -> BankResult<MutexGuard<'_, Database>> {
        Ok(self.db.lock()?)
    }
}

fn not_found(kind: &str, id: &str) -> BankError {
    BankError::NotFound(format!("{} {}", kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BloodBank>();
    }

    #[test]
    fn test_ledger_errors_map_to_bank_errors() {
        let err: BankError = LedgerError::InvalidQuantity(-1).into();
        assert!(matches!(err, BankError::InvalidQuantity(-1)));

        let err: BankError = LedgerError::ConsistencyViolation {
            blood_type: BloodType::ONeg,
            available_ml: -10,
        }
        .into();
        assert!(matches!(
            err,
            BankError::ConsistencyViolation {
                blood_type: BloodType::ONeg,
                available_ml: -10
            }
        ));
    }

    #[test]
    fn test_open_in_memory() {
        let bank = BloodBank::open_in_memory().unwrap();
        assert!(bank.config().database_path.is_none());
        assert_eq!(bank.availability(BloodType::APos).unwrap(), 0);
    }
}
