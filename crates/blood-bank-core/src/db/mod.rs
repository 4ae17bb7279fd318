//! Database layer for the blood bank.
//!
//! Row-level helpers take a `&Connection` so the service can compose them
//! inside one transaction; the `Database` methods are single-statement (or
//! self-contained transaction) conveniences over the same helpers.

mod schema;
mod donors;
mod donations;
mod requests;
mod ledger;

pub use schema::*;
pub use donors::*;
pub use donations::*;
pub use requests::*;
pub use ledger::*;

use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::BloodType;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Default time a writer waits on a locked database file.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open database at path with an explicit busy timeout.
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(PRAGMAS)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction, taking the database write lock up front.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

pub(crate) fn parse_blood_type(label: &str) -> DbResult<BloodType> {
    label
        .parse()
        .map_err(|_| DbError::Constraint(format!("Unknown blood type in database: {}", label)))
}
