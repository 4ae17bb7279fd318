//! Blood-Bank Core Library
//!
//! Blood stock ledger and compatibility-based allocation for a shared hospital pool.
//!
//! # Architecture
//!
//! ```text
//!   Donor ──► Donation (pending ──► approved ──► completed)
//!                                                   │
//!                                          Collected(type, ml)
//!                                                   │
//!                         ┌─────────────────────────▼─────────────────────────┐
//!                         │            Append-only stock ledger               │
//!                         │   available(T) = Σ collected(T) − Σ issued(T)     │
//!                         │   event.hash = sha256(prev_hash ‖ event_json)     │
//!                         └─────────────────────────▲─────────────────────────┘
//!                                                   │
//!                                            Issued(type, ml)
//!                                                   │
//!   Hospital ──► Request (pending ──► approved) ──► Allocation engine
//!                                                   first-fit over the
//!                                                   compatibility priority
//! ```
//!
//! # Core Principle
//!
//! **Stock is never stored.** Every availability figure is derived from the
//! ledger, and a request is filled from exactly one blood type or not at all.
//!
//! # Modules
//!
//! - [`models`]: Domain types (BloodType, Donation, BloodRequest, LedgerEvent, etc.)
//! - [`compatibility`]: ABO/Rh compatibility table and substitution priority
//! - [`engine`]: Pure first-fit allocation over a stock snapshot
//! - [`ledger`]: Derived stock and hash-chain verification
//! - [`db`]: SQLite persistence
//! - [`bank`]: Thread-safe service composing the above under per-type locks
//! - [`export`]: Inventory report and ledger audit export
//! - [`config`], [`logging`]: TOML settings and tracing setup

pub mod bank;
pub mod compatibility;
pub mod config;
pub mod db;
pub mod engine;
pub mod export;
pub mod ledger;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use bank::{BankError, BankResult, BloodBank, DonationCompletion, FulfillmentOutcome, NewBloodRequest};
pub use config::{BankConfig, ConfigError};
pub use db::Database;
pub use engine::{allocate, Allocation, Shortfall, StockSnapshot};
pub use export::{InventoryReport, LedgerAuditExport};
pub use ledger::{ChainStatus, Ledger};
pub use models::{
    BloodRequest, BloodType, BloodTypeStock, Donation, DonationStatus, Donor, FulfillPolicy,
    InventorySummary, LedgerEvent, LedgerEventKind, RequestStatus, StockStatus,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BloodBankError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already completed: {0}")]
    AlreadyCompleted(String),

    #[error("Donor not eligible for another {days_remaining} days")]
    DonorNotEligible { days_remaining: i64 },

    #[error("Insufficient stock: {available_ml} ml available, {shortfall_ml} ml short")]
    InsufficientStock {
        available_ml: i64,
        shortfall_ml: i64,
        compatible_types: Vec<String>,
    },

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<BankError> for BloodBankError {
    fn from(e: BankError) -> Self {
        match e {
            BankError::InvalidBloodType(e) => BloodBankError::InvalidInput(e.to_string()),
            BankError::InvalidQuantity(_) => BloodBankError::InvalidInput(e.to_string()),
            BankError::InvalidState(msg) => BloodBankError::InvalidState(msg),
            BankError::NotFound(msg) => BloodBankError::NotFound(msg),
            BankError::AlreadyCompleted(id) => BloodBankError::AlreadyCompleted(id),
            BankError::DonorNotEligible { days_remaining, .. } => {
                BloodBankError::DonorNotEligible { days_remaining }
            }
            BankError::InsufficientStock {
                available_ml,
                shortfall_ml,
                compatible_types,
            } => BloodBankError::InsufficientStock {
                available_ml,
                shortfall_ml,
                compatible_types: labels(&compatible_types),
            },
            BankError::ConsistencyViolation { .. } => {
                BloodBankError::ConsistencyViolation(e.to_string())
            }
            BankError::Database(e) => BloodBankError::DatabaseError(e.to_string()),
            BankError::LockPoisoned(msg) => BloodBankError::DatabaseError(msg),
            BankError::Config(e) => BloodBankError::ConfigError(e.to_string()),
        }
    }
}

impl From<ConfigError> for BloodBankError {
    fn from(e: ConfigError) -> Self {
        BloodBankError::ConfigError(e.to_string())
    }
}

impl From<models::InvalidBloodType> for BloodBankError {
    fn from(e: models::InvalidBloodType) -> Self {
        BloodBankError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for BloodBankError {
    fn from(e: serde_json::Error) -> Self {
        BloodBankError::SerializationError(e.to_string())
    }
}

impl From<logging::LogFilterError> for BloodBankError {
    fn from(e: logging::LogFilterError) -> Self {
        BloodBankError::InvalidInput(e.to_string())
    }
}

fn labels(types: &[BloodType]) -> Vec<String> {
    types.iter().map(|t| t.label().to_string()).collect()
}

fn parse_date(s: &str) -> Result<NaiveDate, BloodBankError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| BloodBankError::InvalidInput(format!("invalid date {:?}: {}", s, e)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a blood bank database at the given path.
#[uniffi::export]
pub fn open_blood_bank(path: String) -> Result<Arc<BloodBankCore>, BloodBankError> {
    let bank = BloodBank::open(BankConfig::at_path(path))?;
    Ok(Arc::new(BloodBankCore { bank }))
}

/// Open a blood bank configured by a TOML file.
#[uniffi::export]
pub fn open_blood_bank_with_config(config_path: String) -> Result<Arc<BloodBankCore>, BloodBankError> {
    let config = BankConfig::load(&config_path)?;
    let bank = BloodBank::open(config)?;
    Ok(Arc::new(BloodBankCore { bank }))
}

/// Create an in-memory blood bank (for testing).
#[uniffi::export]
pub fn open_blood_bank_in_memory(allow_pending_fulfillment: bool) -> Result<Arc<BloodBankCore>, BloodBankError> {
    let policy = if allow_pending_fulfillment {
        FulfillPolicy::AllowPending
    } else {
        FulfillPolicy::RequireApproval
    };
    let bank = BloodBank::open(BankConfig::in_memory(policy))?;
    Ok(Arc::new(BloodBankCore { bank }))
}

/// Install the global log subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(filter: String) -> Result<bool, BloodBankError> {
    Ok(logging::init_logging(&filter)?)
}

/// Donor types usable for a recipient, in the order they are tried.
#[uniffi::export]
pub fn fulfillment_priority(blood_type: String) -> Result<Vec<String>, BloodBankError> {
    let priority = compatibility::fulfillment_priority_for_label(&blood_type)?;
    Ok(labels(&priority))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe blood bank handle for FFI.
#[derive(uniffi::Object)]
pub struct BloodBankCore {
    bank: BloodBank,
}

#[uniffi::export]
impl BloodBankCore {
    // =========================================================================
    // Donor and Donation Operations
    // =========================================================================

    /// Register a donor.
    pub fn register_donor(
        &self,
        name: String,
        blood_type: String,
        last_donation_date: Option<String>,
    ) -> Result<FfiDonor, BloodBankError> {
        let last = last_donation_date.as_deref().map(parse_date).transpose()?;
        let donor = self.bank.register_donor(&name, blood_type.parse()?, last)?;
        Ok(donor.into())
    }

    pub fn get_donor(&self, donor_id: String) -> Result<FfiDonor, BloodBankError> {
        Ok(self.bank.get_donor(&donor_id)?.into())
    }

    /// Mark a donor available again (after the cooldown) or withdraw them.
    pub fn set_donor_availability(&self, donor_id: String, available: bool) -> Result<FfiDonor, BloodBankError> {
        Ok(self.bank.set_donor_availability(&donor_id, available)?.into())
    }

    /// Schedule a donation.
    pub fn submit_donation(
        &self,
        donor_id: String,
        quantity_ml: i64,
        donation_date: String,
    ) -> Result<FfiDonation, BloodBankError> {
        let date = parse_date(&donation_date)?;
        Ok(self.bank.submit_donation(&donor_id, quantity_ml, date)?.into())
    }

    pub fn get_donation(&self, donation_id: String) -> Result<FfiDonation, BloodBankError> {
        Ok(self.bank.get_donation(&donation_id)?.into())
    }

    /// Approve a pending donation (checks the donor cooldown).
    pub fn approve_donation(&self, donation_id: String, admin_id: String) -> Result<FfiDonation, BloodBankError> {
        Ok(self.bank.approve_donation(&donation_id, &admin_id)?.into())
    }

    pub fn reject_donation(
        &self,
        donation_id: String,
        reason: Option<String>,
        admin_id: String,
    ) -> Result<FfiDonation, BloodBankError> {
        Ok(self
            .bank
            .reject_donation(&donation_id, reason.as_deref(), &admin_id)?
            .into())
    }

    /// Collect an approved donation into stock.
    pub fn complete_donation(&self, donation_id: String) -> Result<FfiDonationCompletion, BloodBankError> {
        Ok(self.bank.complete_donation(&donation_id)?.into())
    }

    // =========================================================================
    // Request Operations
    // =========================================================================

    /// Submit a hospital request.
    pub fn create_request(&self, request: FfiNewRequest) -> Result<FfiBloodRequest, BloodBankError> {
        let mut new = NewBloodRequest::new(
            request.hospital_name,
            request.blood_type.parse()?,
            request.quantity_ml,
        );
        new.is_emergency = request.is_emergency;
        new.notes = request.notes;
        Ok(self.bank.create_request(new)?.into())
    }

    pub fn get_request(&self, request_id: String) -> Result<FfiBloodRequest, BloodBankError> {
        Ok(self.bank.get_request(&request_id)?.into())
    }

    pub fn approve_request(&self, request_id: String, admin_id: String) -> Result<FfiBloodRequest, BloodBankError> {
        Ok(self.bank.approve_request(&request_id, &admin_id)?.into())
    }

    pub fn reject_request(
        &self,
        request_id: String,
        reason: Option<String>,
        admin_id: String,
    ) -> Result<FfiBloodRequest, BloodBankError> {
        Ok(self
            .bank
            .reject_request(&request_id, reason.as_deref(), &admin_id)?
            .into())
    }

    /// All requests, newest first.
    pub fn list_requests(&self) -> Result<Vec<FfiBloodRequest>, BloodBankError> {
        Ok(self.bank.list_requests()?.into_iter().map(Into::into).collect())
    }

    /// Open requests, emergencies first.
    pub fn list_pending_requests(&self) -> Result<Vec<FfiBloodRequest>, BloodBankError> {
        Ok(self
            .bank
            .list_pending_requests()?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Issue stock against a request.
    pub fn fulfill(&self, request_id: String) -> Result<FfiFulfillment, BloodBankError> {
        Ok(self.bank.fulfill(&request_id)?.into())
    }

    // =========================================================================
    // Stock Queries
    // =========================================================================

    pub fn availability(&self, blood_type: String) -> Result<i64, BloodBankError> {
        Ok(self.bank.availability_by_label(&blood_type)?)
    }

    pub fn availability_for_compatible_set(&self, blood_type: String) -> Result<i64, BloodBankError> {
        Ok(self.bank.availability_for_compatible_set(blood_type.parse()?)?)
    }

    pub fn distribution(&self) -> Result<Vec<FfiBloodTypeStock>, BloodBankError> {
        Ok(self.bank.distribution()?.into_iter().map(Into::into).collect())
    }

    pub fn inventory_summary(&self) -> Result<FfiInventorySummary, BloodBankError> {
        Ok(self.bank.inventory_summary()?.into())
    }

    /// Inventory report as JSON.
    pub fn inventory_report_json(&self) -> Result<String, BloodBankError> {
        Ok(self.bank.inventory_report()?.to_json()?)
    }

    /// Full ledger with chain status as JSON.
    pub fn audit_export_json(&self) -> Result<String, BloodBankError> {
        Ok(self.bank.audit_export(None)?.to_json()?)
    }

    pub fn verify_ledger(&self) -> Result<FfiChainStatus, BloodBankError> {
        Ok(self.bank.verify_ledger()?.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe donor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDonor {
    pub id: String,
    pub name: String,
    pub blood_type: String,
    pub last_donation_date: Option<String>,
    pub is_available: bool,
}

impl From<Donor> for FfiDonor {
    fn from(donor: Donor) -> Self {
        Self {
            id: donor.id,
            name: donor.name,
            blood_type: donor.blood_type.label().to_string(),
            last_donation_date: donor.last_donation_date.map(|d| d.to_string()),
            is_available: donor.is_available,
        }
    }
}

/// FFI-safe donation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDonation {
    pub id: String,
    pub donor_id: String,
    pub quantity_ml: i64,
    pub status: String,
    pub donation_date: String,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub completed_at: Option<String>,
}

impl From<Donation> for FfiDonation {
    fn from(donation: Donation) -> Self {
        Self {
            id: donation.id,
            donor_id: donation.donor_id,
            quantity_ml: donation.quantity_ml,
            status: donation.status.as_str().to_string(),
            donation_date: donation.donation_date.to_string(),
            notes: donation.notes,
            approved_by: donation.approved_by,
            completed_at: donation.completed_at,
        }
    }
}

/// FFI-safe donation completion result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDonationCompletion {
    pub donation_id: String,
    pub blood_type: String,
    pub quantity_ml: i64,
    pub available_ml: i64,
}

impl From<DonationCompletion> for FfiDonationCompletion {
    fn from(c: DonationCompletion) -> Self {
        Self {
            donation_id: c.donation_id,
            blood_type: c.blood_type.label().to_string(),
            quantity_ml: c.quantity_ml,
            available_ml: c.available_ml,
        }
    }
}

/// FFI-safe request input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewRequest {
    pub hospital_name: String,
    pub blood_type: String,
    pub quantity_ml: i64,
    pub is_emergency: bool,
    pub notes: Option<String>,
}

/// FFI-safe blood request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBloodRequest {
    pub id: String,
    pub hospital_name: String,
    pub requested_blood_type: String,
    pub quantity_ml: i64,
    pub status: String,
    pub is_emergency: bool,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub fulfilled_with: Option<String>,
    pub created_at: String,
}

impl From<BloodRequest> for FfiBloodRequest {
    fn from(request: BloodRequest) -> Self {
        Self {
            id: request.id,
            hospital_name: request.hospital_name,
            requested_blood_type: request.requested_blood_type.label().to_string(),
            quantity_ml: request.quantity_ml,
            status: request.status.as_str().to_string(),
            is_emergency: request.is_emergency,
            notes: request.notes,
            admin_notes: request.admin_notes,
            fulfilled_with: request.fulfilled_with.map(|t| t.label().to_string()),
            created_at: request.created_at,
        }
    }
}

/// FFI-safe fulfillment result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFulfillment {
    pub request_id: String,
    pub requested_blood_type: String,
    pub chosen_blood_type: String,
    pub quantity_ml: i64,
    pub remaining_ml: i64,
    pub substituted: bool,
}

impl From<FulfillmentOutcome> for FfiFulfillment {
    fn from(outcome: FulfillmentOutcome) -> Self {
        Self {
            request_id: outcome.request_id,
            requested_blood_type: outcome.requested_blood_type.label().to_string(),
            chosen_blood_type: outcome.chosen_blood_type.label().to_string(),
            quantity_ml: outcome.quantity_ml,
            remaining_ml: outcome.remaining_ml,
            substituted: outcome.substituted,
        }
    }
}

/// FFI-safe per-type stock line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBloodTypeStock {
    pub blood_type: String,
    pub description: String,
    pub donor_count: u32,
    pub completed_donations: u32,
    pub collected_ml: i64,
    pub issued_ml: i64,
    pub available_ml: i64,
    pub pending_request_count: u32,
    pub pending_request_ml: i64,
    pub status: String,
}

impl From<BloodTypeStock> for FfiBloodTypeStock {
    fn from(stock: BloodTypeStock) -> Self {
        Self {
            blood_type: stock.blood_type.label().to_string(),
            description: stock.description,
            donor_count: stock.donor_count,
            completed_donations: stock.completed_donations,
            collected_ml: stock.collected_ml,
            issued_ml: stock.issued_ml,
            available_ml: stock.available_ml,
            pending_request_count: stock.pending_request_count,
            pending_request_ml: stock.pending_request_ml,
            status: stock.status.label().to_string(),
        }
    }
}

/// FFI-safe inventory summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInventorySummary {
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

impl From<InventorySummary> for FfiInventorySummary {
    fn from(s: InventorySummary) -> Self {
        Self {
            total_collected_ml: s.total_collected_ml,
            total_issued_ml: s.total_issued_ml,
            total_available_ml: s.total_available_ml,
            completed_donations: s.completed_donations,
            total_donors: s.total_donors,
            available_donors: s.available_donors,
            total_requests: s.total_requests,
            pending_requests: s.pending_requests,
            approved_requests: s.approved_requests,
            fulfilled_requests: s.fulfilled_requests,
        }
    }
}

/// FFI-safe ledger chain status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainStatus {
    pub intact: bool,
    pub events: u64,
    pub head_hash: Option<String>,
    pub broken_at_sequence: Option<i64>,
    pub reason: Option<String>,
}

impl From<ChainStatus> for FfiChainStatus {
    fn from(status: ChainStatus) -> Self {
        match status {
            ChainStatus::Intact { events, head_hash } => Self {
                intact: true,
                events,
                head_hash,
                broken_at_sequence: None,
                reason: None,
            },
            ChainStatus::Broken { sequence, reason } => Self {
                intact: false,
                events: 0,
                head_hash: None,
                broken_at_sequence: Some(sequence),
                reason: Some(reason),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_round_trip_through_core() {
        let core = open_blood_bank_in_memory(true).unwrap();
        let donor = core
            .register_donor("Ada".into(), "o-".into(), None)
            .unwrap();
        assert_eq!(donor.blood_type, "O-");

        let donation = core
            .submit_donation(donor.id.clone(), 450, "2024-05-01".into())
            .unwrap();
        core.approve_donation(donation.id.clone(), "admin".into()).unwrap();
        let completion = core.complete_donation(donation.id.clone()).unwrap();
        assert_eq!(completion.available_ml, 450);
        assert!(!core.get_donor(donor.id.clone()).unwrap().is_available);
        // The 2024 donation is long past the cooldown.
        assert!(core.set_donor_availability(donor.id.clone(), true).unwrap().is_available);

        let request = core
            .create_request(FfiNewRequest {
                hospital_name: "General".into(),
                blood_type: "AB+".into(),
                quantity_ml: 300,
                is_emergency: true,
                notes: None,
            })
            .unwrap();
        let fulfilled = core.fulfill(request.id.clone()).unwrap();
        assert_eq!(fulfilled.chosen_blood_type, "O-");
        assert!(fulfilled.substituted);
        assert_eq!(fulfilled.remaining_ml, 150);

        assert_eq!(core.availability("O-".into()).unwrap(), 150);
        assert!(core.verify_ledger().unwrap().intact);
        assert_eq!(core.distribution().unwrap().len(), 8);
    }

    #[test]
    fn test_ffi_errors() {
        let core = open_blood_bank_in_memory(false).unwrap();
        assert!(matches!(
            core.availability("Z+".into()).unwrap_err(),
            BloodBankError::InvalidInput(_)
        ));
        assert!(matches!(
            core.submit_donation("x".into(), 100, "yesterday".into()).unwrap_err(),
            BloodBankError::InvalidInput(_)
        ));

        let request = core
            .create_request(FfiNewRequest {
                hospital_name: "General".into(),
                blood_type: "B-".into(),
                quantity_ml: 500,
                is_emergency: false,
                notes: None,
            })
            .unwrap();
        core.approve_request(request.id.clone(), "admin".into()).unwrap();
        match core.fulfill(request.id).unwrap_err() {
            BloodBankError::InsufficientStock {
                available_ml,
                shortfall_ml,
                compatible_types,
            } => {
                assert_eq!(available_ml, 0);
                assert_eq!(shortfall_ml, 500);
                assert_eq!(compatible_types, vec!["B-", "O-"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(
            fulfillment_priority("A+".into()).unwrap(),
            vec!["A+", "A-", "O+", "O-"]
        );
    }
}
