//! Ledger event models.

use serde::{Deserialize, Serialize};

use super::blood_type::BloodType;

/// Direction of a ledger event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LedgerEventKind {
    /// Blood entered the pool (a completed donation)
    Collected,
    /// Blood left the pool (a fulfilled request), recorded against the type used
    Issued,
}

impl LedgerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEventKind::Collected => "collected",
            LedgerEventKind::Issued => "issued",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "collected" => Some(LedgerEventKind::Collected),
            "issued" => Some(LedgerEventKind::Issued),
            _ => None,
        }
    }
}

/// An event not yet appended to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLedgerEvent {
    pub blood_type: BloodType,
    pub kind: LedgerEventKind,
    pub quantity_ml: i64,
    /// Source donation for `Collected`
    pub donation_id: Option<String>,
    /// Source request for `Issued`
    pub request_id: Option<String>,
}

impl NewLedgerEvent {
    pub fn collected(blood_type: BloodType, quantity_ml: i64, donation_id: Option<String>) -> Self {
        Self {
            blood_type,
            kind: LedgerEventKind::Collected,
            quantity_ml,
            donation_id,
            request_id: None,
        }
    }

    pub fn issued(blood_type: BloodType, quantity_ml: i64, request_id: Option<String>) -> Self {
        Self {
            blood_type,
            kind: LedgerEventKind::Issued,
            quantity_ml,
            donation_id: None,
            request_id,
        }
    }
}

/// An immutable, appended ledger event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEvent {
    /// Unique event ID
    pub id: String,
    /// Append position, starting at 1
    pub sequence: i64,
    pub blood_type: BloodType,
    pub kind: LedgerEventKind,
    pub quantity_ml: i64,
    pub donation_id: Option<String>,
    pub request_id: Option<String>,
    /// Append timestamp
    pub recorded_at: String,
    /// Hash of the preceding event (empty for the first)
    pub prev_hash: String,
    /// SHA-256 over `prev_hash` and the canonical payload
    pub hash: String,
}

/// Fields covered by an event's hash, in fixed order.
#[derive(Serialize)]
pub(crate) struct LedgerEventPayload<'a> {
    pub id: &'a str,
    pub sequence: i64,
    pub blood_type: BloodType,
    pub kind: LedgerEventKind,
    pub quantity_ml: i64,
    pub donation_id: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub recorded_at: &'a str,
}

impl LedgerEvent {
    /// Signed contribution to available stock.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            LedgerEventKind::Collected => self.quantity_ml,
            LedgerEventKind::Issued => -self.quantity_ml,
        }
    }

    /// Serialize the hashed fields to canonical JSON.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&LedgerEventPayload {
            id: &self.id,
            sequence: self.sequence,
            blood_type: self.blood_type,
            kind: self.kind,
            quantity_ml: self.quantity_ml,
            donation_id: self.donation_id.as_deref(),
            request_id: self.request_id.as_deref(),
            recorded_at: &self.recorded_at,
        })
    }
}
