//! Hospital blood request models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::blood_type::BloodType;

/// Blood request status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    /// Submitted by a hospital, awaiting admin review
    Pending,
    /// Approved by an admin, awaiting fulfillment
    Approved,
    /// Rejected by an admin (terminal)
    Rejected,
    /// Stock issued against the request (terminal)
    Fulfilled,
}

/// Operator action on a blood request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Approve,
    Reject,
    Fulfill,
}

/// Whether fulfillment requires a prior approval.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillPolicy {
    /// Only `Approved` requests may be fulfilled.
    #[default]
    RequireApproval,
    /// `Pending` requests may be fulfilled directly.
    AllowPending,
}

/// A status transition that the request state machine does not permit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {action:?} a request in status {from:?}")]
pub struct InvalidRequestTransition {
    pub from: RequestStatus,
    pub action: RequestAction,
}

impl RequestStatus {
    /// Apply an action, returning the next status.
    pub fn transition(
        self,
        action: RequestAction,
        policy: FulfillPolicy,
    ) -> Result<RequestStatus, InvalidRequestTransition> {
        use RequestAction::*;
        use RequestStatus::*;

        match (self, action) {
            (Pending, Approve) => Ok(Approved),
            (Pending | Approved, Reject) => Ok(Rejected),
            (Approved, Fulfill) => Ok(Fulfilled),
            (Pending, Fulfill) if policy == FulfillPolicy::AllowPending => Ok(Fulfilled),
            (from, action) => Err(InvalidRequestTransition { from, action }),
        }
    }

    /// Statuses from which fulfillment is allowed under `policy`.
    pub fn fulfillable(policy: FulfillPolicy) -> &'static [RequestStatus] {
        match policy {
            FulfillPolicy::RequireApproval => &[RequestStatus::Approved],
            FulfillPolicy::AllowPending => &[RequestStatus::Pending, RequestStatus::Approved],
        }
    }

    /// Whether the request still awaits a decision or fulfillment.
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Fulfilled => "fulfilled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            "fulfilled" => Some(RequestStatus::Fulfilled),
            _ => None,
        }
    }
}

/// A hospital's request for a quantity of blood.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodRequest {
    /// Unique request ID
    pub id: String,
    /// Requesting hospital
    pub hospital_name: String,
    /// Blood type the patient needs
    pub requested_blood_type: BloodType,
    /// Requested quantity in millilitres
    pub quantity_ml: i64,
    /// Current status
    pub status: RequestStatus,
    /// Emergency requests are listed first for review
    pub is_emergency: bool,
    /// Notes from the hospital
    pub notes: Option<String>,
    /// Notes from the reviewing admin (e.g. rejection reason)
    pub admin_notes: Option<String>,
    /// Blood type actually issued, set on fulfillment
    pub fulfilled_with: Option<BloodType>,
    /// Approval (or rejection) timestamp
    pub approved_at: Option<String>,
    /// Admin who approved or rejected
    pub approved_by: Option<String>,
    /// Fulfillment timestamp
    pub fulfilled_at: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl BloodRequest {
    /// Create a new pending request.
    pub fn new(hospital_name: String, requested_blood_type: BloodType, quantity_ml: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            hospital_name,
            requested_blood_type,
            quantity_ml,
            status: RequestStatus::Pending,
            is_emergency: false,
            notes: None,
            admin_notes: None,
            fulfilled_with: None,
            approved_at: None,
            approved_by: None,
            fulfilled_at: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether the request was fulfilled with a type other than the one requested.
    pub fn was_substituted(&self) -> bool {
        self.fulfilled_with
            .is_some_and(|used| used != self.requested_blood_type)
    }
}
