//! Donor and donation models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::blood_type::BloodType;

/// A registered donor. Only the fields the stock ledger depends on are kept here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donor {
    /// Unique donor ID
    pub id: String,
    /// Donor name
    pub name: String,
    /// Blood type; every completed donation is credited to it
    pub blood_type: BloodType,
    /// Date of the last completed donation
    pub last_donation_date: Option<NaiveDate>,
    /// Cleared once a donation completes
    pub is_available: bool,
    /// Creation timestamp
    pub created_at: String,
}

impl Donor {
    pub fn new(name: String, blood_type: BloodType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            blood_type,
            last_donation_date: None,
            is_available: true,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Days left before the donor may give again, or `None` if eligible on `today`.
    pub fn days_until_eligible(&self, today: NaiveDate, cooldown_days: i64) -> Option<i64> {
        let last = self.last_donation_date?;
        let elapsed = (today - last).num_days();
        (elapsed < cooldown_days).then(|| cooldown_days - elapsed)
    }
}

/// Donation status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DonationStatus {
    /// Scheduled by the donor
    Pending,
    /// Cleared by an admin (cooldown checked here)
    Approved,
    /// Declined by an admin (terminal)
    Rejected,
    /// Blood collected and credited to stock (terminal)
    Completed,
}

/// Operator action on a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationAction {
    Approve,
    Reject,
    Complete,
}

/// A status transition that the donation state machine does not permit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {action:?} a donation in status {from:?}")]
pub struct InvalidDonationTransition {
    pub from: DonationStatus,
    pub action: DonationAction,
}

impl DonationStatus {
    /// Apply an action, returning the next status.
    pub fn transition(self, action: DonationAction) -> Result<DonationStatus, InvalidDonationTransition> {
        use DonationAction::*;
        use DonationStatus::*;

        match (self, action) {
            (Pending, Approve) => Ok(Approved),
            (Pending | Approved, Reject) => Ok(Rejected),
            (Approved, Complete) => Ok(Completed),
            (from, action) => Err(InvalidDonationTransition { from, action }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Approved => "approved",
            DonationStatus::Rejected => "rejected",
            DonationStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DonationStatus::Pending),
            "approved" => Some(DonationStatus::Approved),
            "rejected" => Some(DonationStatus::Rejected),
            "completed" => Some(DonationStatus::Completed),
            _ => None,
        }
    }
}

/// A single blood donation by a donor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    /// Unique donation ID
    pub id: String,
    /// Donor local ID
    pub donor_id: String,
    /// Collected quantity in millilitres
    pub quantity_ml: i64,
    /// Current status
    pub status: DonationStatus,
    /// Scheduled or actual collection date
    pub donation_date: NaiveDate,
    /// Free-form notes (rejection reason lands here)
    pub notes: Option<String>,
    /// Approval timestamp
    pub approved_at: Option<String>,
    /// Admin who approved or rejected
    pub approved_by: Option<String>,
    /// Completion timestamp
    pub completed_at: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl Donation {
    pub fn new(donor_id: String, quantity_ml: i64, donation_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            donor_id,
            quantity_ml,
            status: DonationStatus::Pending,
            donation_date,
            notes: None,
            approved_at: None,
            approved_by: None,
            completed_at: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_donation_lifecycle() {
        let s = DonationStatus::Pending
            .transition(DonationAction::Approve)
            .unwrap();
        assert_eq!(s, DonationStatus::Approved);
        let s = s.transition(DonationAction::Complete).unwrap();
        assert_eq!(s, DonationStatus::Completed);
    }

    #[test]
    fn test_complete_requires_approval() {
        let err = DonationStatus::Pending
            .transition(DonationAction::Complete)
            .unwrap_err();
        assert_eq!(err.from, DonationStatus::Pending);
        assert!(DonationStatus::Rejected
            .transition(DonationAction::Complete)
            .is_err());
        assert!(DonationStatus::Completed
            .transition(DonationAction::Complete)
            .is_err());
    }

    #[test]
    fn test_cooldown() {
        let mut donor = Donor::new("Ada".into(), BloodType::ONeg);
        assert_eq!(donor.days_until_eligible(date(2024, 6, 1), 90), None);

        donor.last_donation_date = Some(date(2024, 5, 1));
        assert_eq!(donor.days_until_eligible(date(2024, 6, 1), 90), Some(59));
        assert_eq!(donor.days_until_eligible(date(2024, 7, 30), 90), None);
    }

    #[test]
    fn test_status_string_roundtrip() {
        for s in [
            DonationStatus::Pending,
            DonationStatus::Approved,
            DonationStatus::Rejected,
            DonationStatus::Completed,
        ] {
            assert_eq!(DonationStatus::parse(s.as_str()), Some(s));
        }
    }
}
