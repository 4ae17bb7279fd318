//! Donor registration and the donation workflow.
//!
//! Completing a donation is the only way stock enters the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{not_found, BankError, BankResult, BloodBank};
use crate::db;
use crate::ledger::Ledger;
use crate::models::{
    BloodType, Donation, DonationAction, DonationStatus, Donor, NewLedgerEvent,
};

/// Largest single donation accepted, in millilitres.
pub const MAX_DONATION_ML: i64 = 1_000;

/// Stock credited by a completed donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationCompletion {
    pub donation_id: String,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    /// Availability of `blood_type` after the collection was committed
    pub available_ml: i64,
}

impl BloodBank {
    pub fn register_donor(
        &self,
        name: &str,
        blood_type: BloodType,
        last_donation_date: Option<NaiveDate>,
    ) -> BankResult<Donor> {
        if name.trim().is_empty() {
            return Err(BankError::InvalidState("donor name is required".into()));
        }
        let mut donor = Donor::new(name.trim().to_string(), blood_type);
        donor.last_donation_date = last_donation_date;

        self.db()?.insert_donor(&donor)?;
        tracing::info!(donor_id = %donor.id, blood_type = %blood_type, "donor registered");
        Ok(donor)
    }

    pub fn get_donor(&self, id: &str) -> BankResult<Donor> {
        self.db()?.get_donor(id)?.ok_or_else(|| not_found("donor", id))
    }

    /// Schedule a donation for an existing donor.
    pub fn submit_donation(
        &self,
        donor_id: &str,
        quantity_ml: i64,
        donation_date: NaiveDate,
    ) -> BankResult<Donation> {
        if !(1..=MAX_DONATION_ML).contains(&quantity_ml) {
            return Err(BankError::InvalidQuantity(quantity_ml));
        }
        let db = self.db()?;
        if db.get_donor(donor_id)?.is_none() {
            return Err(not_found("donor", donor_id));
        }

        let donation = Donation::new(donor_id.to_string(), quantity_ml, donation_date);
        db.insert_donation(&donation)?;
        tracing::info!(
            donation_id = %donation.id,
            donor_id,
            quantity_ml,
            "donation submitted"
        );
        Ok(donation)
    }

    pub fn get_donation(&self, id: &str) -> BankResult<Donation> {
        self.db()?
            .get_donation(id)?
            .ok_or_else(|| not_found("donation", id))
    }

    /// Donations in one status, newest first.
    pub fn list_donations(&self, status: DonationStatus) -> BankResult<Vec<Donation>> {
        Ok(self.db()?.list_donations_by_status(status)?)
    }

    /// Approve a pending donation, checking the donor's cooldown against today.
    pub fn approve_donation(&self, id: &str, admin_id: &str) -> BankResult<Donation> {
        self.approve_donation_on(id, admin_id, chrono::Utc::now().date_naive())
    }

    /// Approve a pending donation, checking the donor's cooldown against `today`.
    pub fn approve_donation_on(&self, id: &str, admin_id: &str, today: NaiveDate) -> BankResult<Donation> {
        let db = self.db()?;
        let donation = db.get_donation(id)?.ok_or_else(|| not_found("donation", id))?;
        let next = donation
            .status
            .transition(DonationAction::Approve)
            .map_err(|e| BankError::InvalidState(e.to_string()))?;

        let donor = db
            .get_donor(&donation.donor_id)?
            .ok_or_else(|| not_found("donor", &donation.donor_id))?;
        if let Some(days_remaining) = donor.days_until_eligible(today, self.config.donor_cooldown_days) {
            tracing::warn!(
                donation_id = id,
                donor_id = %donor.id,
                days_remaining,
                "donor not yet eligible"
            );
            return Err(BankError::DonorNotEligible {
                donor_id: donor.id,
                days_remaining,
            });
        }

        if !db::transition_donation(db.conn(), id, donation.status, next, Some(admin_id), None)? {
            return Err(BankError::InvalidState(format!(
                "donation {} changed status during approval",
                id
            )));
        }
        tracing::info!(donation_id = id, admin_id, "donation approved");

        db.get_donation(id)?.ok_or_else(|| not_found("donation", id))
    }

    /// Reject a pending or approved donation.
    pub fn reject_donation(&self, id: &str, reason: Option<&str>, admin_id: &str) -> BankResult<Donation> {
        let db = self.db()?;
        let donation = db.get_donation(id)?.ok_or_else(|| not_found("donation", id))?;
        let next = donation
            .status
            .transition(DonationAction::Reject)
            .map_err(|e| BankError::InvalidState(e.to_string()))?;

        if !db::transition_donation(db.conn(), id, donation.status, next, Some(admin_id), reason)? {
            return Err(BankError::InvalidState(format!(
                "donation {} changed status during rejection",
                id
            )));
        }
        tracing::info!(donation_id = id, admin_id, reason, "donation rejected");

        db.get_donation(id)?.ok_or_else(|| not_found("donation", id))
    }

    /// Mark a donor available or unavailable for future donations, as of today.
    pub fn set_donor_availability(&self, id: &str, available: bool) -> BankResult<Donor> {
        self.set_donor_availability_on(id, available, chrono::Utc::now().date_naive())
    }

    /// Mark a donor available or unavailable as of `today`.
    ///
    /// Becoming available again is refused with `DonorNotEligible` until the
    /// cooldown since the last donation has passed. Withdrawing is always allowed.
    pub fn set_donor_availability_on(
        &self,
        id: &str,
        available: bool,
        today: NaiveDate,
    ) -> BankResult<Donor> {
        let db = self.db()?;
        let donor = db.get_donor(id)?.ok_or_else(|| not_found("donor", id))?;
        if available && !donor.is_available {
            if let Some(days_remaining) = donor.days_until_eligible(today, self.config.donor_cooldown_days) {
                tracing::warn!(donor_id = id, days_remaining, "donor not yet eligible");
                return Err(BankError::DonorNotEligible {
                    donor_id: donor.id,
                    days_remaining,
                });
            }
        }

        if !db::set_donor_availability(db.conn(), id, available)? {
            return Err(not_found("donor", id));
        }
        tracing::info!(donor_id = id, available, "donor availability updated");

        db.get_donor(id)?.ok_or_else(|| not_found("donor", id))
    }

    /// Collect an approved donation into stock.
    ///
    /// Appends one `Collected` event for the donor's type, marks the donation
    /// completed and records the donation date on the donor, all in one
    /// transaction. Completing twice fails with `AlreadyCompleted` and writes
    /// nothing.
    pub fn complete_donation(&self, id: &str) -> BankResult<DonationCompletion> {
        let blood_type = {
            let db = self.db()?;
            let donation = db.get_donation(id)?.ok_or_else(|| not_found("donation", id))?;
            db.get_donor(&donation.donor_id)?
                .ok_or_else(|| not_found("donor", &donation.donor_id))?
                .blood_type
        };
        let _stock = self.locks.acquire(&[blood_type])?;

        let mut db = self.db()?;
        let tx = db.transaction()?;
        let donation = db::get_donation(&tx, id)?.ok_or_else(|| not_found("donation", id))?;
        match donation.status.transition(DonationAction::Complete) {
            Ok(_) => {}
            Err(_) if donation.status == DonationStatus::Completed => {
                return Err(BankError::AlreadyCompleted(id.to_string()));
            }
            Err(e) => return Err(BankError::InvalidState(e.to_string())),
        }

        let ledger = Ledger::new(&tx);
        ledger.append(&NewLedgerEvent::collected(
            blood_type,
            donation.quantity_ml,
            Some(donation.id.clone()),
        ))?;
        if !db::transition_donation(
            &tx,
            id,
            DonationStatus::Approved,
            DonationStatus::Completed,
            None,
            None,
        )? {
            return Err(BankError::InvalidState(format!(
                "donation {} changed status during completion",
                id
            )));
        }
        if !db::mark_donor_donated(&tx, &donation.donor_id, donation.donation_date)? {
            return Err(not_found("donor", &donation.donor_id));
        }
        let available_ml = ledger.available_ml(blood_type)?;
        tx.commit()?;

        tracing::info!(
            donation_id = id,
            blood_type = %blood_type,
            quantity_ml = donation.quantity_ml,
            available_ml,
            "donation completed"
        );

        Ok(DonationCompletion {
            donation_id: donation.id,
            blood_type,
            quantity_ml: donation.quantity_ml,
            available_ml,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankConfig;
    use crate::models::FulfillPolicy;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn approved_donation(bank: &BloodBank, t: BloodType, qty: i64) -> Donation {
        let donor = bank.register_donor("Ada", t, None).unwrap();
        let donation = bank.submit_donation(&donor.id, qty, date(2024, 5, 1)).unwrap();
        bank.approve_donation(&donation.id, "admin").unwrap()
    }

    #[test]
    fn test_complete_credits_donor_type() {
        let bank = BloodBank::open_in_memory().unwrap();
        let donation = approved_donation(&bank, BloodType::BPos, 450);

        let completion = bank.complete_donation(&donation.id).unwrap();
        assert_eq!(completion.blood_type, BloodType::BPos);
        assert_eq!(completion.available_ml, 450);
        assert_eq!(bank.availability(BloodType::BPos).unwrap(), 450);

        let stored = bank.get_donation(&donation.id).unwrap();
        assert_eq!(stored.status, DonationStatus::Completed);
        assert!(stored.completed_at.is_some());

        let donor = bank.get_donor(&donation.donor_id).unwrap();
        assert_eq!(donor.last_donation_date, Some(date(2024, 5, 1)));
        assert!(!donor.is_available);
    }

    #[test]
    fn test_complete_twice_is_idempotent() {
        let bank = BloodBank::open_in_memory().unwrap();
        let donation = approved_donation(&bank, BloodType::ONeg, 500);

        bank.complete_donation(&donation.id).unwrap();
        let err = bank.complete_donation(&donation.id).unwrap_err();
        assert!(matches!(err, BankError::AlreadyCompleted(_)));
        assert_eq!(bank.availability(BloodType::ONeg).unwrap(), 500);
    }

    #[test]
    fn test_complete_requires_approval() {
        let bank = BloodBank::open_in_memory().unwrap();
        let donor = bank.register_donor("Ben", BloodType::APos, None).unwrap();
        let donation = bank.submit_donation(&donor.id, 300, date(2024, 5, 1)).unwrap();

        assert!(matches!(
            bank.complete_donation(&donation.id).unwrap_err(),
            BankError::InvalidState(_)
        ));

        bank.reject_donation(&donation.id, Some("low iron"), "admin").unwrap();
        assert!(matches!(
            bank.complete_donation(&donation.id).unwrap_err(),
            BankError::InvalidState(_)
        ));
        assert_eq!(bank.availability(BloodType::APos).unwrap(), 0);
        assert!(matches!(
            bank.complete_donation("missing").unwrap_err(),
            BankError::NotFound(_)
        ));
    }

    #[test]
    fn test_cooldown_checked_at_approval() {
        let bank = BloodBank::open(BankConfig::in_memory(FulfillPolicy::RequireApproval)).unwrap();
        let donor = bank
            .register_donor("Cy", BloodType::AbPos, Some(date(2024, 1, 1)))
            .unwrap();
        let donation = bank.submit_donation(&donor.id, 400, date(2024, 3, 1)).unwrap();

        let err = bank
            .approve_donation_on(&donation.id, "admin", date(2024, 3, 1))
            .unwrap_err();
        match err {
            BankError::DonorNotEligible { days_remaining, .. } => assert_eq!(days_remaining, 30),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            bank.get_donation(&donation.id).unwrap().status,
            DonationStatus::Pending
        );

        let approved = bank
            .approve_donation_on(&donation.id, "admin", date(2024, 3, 31))
            .unwrap();
        assert_eq!(approved.status, DonationStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_submit_validation() {
        let bank = BloodBank::open_in_memory().unwrap();
        let donor = bank.register_donor("Di", BloodType::ANeg, None).unwrap();

        for qty in [0, MAX_DONATION_ML + 1] {
            assert!(matches!(
                bank.submit_donation(&donor.id, qty, date(2024, 1, 1)).unwrap_err(),
                BankError::InvalidQuantity(_)
            ));
        }
        assert!(matches!(
            bank.submit_donation("nobody", 100, date(2024, 1, 1)).unwrap_err(),
            BankError::NotFound(_)
        ));
        assert!(matches!(
            bank.register_donor("  ", BloodType::ANeg, None).unwrap_err(),
            BankError::InvalidState(_)
        ));
    }

    #[test]
    fn test_donor_availability_respects_cooldown() {
        let bank = BloodBank::open_in_memory().unwrap();
        let donor = bank.register_donor("Eli", BloodType::OPos, None).unwrap();
        let donation = bank.submit_donation(&donor.id, 450, date(2024, 1, 1)).unwrap();
        bank.approve_donation_on(&donation.id, "admin", date(2024, 1, 1)).unwrap();
        bank.complete_donation(&donation.id).unwrap();
        assert!(!bank.get_donor(&donor.id).unwrap().is_available);
        assert_eq!(bank.inventory_summary().unwrap().available_donors, 0);

        match bank
            .set_donor_availability_on(&donor.id, true, date(2024, 2, 1))
            .unwrap_err()
        {
            BankError::DonorNotEligible { days_remaining, .. } => assert_eq!(days_remaining, 59),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!bank.get_donor(&donor.id).unwrap().is_available);

        let donor = bank
            .set_donor_availability_on(&donor.id, true, date(2024, 3, 31))
            .unwrap();
        assert!(donor.is_available);
        assert_eq!(bank.inventory_summary().unwrap().available_donors, 1);

        // Withdrawing never waits on the cooldown.
        let donor = bank
            .set_donor_availability_on(&donor.id, false, date(2024, 4, 1))
            .unwrap();
        assert!(!donor.is_available);
        assert!(matches!(
            bank.set_donor_availability("missing", true).unwrap_err(),
            BankError::NotFound(_)
        ));
    }

    #[test]
    fn test_complete_rolls_back_when_donor_not_updated() {
        let bank = BloodBank::open_in_memory().unwrap();
        let donation = approved_donation(&bank, BloodType::BNeg, 400);
        bank.db()
            .unwrap()
            .conn()
            .execute_batch(
                "CREATE TEMP TRIGGER donors_frozen BEFORE UPDATE ON donors
                 BEGIN SELECT RAISE(IGNORE); END;",
            )
            .unwrap();

        assert!(matches!(
            bank.complete_donation(&donation.id).unwrap_err(),
            BankError::NotFound(_)
        ));
        assert_eq!(
            bank.get_donation(&donation.id).unwrap().status,
            DonationStatus::Approved
        );
        assert!(bank.ledger_events(None).unwrap().is_empty());
    }
}
