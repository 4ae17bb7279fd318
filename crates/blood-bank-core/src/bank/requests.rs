//! Hospital request workflow.

use super::{not_found, BankError, BankResult, BloodBank};
use crate::db;
use crate::models::{BloodRequest, BloodType, RequestAction, RequestStatus};

/// Largest single request accepted, in millilitres.
pub const MAX_REQUEST_ML: i64 = 10_000;

/// Fields a hospital supplies when requesting blood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBloodRequest {
    pub hospital_name: String,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub is_emergency: bool,
    pub notes: Option<String>,
}

impl NewBloodRequest {
    pub fn new(hospital_name: impl Into<String>, blood_type: BloodType, quantity_ml: i64) -> Self {
        Self {
            hospital_name: hospital_name.into(),
            blood_type,
            quantity_ml,
            is_emergency: false,
            notes: None,
        }
    }

    pub fn emergency(mut self) -> Self {
        self.is_emergency = true;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl BloodBank {
    /// Record a new pending request.
    pub fn create_request(&self, new: NewBloodRequest) -> BankResult<BloodRequest> {
        if !(1..=MAX_REQUEST_ML).contains(&new.quantity_ml) {
            return Err(BankError::InvalidQuantity(new.quantity_ml));
        }
        if new.hospital_name.trim().is_empty() {
            return Err(BankError::InvalidState("hospital name is required".into()));
        }

        let mut request = BloodRequest::new(new.hospital_name, new.blood_type, new.quantity_ml);
        request.is_emergency = new.is_emergency;
        request.notes = new.notes;

        self.db()?.insert_request(&request)?;
        tracing::info!(
            request_id = %request.id,
            blood_type = %request.requested_blood_type,
            quantity_ml = request.quantity_ml,
            emergency = request.is_emergency,
            "request created"
        );
        Ok(request)
    }

    pub fn approve_request(&self, id: &str, admin_id: &str) -> BankResult<BloodRequest> {
        self.review(id, RequestAction::Approve, admin_id, None)
    }

    pub fn reject_request(&self, id: &str, reason: Option<&str>, admin_id: &str) -> BankResult<BloodRequest> {
        self.review(id, RequestAction::Reject, admin_id, reason)
    }

    fn review(
        &self,
        id: &str,
        action: RequestAction,
        admin_id: &str,
        admin_notes: Option<&str>,
    ) -> BankResult<BloodRequest> {
        let db = self.db()?;
        let request = db.get_request(id)?.ok_or_else(|| not_found("request", id))?;
        let next = request
            .status
            .transition(action, self.config.fulfill_policy)
            .map_err(|e| BankError::InvalidState(e.to_string()))?;

        if !db::review_request(db.conn(), id, request.status, next, admin_id, admin_notes)? {
            return Err(BankError::InvalidState(format!(
                "request {} changed status during review",
                id
            )));
        }
        tracing::info!(
            request_id = id,
            from = request.status.as_str(),
            to = next.as_str(),
            admin_id,
            "request reviewed"
        );

        db.get_request(id)?.ok_or_else(|| not_found("request", id))
    }

    pub fn get_request(&self, id: &str) -> BankResult<BloodRequest> {
        self.db()?
            .get_request(id)?
            .ok_or_else(|| not_found("request", id))
    }

    /// All requests, newest first.
    pub fn list_requests(&self) -> BankResult<Vec<BloodRequest>> {
        Ok(self.db()?.list_requests()?)
    }

    /// Pending and approved requests, emergencies first, then oldest first.
    pub fn list_pending_requests(&self) -> BankResult<Vec<BloodRequest>> {
        Ok(self.db()?.list_open_requests()?)
    }

    /// Requests in one status.
    pub fn list_requests_by_status(&self, status: RequestStatus) -> BankResult<Vec<BloodRequest>> {
        Ok(self
            .list_requests()?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }
}
