//! Request fulfillment.

use serde::{Deserialize, Serialize};

use super::{not_found, BankError, BankResult, BloodBank};
use crate::compatibility::compatible_types;
use crate::db;
use crate::engine;
use crate::ledger::Ledger;
use crate::models::{BloodType, NewLedgerEvent, RequestAction};

/// Result of a successful fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentOutcome {
    pub request_id: String,
    pub requested_blood_type: BloodType,
    pub chosen_blood_type: BloodType,
    pub quantity_ml: i64,
    /// Availability of the chosen type after the issue was committed
    pub remaining_ml: i64,
    pub substituted: bool,
}

impl BloodBank {
    /// Issue stock against a request from a single compatible type.
    ///
    /// On success exactly one `Issued` event is appended and the request is
    /// `Fulfilled` in the same transaction. On any error nothing is written.
    pub fn fulfill(&self, request_id: &str) -> BankResult<FulfillmentOutcome> {
        let policy = self.config.fulfill_policy;

        // The requested type never changes, so it can be read before locking.
        let requested = self
            .db()?
            .get_request(request_id)?
            .ok_or_else(|| not_found("request", request_id))?
            .requested_blood_type;
        let compatible = compatible_types(requested);
        let _stock = self.locks.acquire(compatible)?;

        // Read, decide and write under one IMMEDIATE transaction; other
        // connections on the same file serialise here.
        let mut db = self.db()?;
        let tx = db.transaction()?;
        let request =
            db::get_request(&tx, request_id)?.ok_or_else(|| not_found("request", request_id))?;
        request
            .status
            .transition(RequestAction::Fulfill, policy)
            .map_err(|e| BankError::InvalidState(e.to_string()))?;

        let ledger = Ledger::new(&tx);
        let snapshot = ledger.snapshot()?;
        snapshot.check_non_negative(compatible)?;

        let allocation = match engine::allocate(requested, request.quantity_ml, &snapshot) {
            Ok(allocation) => allocation,
            Err(shortfall) => {
                tracing::warn!(
                    request_id,
                    requested = %requested,
                    quantity_ml = request.quantity_ml,
                    available_ml = shortfall.available_ml,
                    shortfall_ml = shortfall.shortfall_ml,
                    "insufficient compatible stock"
                );
                return Err(BankError::InsufficientStock {
                    available_ml: shortfall.available_ml,
                    shortfall_ml: shortfall.shortfall_ml,
                    compatible_types: shortfall.compatible_types,
                });
            }
        };

        ledger.append(&NewLedgerEvent::issued(
            allocation.chosen,
            allocation.quantity_ml,
            Some(request.id.clone()),
        ))?;
        if !db::fulfill_request(&tx, &request.id, request.status, allocation.chosen)? {
            return Err(BankError::InvalidState(format!(
                "request {} changed status during fulfillment",
                request.id
            )));
        }
        let remaining_ml = ledger.available_ml(allocation.chosen)?;
        tx.commit()?;

        tracing::info!(
            request_id,
            requested = %requested,
            chosen = %allocation.chosen,
            quantity_ml = allocation.quantity_ml,
            remaining_ml,
            substituted = allocation.is_substitution(),
            "request fulfilled"
        );

        Ok(FulfillmentOutcome {
            request_id: request.id,
            requested_blood_type: requested,
            chosen_blood_type: allocation.chosen,
            quantity_ml: allocation.quantity_ml,
            remaining_ml,
            substituted: allocation.is_substitution(),
        })
    }
}
