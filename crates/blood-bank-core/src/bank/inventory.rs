//! Read-only stock queries. Nothing here takes the stock locks.

use super::{BankResult, BloodBank};
use crate::db;
use crate::export::{InventoryReport, InventoryReporter, LedgerAuditExport};
use crate::ledger::{ChainStatus, Ledger};
use crate::models::{BloodType, BloodTypeStock, InventorySummary, LedgerEvent};

impl BloodBank {
    /// Collected minus issued for one type.
    pub fn availability(&self, blood_type: BloodType) -> BankResult<i64> {
        let db = self.db()?;
        Ok(Ledger::new(db.conn()).available_ml(blood_type)?)
    }

    /// Availability for a type given as a label such as `"AB-"`.
    pub fn availability_by_label(&self, label: &str) -> BankResult<i64> {
        self.availability(label.parse()?)
    }

    /// Stock that could be issued to a recipient of `blood_type`.
    pub fn availability_for_compatible_set(&self, blood_type: BloodType) -> BankResult<i64> {
        let db = self.db()?;
        Ok(InventoryReporter::new(&db).available_for_recipient(blood_type)?)
    }

    pub fn distribution(&self) -> BankResult<Vec<BloodTypeStock>> {
        let db = self.db()?;
        Ok(InventoryReporter::new(&db).distribution()?)
    }

    pub fn inventory_summary(&self) -> BankResult<InventorySummary> {
        let db = self.db()?;
        Ok(InventoryReporter::new(&db).summary()?)
    }

    pub fn inventory_report(&self) -> BankResult<InventoryReport> {
        let db = self.db()?;
        Ok(InventoryReporter::new(&db).report()?)
    }

    /// Recompute the ledger's hash chain.
    pub fn verify_ledger(&self) -> BankResult<ChainStatus> {
        let db = self.db()?;
        let status = Ledger::new(db.conn()).verify_chain()?;
        if let ChainStatus::Intact { events, .. } = &status {
            tracing::debug!(events, "ledger chain verified");
        }
        Ok(status)
    }

    pub fn ledger_events(&self, blood_type: Option<BloodType>) -> BankResult<Vec<LedgerEvent>> {
        Ok(self.db()?.list_ledger_events(blood_type)?)
    }

    pub fn audit_export(&self, blood_type: Option<BloodType>) -> BankResult<LedgerAuditExport> {
        let db = self.db()?;
        let ledger = Ledger::new(db.conn());
        let export = match blood_type {
            Some(t) => LedgerAuditExport::for_blood_type(&ledger, t)?,
            None => LedgerAuditExport::from_ledger(&ledger)?,
        };
        Ok(export)
    }

    /// The `Issued` event recorded for a request, if it was fulfilled.
    pub fn issue_for_request(&self, request_id: &str) -> BankResult<Option<LedgerEvent>> {
        let db = self.db()?;
        Ok(db::find_issue_for_request(db.conn(), request_id)?)
    }
}
