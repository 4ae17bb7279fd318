//! Inventory report: per-type distribution, totals and donation history.

use serde::{Deserialize, Serialize};

use crate::compatibility::compatible_types;
use crate::db::Database;
use crate::ledger::{Ledger, LedgerResult};
use crate::models::{
    BloodType, BloodTypeStock, DonationStatus, InventorySummary, MonthlyDonationStat,
    RequestStatus, StockStatus,
};

/// Months of donation history included in a report.
pub const REPORT_MONTHS: usize = 12;

/// Full inventory snapshot for operators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryReport {
    pub metadata: ReportMetadata,
    pub summary: InventorySummary,
    pub distribution: Vec<BloodTypeStock>,
    /// Completed donations per month, newest first
    pub monthly_donations: Vec<MonthlyDonationStat>,
}

/// Inventory report metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    /// Report format version
    pub format_version: String,
    /// Generation timestamp
    pub generated_at: String,
    /// Ledger events the report was derived from
    pub ledger_events: u64,
}

impl InventoryReport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Types currently below the low-stock threshold.
    pub fn shortages(&self) -> Vec<&BloodTypeStock> {
        self.distribution
            .iter()
            .filter(|s| s.status != StockStatus::Sufficient)
            .collect()
    }
}

/// Builds inventory views from a database.
pub struct InventoryReporter<'a> {
    db: &'a Database,
}

impl<'a> InventoryReporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn ledger(&self) -> Ledger<'a> {
        Ledger::new(self.db.conn())
    }

    /// One line per blood type, in canonical order.
    pub fn distribution(&self) -> LedgerResult<Vec<BloodTypeStock>> {
        let snapshot = self.ledger().snapshot()?;
        snapshot.check_non_negative(&BloodType::ALL)?;

        let donors = self.db.donor_counts()?;
        let completed = self.db.completed_donation_counts()?;
        let open_requests = self.db.open_request_totals()?;

        Ok(BloodType::ALL
            .iter()
            .map(|&t| {
                let totals = snapshot.totals(t);
                let (pending_request_count, pending_request_ml) = open_requests[t.index()];
                BloodTypeStock {
                    blood_type: t,
                    description: t.description().to_string(),
                    donor_count: donors[t.index()],
                    completed_donations: completed[t.index()],
                    collected_ml: totals.collected_ml,
                    issued_ml: totals.issued_ml,
                    available_ml: totals.available_ml(),
                    pending_request_count,
                    pending_request_ml,
                    status: StockStatus::from_available(totals.available_ml()),
                }
            })
            .collect())
    }

    /// Pool totals and workflow counts.
    pub fn summary(&self) -> LedgerResult<InventorySummary> {
        let ledger = self.ledger();
        let donors = self.db.donor_counts()?;

        Ok(InventorySummary {
            total_collected_ml: ledger.total_collected()?,
            total_issued_ml: ledger.total_issued()?,
            total_available_ml: ledger.total_available()?,
            completed_donations: self.db.count_donations(DonationStatus::Completed)?,
            total_donors: donors.iter().sum(),
            available_donors: self.db.available_donor_count()?,
            total_requests: self.db.total_requests()?,
            pending_requests: self.db.count_requests(RequestStatus::Pending)?,
            approved_requests: self.db.count_requests(RequestStatus::Approved)?,
            fulfilled_requests: self.db.count_requests(RequestStatus::Fulfilled)?,
        })
    }

    /// Stock that could be issued against a request for `recipient`.
    pub fn available_for_recipient(&self, recipient: BloodType) -> LedgerResult<i64> {
        self.ledger().available_ml_for_set(compatible_types(recipient))
    }

    pub fn report(&self) -> LedgerResult<InventoryReport> {
        Ok(InventoryReport {
            metadata: ReportMetadata {
                format_version: "1.0".to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                ledger_events: self.db.ledger_len()?,
            },
            summary: self.summary()?,
            distribution: self.distribution()?,
            monthly_donations: self.db.monthly_completed_donations(REPORT_MONTHS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodRequest, Donor, NewLedgerEvent};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_donor(&Donor::new("Ada".into(), BloodType::ONeg)).unwrap();
        db.insert_donor(&Donor::new("Bo".into(), BloodType::ONeg)).unwrap();
        db.insert_request(&BloodRequest::new("General".into(), BloodType::APos, 400))
            .unwrap();

        let ledger = Ledger::new(db.conn());
        ledger
            .append(&NewLedgerEvent::collected(BloodType::ONeg, 2500, None))
            .unwrap();
        ledger
            .append(&NewLedgerEvent::collected(BloodType::APos, 800, None))
            .unwrap();
        ledger
            .append(&NewLedgerEvent::issued(BloodType::ONeg, 300, None))
            .unwrap();
        db
    }

    #[test]
    fn test_distribution_lines() {
        let db = setup_db();
        let distribution = InventoryReporter::new(&db).distribution().unwrap();
        assert_eq!(distribution.len(), 8);

        let o_neg = &distribution[BloodType::ONeg.index()];
        assert_eq!(o_neg.blood_type, BloodType::ONeg);
        assert_eq!(o_neg.donor_count, 2);
        assert_eq!(o_neg.collected_ml, 2500);
        assert_eq!(o_neg.issued_ml, 300);
        assert_eq!(o_neg.available_ml, 2200);
        assert_eq!(o_neg.status, StockStatus::Sufficient);

        let a_pos = &distribution[BloodType::APos.index()];
        assert_eq!(a_pos.status, StockStatus::Critical);
        assert_eq!(a_pos.pending_request_count, 1);
        assert_eq!(a_pos.pending_request_ml, 400);

        assert_eq!(
            distribution[BloodType::BNeg.index()].status,
            StockStatus::OutOfStock
        );
    }

    #[test]
    fn test_summary_and_report() {
        let db = setup_db();
        let reporter = InventoryReporter::new(&db);

        let summary = reporter.summary().unwrap();
        assert_eq!(summary.total_collected_ml, 3300);
        assert_eq!(summary.total_issued_ml, 300);
        assert_eq!(summary.total_available_ml, 3000);
        assert_eq!(summary.total_donors, 2);
        assert_eq!(summary.pending_requests, 1);

        assert_eq!(reporter.available_for_recipient(BloodType::APos).unwrap(), 3000);
        assert_eq!(reporter.available_for_recipient(BloodType::ONeg).unwrap(), 2200);

        let report = reporter.report().unwrap();
        assert_eq!(report.metadata.ledger_events, 3);
        assert_eq!(report.shortages().len(), 7);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"total_available_ml\": 3000"));
        assert!(json.contains("\"O-\""));
    }
}
