//! Ledger audit export with chain verification.

use serde::{Deserialize, Serialize};

use crate::ledger::{ChainStatus, Ledger, LedgerResult};
use crate::models::{BloodType, LedgerEvent};

/// Full ledger dump for auditors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerAuditExport {
    pub metadata: AuditMetadata,
    /// Events in append order
    pub events: Vec<LedgerEvent>,
}

/// Audit export metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditMetadata {
    /// Export format version
    pub format_version: String,
    /// Export timestamp
    pub exported_at: String,
    /// Hash algorithm used for the event chain
    pub hash_algorithm: String,
    /// Result of verifying the whole chain at export time
    pub chain: ChainStatus,
    /// Type filter, if the export covers one type only
    pub blood_type: Option<BloodType>,
}

impl LedgerAuditExport {
    /// Export every event, verifying the chain first.
    pub fn from_ledger(ledger: &Ledger<'_>) -> LedgerResult<Self> {
        Ok(Self {
            metadata: AuditMetadata::new(ledger.verify_chain()?, None),
            events: ledger.events()?,
        })
    }

    /// Export the events of one type. The chain status still covers the whole ledger.
    pub fn for_blood_type(ledger: &Ledger<'_>, blood_type: BloodType) -> LedgerResult<Self> {
        Ok(Self {
            metadata: AuditMetadata::new(ledger.verify_chain()?, Some(blood_type)),
            events: ledger.events_for(blood_type)?,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Net stock movement across the exported events.
    pub fn net_ml(&self) -> i64 {
        self.events.iter().map(LedgerEvent::signed_quantity).sum()
    }
}

impl AuditMetadata {
    fn new(chain: ChainStatus, blood_type: Option<BloodType>) -> Self {
        Self {
            format_version: "1.0".to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            hash_algorithm: "SHA-256".to_string(),
            chain,
            blood_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::NewLedgerEvent;

    #[test]
    fn test_audit_export() {
        let db = Database::open_in_memory().unwrap();
        let ledger = Ledger::new(db.conn());
        ledger
            .append(&NewLedgerEvent::collected(BloodType::BPos, 450, None))
            .unwrap();
        ledger
            .append(&NewLedgerEvent::collected(BloodType::ANeg, 300, None))
            .unwrap();
        ledger
            .append(&NewLedgerEvent::issued(BloodType::BPos, 200, None))
            .unwrap();

        let export = LedgerAuditExport::from_ledger(&ledger).unwrap();
        assert_eq!(export.events.len(), 3);
        assert!(export.metadata.chain.is_intact());
        assert_eq!(export.net_ml(), 550);

        let b_pos = LedgerAuditExport::for_blood_type(&ledger, BloodType::BPos).unwrap();
        assert_eq!(b_pos.events.len(), 2);
        assert_eq!(b_pos.net_ml(), 250);
        assert_eq!(b_pos.metadata.blood_type, Some(BloodType::BPos));

        let json = export.to_json().unwrap();
        let parsed: LedgerAuditExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, export);
    }
}
