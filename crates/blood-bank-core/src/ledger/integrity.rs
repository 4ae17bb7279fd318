//! Hash-chain verification for the append-only ledger.

use serde::{Deserialize, Serialize};

use super::{Ledger, LedgerResult};
use crate::db::chain_hash;

/// Outcome of walking the ledger's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    /// Every event links to its predecessor and hashes to its stored value.
    Intact { events: u64, head_hash: Option<String> },
    /// First event whose links or hash do not match.
    Broken { sequence: i64, reason: String },
}

impl ChainStatus {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainStatus::Intact { .. })
    }
}

impl Ledger<'_> {
    /// Recompute the chain from the first event and report the first break.
    pub fn verify_chain(&self) -> LedgerResult<ChainStatus> {
        let events = self.events()?;
        let mut expected_prev = String::new();
        let mut expected_sequence = 1i64;

        for event in &events {
            let broken = |reason: String| {
                tracing::error!(sequence = event.sequence, %reason, "ledger chain broken");
                ChainStatus::Broken {
                    sequence: event.sequence,
                    reason,
                }
            };

            if event.sequence != expected_sequence {
                return Ok(broken(format!("expected sequence {}", expected_sequence)));
            }
            if event.prev_hash != expected_prev {
                return Ok(broken("previous hash does not match".into()));
            }
            let recomputed = chain_hash(&event.prev_hash, &event.to_canonical_json()?);
            if recomputed != event.hash {
                return Ok(broken("event hash does not match its contents".into()));
            }

            expected_prev = event.hash.clone();
            expected_sequence += 1;
        }

        Ok(ChainStatus::Intact {
            events: events.len() as u64,
            head_hash: events.last().map(|e| e.hash.clone()),
        })
    }
}
