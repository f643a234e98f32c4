//! Integrity verification: recompute the content digest and compare.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::canonical::content_hash;
use crate::error::{EvidenceError, Result};
use crate::model::Evidence;
use crate::store::EvidenceStore;

/// Verification outcome for one evidence record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    Intact,
    /// Stored hash differs from the recomputed one.
    Mismatch { stored: String, computed: String },
    Missing,
    /// The record no longer parses.
    Unreadable { reason: String },
}

impl Integrity {
    pub fn is_intact(&self) -> bool {
        matches!(self, Integrity::Intact)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub evidence_id: String,
    pub integrity: Integrity,
}

/// Per-member results for a chain; the chain is trusted only if every member is intact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainIntegrity {
    pub chain_id: String,
    pub members: Vec<IntegrityReport>,
}

impl ChainIntegrity {
    pub fn is_trusted(&self) -> bool {
        self.members.iter().all(|m| m.integrity.is_intact())
    }
}

fn check(evidence: &Evidence) -> Integrity {
    let computed = content_hash(&evidence.content);
    if computed == evidence.hash {
        Integrity::Intact
    } else {
        Integrity::Mismatch {
            stored: evidence.hash.clone(),
            computed,
        }
    }
}

impl EvidenceStore {
    /// Detailed integrity of one record.
    pub fn inspect(&self, id: &str) -> Integrity {
        match self.get(id) {
            Ok(evidence) => check(&evidence),
            Err(EvidenceError::NotFound(_)) => Integrity::Missing,
            Err(e) => Integrity::Unreadable { reason: e.to_string() },
        }
    }

    /// `true` iff the evidence exists and its content still hashes to the
    /// stored digest. Missing evidence is `false`; see [`exists`](Self::exists).
    pub fn verify(&self, id: &str) -> bool {
        let integrity = self.inspect(id);
        if let Integrity::Mismatch { stored, computed } = &integrity {
            warn!(evidence_id = %id, %stored, %computed, "evidence integrity mismatch");
        }
        integrity.is_intact()
    }

    pub fn verify_chain(&self, chain_id: &str) -> Result<ChainIntegrity> {
        let chain = self.get_chain_record(chain_id)?;
        let members = chain
            .evidence_ids
            .iter()
            .map(|id| IntegrityReport {
                evidence_id: id.clone(),
                integrity: self.inspect(id),
            })
            .collect();
        Ok(ChainIntegrity {
            chain_id: chain.id,
            members,
        })
    }

    /// Inspect every stored record, for scheduled audits.
    pub fn verify_all(&self) -> Result<Vec<IntegrityReport>> {
        Ok(self
            .list_ids()?
            .into_iter()
            .map(|id| {
                let integrity = self.inspect(&id);
                IntegrityReport {
                    evidence_id: id,
                    integrity,
                }
            })
            .collect())
    }
}
