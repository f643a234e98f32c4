//! Evidence chains: ordered, write-once derivation paths over stored evidence.

use std::io;

use chrono::Utc;
use tracing::info;

use crate::error::{EvidenceError, Result};
use crate::id::{is_valid_id, next_id, CHAIN_PREFIX};
use crate::model::{EvidenceChain, ResolvedChain};
use crate::store::{list_record_ids, read_record, EvidenceStore, CHAINS_DIR};

impl EvidenceStore {
    /// Persist a chain over `evidence_ids` in the given order.
    ///
    /// Every id must name stored evidence; the chain holds ids only.
    pub fn create_chain(
        &self,
        evidence_ids: &[String],
        conclusion: &str,
        risk_level: &str,
        reviewer: &str,
    ) -> Result<EvidenceChain> {
        if evidence_ids.is_empty() {
            return Err(EvidenceError::EmptyChain);
        }
        let unknown: Vec<String> = evidence_ids.iter().filter(|id| !self.exists(id)).cloned().collect();
        if !unknown.is_empty() {
            return Err(EvidenceError::UnknownEvidence(unknown));
        }

        let timestamp = Utc::now();
        let mut chain = EvidenceChain {
            id: next_id(CHAIN_PREFIX, timestamp),
            evidence_ids: evidence_ids.to_vec(),
            conclusion: conclusion.to_string(),
            risk_level: risk_level.to_string(),
            timestamp,
            reviewer: reviewer.to_string(),
        };

        let mut attempts = 0;
        loop {
            match self.write_once(&self.chain_path(&chain.id), &chain) {
                Ok(()) => break,
                Err(EvidenceError::AlreadyExists { .. }) if attempts < 16 => {
                    attempts += 1;
                    chain.id = next_id(CHAIN_PREFIX, timestamp);
                }
                Err(e) => return Err(e),
            }
        }

        info!(chain_id = %chain.id, members = chain.evidence_ids.len(), "created evidence chain");
        Ok(chain)
    }

    /// The stored chain record (ids only).
    pub fn get_chain_record(&self, id: &str) -> Result<EvidenceChain> {
        if !is_valid_id(id) {
            return Err(EvidenceError::ChainNotFound(id.to_string()));
        }
        read_record(&self.chain_path(id), id).map_err(|e| match e {
            EvidenceError::Io(io) if io.kind() == io::ErrorKind::NotFound => EvidenceError::ChainNotFound(id.to_string()),
            other => other,
        })
    }

    /// A chain with every member evidence loaded, in chain order.
    pub fn get_chain(&self, id: &str) -> Result<ResolvedChain> {
        let chain = self.get_chain_record(id)?;
        let evidence = chain
            .evidence_ids
            .iter()
            .map(|eid| self.get(eid))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResolvedChain { chain, evidence })
    }

    pub fn list_chain_ids(&self) -> Result<Vec<String>> {
        list_record_ids(&self.root().join(CHAINS_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewEvidence;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, EvidenceStore) {
        let dir = TempDir::new().unwrap();
        let store = EvidenceStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn chain_preserves_order_and_resolves_members() {
        let (_dir, store) = store();
        let e1 = store.create(NewEvidence::new("transaction", "ledger", json!({"amount": 100000}))).unwrap();
        let e2 = store.create(NewEvidence::new("approval", "oa", json!({"status": "rejected"}))).unwrap();
        let e3 = store.create(NewEvidence::new("memo", "mail", json!("follow-up"))).unwrap();

        let ids = vec![e3.id.clone(), e1.id.clone(), e2.id.clone()];
        let chain = store.create_chain(&ids, "unauthorised payment", "high", "auditor").unwrap();
        assert!(chain.id.starts_with('C'));
        assert_eq!(chain.edges(), vec![(e3.id.as_str(), e1.id.as_str()), (e1.id.as_str(), e2.id.as_str())]);

        let resolved = store.get_chain(&chain.id).unwrap();
        assert_eq!(resolved.chain, chain);
        let types: Vec<&str> = resolved.evidence.iter().map(|e| e.evidence_type.as_str()).collect();
        assert_eq!(types, vec!["memo", "transaction", "approval"]);
        assert!(resolved.to_dot().contains(&format!("\"{}\" -> \"{}\"", e3.id, e1.id)));
        assert_eq!(store.list_chain_ids().unwrap(), vec![chain.id]);
    }

    #[test]
    fn empty_and_unknown_members_are_rejected() {
        let (_dir, store) = store();
        assert!(matches!(store.create_chain(&[], "c", "low", "r"), Err(EvidenceError::EmptyChain)));

        let e1 = store.create(NewEvidence::new("t", "s", json!(1))).unwrap();
        let err = store
            .create_chain(&[e1.id.clone(), "E-missing".to_string()], "c", "low", "r")
            .unwrap_err();
        match err {
            EvidenceError::UnknownEvidence(ids) => assert_eq!(ids, vec!["E-missing"]),
            other => panic!("unexpected: {other}"),
        }
        assert!(store.list_chain_ids().unwrap().is_empty());
    }

    #[test]
    fn missing_chain_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.get_chain("C-nope"), Err(EvidenceError::ChainNotFound(_))));
        assert!(matches!(store.get_chain("../x"), Err(EvidenceError::ChainNotFound(_))));
    }

    #[test]
    fn chains_are_write_once() {
        let (_dir, store) = store();
        let e1 = store.create(NewEvidence::new("t", "s", json!(1))).unwrap();
        let chain = store.create_chain(&[e1.id], "c", "low", "r").unwrap();
        let again = store.write_once(&store.chain_path(&chain.id), &chain);
        assert!(matches!(again, Err(EvidenceError::AlreadyExists { .. })));
    }
}
