use chrono::Utc;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use guard_rules::{Severity, Violation};

use crate::canonical::content_hash;
use crate::error::EvidenceError;
use crate::model::NewEvidence;
use crate::store::{EvidenceStore, VIOLATION_EVIDENCE};

fn open() -> (TempDir, EvidenceStore) {
    let dir = TempDir::new().unwrap();
    let store = EvidenceStore::open(dir.path()).unwrap();
    (dir, store)
}

fn criteria(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn open_creates_layout() {
    let (dir, _store) = open();
    assert!(dir.path().join("evidence").is_dir());
    assert!(dir.path().join("chains").is_dir());
}

#[test]
fn create_hashes_content_and_reads_back() {
    let (_dir, store) = open();
    let e = store
        .create(
            NewEvidence::new("transaction", "erp", json!({"amount": 100000, "approved": false}))
                .related_rule("FIN-001")
                .meta("department", "finance"),
        )
        .unwrap();

    assert!(e.id.starts_with('E'));
    assert_eq!(e.hash, content_hash(&json!({"approved": false, "amount": 100000})));
    assert_eq!(store.get(&e.id).unwrap(), e);
    assert!(store.exists(&e.id));
    assert_eq!(store.list_ids().unwrap(), vec![e.id]);
}

#[test]
fn stored_record_uses_type_key() {
    let (_dir, store) = open();
    let e = store.create(NewEvidence::new("document", "scan", json!("license.pdf"))).unwrap();
    let raw: Value =
        serde_json::from_slice(&std::fs::read(store.root().join("evidence").join(format!("{}.json", e.id))).unwrap())
            .unwrap();
    assert_eq!(raw["type"], "document");
    assert_eq!(raw["hash"], e.hash.as_str());
}

#[test]
fn existing_records_are_never_overwritten() {
    let (_dir, store) = open();
    let e = store.create(NewEvidence::new("t", "s", json!(1))).unwrap();

    let mut forged = e.clone();
    forged.content = json!(2);
    let path = store.root().join("evidence").join(format!("{}.json", e.id));
    let err = store.write_once(&path, &forged).unwrap_err();
    assert!(matches!(err, EvidenceError::AlreadyExists { .. }));
    assert_eq!(store.get(&e.id).unwrap().content, json!(1));
}

#[test]
fn temp_files_are_not_listed() {
    let (_dir, store) = open();
    store.create(NewEvidence::new("t", "s", json!(1))).unwrap();
    let leftovers: Vec<_> = std::fs::read_dir(store.root().join("evidence"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());
    assert_eq!(store.list_ids().unwrap().len(), 1);
}

#[test]
fn get_unknown_or_unsafe_id_is_not_found() {
    let (_dir, store) = open();
    assert!(matches!(store.get("E-nope"), Err(EvidenceError::NotFound(_))));
    assert!(matches!(store.get("../../etc/passwd"), Err(EvidenceError::NotFound(_))));
    assert!(!store.exists("../x"));
}

#[test]
fn search_matches_all_criteria() {
    let (_dir, store) = open();
    let a = store.create(NewEvidence::new("transaction", "erp", json!(1)).related_rule("R1")).unwrap();
    store.create(NewEvidence::new("transaction", "bank", json!(2)).related_rule("R1")).unwrap();
    store.create(NewEvidence::new("document", "erp", json!(3))).unwrap();

    let hits = store
        .search(&criteria(&[("type", json!("transaction")), ("source", json!("erp"))]))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, a.id);

    assert_eq!(store.search(&criteria(&[("related_rule", json!("R1"))])).unwrap().len(), 2);
    assert_eq!(store.search(&Map::new()).unwrap().len(), 3);
    assert!(store.search(&criteria(&[("type", json!("memo"))])).unwrap().is_empty());
}

#[test]
fn search_skips_corrupt_records() {
    let (_dir, store) = open();
    let good = store.create(NewEvidence::new("t", "s", json!(1))).unwrap();
    let bad = store.create(NewEvidence::new("t", "s", json!(2))).unwrap();
    std::fs::write(store.root().join("evidence").join(format!("{}.json", bad.id)), b"[").unwrap();

    let hits = store.search(&criteria(&[("type", json!("t"))])).unwrap();
    assert_eq!(hits.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec![good.id.as_str()]);
}

#[test]
fn record_violation_links_rule_and_subject() {
    let (_dir, store) = open();
    let violation = Violation {
        rule_id: "R1".to_string(),
        subject_id: "M-001".to_string(),
        timestamp: Utc::now(),
        severity: Severity::High,
        description: "registered_capital 50000 is below minimum threshold 100000".to_string(),
        evidence_refs: Vec::new(),
        suggested_actions: vec!["Request proof of paid-in capital".to_string()],
        details: json!({"field": "registered_capital", "value": 50000, "threshold": 100000}),
    };

    let e = store.record_violation(&violation, "compliance-check").unwrap();
    assert_eq!(e.evidence_type, VIOLATION_EVIDENCE);
    assert_eq!(e.related_rule.as_deref(), Some("R1"));
    assert_eq!(e.metadata["subject_id"], "M-001");
    assert_eq!(e.metadata["severity"], "high");
    assert_eq!(e.content["details"]["value"], 50000);
    assert!(store.verify(&e.id));

    let back: Violation = serde_json::from_value(e.content).unwrap();
    assert_eq!(back, violation);
}

/// Deterministic spread of doubles with long mantissas.
fn awkward_floats(n: usize) -> Vec<f64> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut out = vec![225.10518467164994, 987.2706605733833, 924.9462732253917, 1.0010000000000001, 0.1 + 0.2];
    for _ in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
        out.push(unit * 1000.0);
    }
    out
}

#[test]
fn fractional_content_verifies_after_reload() {
    let (dir, store) = open();
    let floats = awkward_floats(200);
    let mut ids = Vec::new();
    for chunk in floats.chunks(10) {
        let e = store
            .create(NewEvidence::new("measurement", "sensor", json!({"readings": chunk, "first": chunk[0]})))
            .unwrap();
        assert!(store.verify(&e.id), "{} failed to verify", e.id);
        ids.push(e.id);
    }

    let reopened = EvidenceStore::open(dir.path()).unwrap();
    for id in &ids {
        assert!(reopened.verify(id), "{id} failed to verify after reopen");
    }
    let e = reopened.get(&ids[0]).unwrap();
    assert_eq!(e.content["readings"][0].as_f64(), Some(225.10518467164994));
    assert_eq!(e.content["readings"][3].as_f64(), Some(1.0010000000000001));
}

#[test]
fn fractional_violation_details_verify() {
    let (_dir, store) = open();
    for observed in awkward_floats(20) {
        let violation = Violation {
            rule_id: "R2".to_string(),
            subject_id: "M-002".to_string(),
            timestamp: Utc::now(),
            severity: Severity::Medium,
            description: format!("debt_ratio {observed} exceeds maximum threshold 0.7"),
            evidence_refs: Vec::new(),
            suggested_actions: Vec::new(),
            details: json!({"field": "debt_ratio", "observed": observed, "bound": "max", "threshold": 0.7}),
        };
        let e = store.record_violation(&violation, "compliance-check").unwrap();
        assert!(store.verify(&e.id), "observed {observed} broke verification");
        assert_eq!(store.get(&e.id).unwrap().content["details"]["observed"].as_f64(), Some(observed));
    }
}

#[derive(serde::Serialize)]
struct Metric {
    name: &'static str,
    ratio: f64,
}

#[test]
fn non_finite_content_is_rejected() {
    let (_dir, store) = open();
    for ratio in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = store
            .create(NewEvidence::new("metric", "calc", Metric { name: "coverage", ratio }))
            .unwrap_err();
        match err {
            EvidenceError::Serialization(msg) => assert!(msg.contains("ratio"), "{msg}"),
            other => panic!("expected serialization error, got {other:?}"),
        }
    }
    assert!(store.list_ids().unwrap().is_empty());

    let nested = vec![vec![1.0, 2.0], vec![f64::NAN]];
    assert!(matches!(
        store.create(NewEvidence::new("metric", "calc", nested)),
        Err(EvidenceError::Serialization(_))
    ));
}
