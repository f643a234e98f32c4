//! The shipped declarations under `data/rules/` load cleanly and behave as
//! documented against `data/sample-merchant.json`.

use std::path::PathBuf;
use std::sync::Arc;

use guard_core::config::EvaluationConfig;
use guard_core::SubjectRecord;
use guard_rules::validation::validate_declarations;
use guard_rules::{ComplianceChecker, RiskScorer, RiskStatus, RuleEvaluator, RuleLoader, RuleRegistry};

/// Integration tests run from the crate directory, so go up two levels.
fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

fn sample_record() -> SubjectRecord {
    let raw = std::fs::read_to_string(data_dir().join("sample-merchant.json")).unwrap();
    SubjectRecord::from_value(serde_json::from_str(&raw).unwrap()).unwrap()
}

#[test]
fn shipped_declarations_validate() {
    let loader = RuleLoader::new(data_dir().join("rules"));
    let scan = loader.scan().unwrap();
    let result = validate_declarations(&scan.declarations);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty());
    assert_eq!(scan.declarations.len(), 5);
}

#[test]
fn sample_merchant_report() {
    let loader = RuleLoader::new(data_dir().join("rules"));
    let registry = Arc::new(RuleRegistry::new().with_source(Arc::new(loader)));
    assert_eq!(registry.reload().unwrap(), 5);

    let config = EvaluationConfig::default();
    let evaluator = RuleEvaluator::new(Arc::clone(&registry), &config).unwrap();
    let checker = ComplianceChecker::new(Arc::new(evaluator), RiskScorer::from_config(&config));

    let report = checker.check_subject(&sample_record(), None);
    assert_eq!(report.subject_id, "M-001");
    assert_eq!(report.rules_evaluated, 5);
    assert!(report.skipped.is_empty());

    let violated: Vec<&str> = report.violations.iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(violated, vec!["FIN-001", "QUA-001", "RSK-001", "RSK-002"]);
    // (1.0 + 1.0 + 1.0 + 0.3) * 100 / 4
    assert_eq!(report.risk_score, 82.5);
    assert_eq!(report.status, RiskStatus::HighRisk);

    let financial_only = checker.check_subject(&sample_record(), Some("financial"));
    assert_eq!(financial_only.rules_evaluated, 2);
    assert_eq!(financial_only.violations.len(), 1);
}
