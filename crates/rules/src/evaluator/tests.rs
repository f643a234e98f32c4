use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use guard_core::config::EvaluationConfig;
use guard_core::SubjectRecord;

use super::*;
use crate::diagnostics::{ExecutionPhase, LogQueryParams};
use crate::registry::RuleRegistry;
use crate::schema::{Rule, Severity};

fn capital_rule() -> Rule {
    Rule::new("R1", "Registered capital floor", "financial", "threshold", Severity::High)
        .with_param("min_registered_capital", 100000)
        .with_actions(vec!["Request proof of paid-in capital".to_string()])
}

fn evaluator(rules: Vec<Rule>) -> RuleEvaluator {
    let registry = Arc::new(RuleRegistry::new());
    registry.register_batch(rules);
    RuleEvaluator::new(registry, &EvaluationConfig::default()).unwrap()
}

#[test]
fn single_rule_violation_carries_subject_and_actions() {
    let eval = evaluator(vec![capital_rule()]);
    let data = SubjectRecord::new("M-001").with("registered_capital", 50000);

    let v = eval.evaluate_rule("R1", &data).unwrap().expect("violation");
    assert_eq!(v.rule_id, "R1");
    assert_eq!(v.subject_id, "M-001");
    assert_eq!(v.severity, Severity::High);
    assert_eq!(v.description, "registered_capital 50000 is below minimum threshold 100000");
    assert_eq!(v.suggested_actions, vec!["Request proof of paid-in capital"]);
    assert_eq!(v.details["threshold"], 100000);

    let ok = SubjectRecord::new("M-002").with("registered_capital", 100000);
    assert!(eval.evaluate_rule("R1", &ok).unwrap().is_none());
}

#[test]
fn single_rule_errors_fail_fast() {
    let eval = evaluator(vec![
        capital_rule(),
        Rule::new("X1", "x", "misc", "tarot", Severity::Low),
    ]);
    let data = SubjectRecord::new("M").with("registered_capital", "plenty");

    assert_eq!(
        eval.evaluate_rule("nope", &data).unwrap_err(),
        EvalError::RuleNotFound("nope".to_string())
    );
    assert_eq!(
        eval.evaluate_rule("X1", &data).unwrap_err(),
        EvalError::UnsupportedCheckMethod {
            rule_id: "X1".to_string(),
            method: "tarot".to_string()
        }
    );
    assert!(matches!(
        eval.evaluate_rule("R1", &data),
        Err(EvalError::Check { source: CheckError::InvalidData { .. }, .. })
    ));
}

#[test]
fn disabled_rule_short_circuits() {
    let eval = evaluator(vec![capital_rule().disabled(), Rule::new("X1", "x", "misc", "tarot", Severity::Low).disabled()]);
    let data = SubjectRecord::new("M").with("registered_capital", 1);
    assert!(eval.evaluate_rule("R1", &data).unwrap().is_none());
    // Never dispatched, so the unknown method is not reported either.
    assert!(eval.evaluate_rule("X1", &data).unwrap().is_none());

    let outcome = eval.evaluate_batch(&data, None);
    assert_eq!(outcome.evaluated, 0);
    assert!(outcome.violations.is_empty());
}

#[test]
fn batch_of_ten_with_one_failure_keeps_the_rest() {
    let mut rules: Vec<Rule> = (0..9)
        .map(|i| {
            Rule::new(format!("T{i}"), format!("floor {i}"), "financial", "threshold", Severity::Medium)
                .with_param(format!("min_f{i}"), 10)
        })
        .collect();
    rules.insert(4, Rule::new("BAD", "bad data", "financial", "threshold", Severity::High).with_param("max_note", 1));
    let eval = evaluator(rules);

    let mut data = SubjectRecord::new("M-9").with("note", "not a number");
    for i in 0..9 {
        data = data.with(format!("f{i}"), if i % 2 == 0 { 1 } else { 100 });
    }

    let outcome = eval.evaluate_batch(&data, None);
    assert_eq!(outcome.evaluated, 10);
    let ids: Vec<&str> = outcome.violations.iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["T0", "T2", "T4", "T6", "T8"]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].rule_id, "BAD");
    assert_eq!(outcome.skipped[0].phase, ExecutionPhase::Evaluation);

    let logged = eval.diagnostics().query("BAD", &LogQueryParams::default());
    assert_eq!(logged.len(), 1);
    assert!(logged[0].message.contains("note"));
}

#[test]
fn batch_filters_by_category_and_skips_unsupported() {
    let eval = evaluator(vec![
        capital_rule(),
        Rule::new("Q1", "licences", "qualification", "checklist", Severity::Low)
            .with_param("required_items", json!(["licence"])),
        Rule::new("X1", "x", "qualification", "tarot", Severity::Low),
    ]);
    let data = SubjectRecord::new("M").with("registered_capital", 1).with("items", json!([]));

    let financial = eval.evaluate_batch(&data, Some("financial"));
    assert_eq!(financial.evaluated, 1);
    assert_eq!(financial.violations.len(), 1);

    let qualification = eval.evaluate_batch(&data, Some("qualification"));
    assert_eq!(qualification.violations.len(), 1);
    assert_eq!(qualification.skipped[0].phase, ExecutionPhase::Skipped);

    assert!(eval.evaluate_batch(&data, Some("unknown")).violations.is_empty());
}

#[test]
fn expired_deadline_is_a_timeout_failure() {
    let registered = RegisteredRule::new(capital_rule());
    let data = SubjectRecord::new("M").with("registered_capital", 1);
    let deadline = Deadline::after(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(2));

    let err = evaluate_registered(&registered, &data, deadline).unwrap_err();
    assert_eq!(err.phase(), ExecutionPhase::Timeout);
}

#[test]
fn panics_become_per_rule_failures() {
    let result: Result<(), EvalError> = isolate("P1", || panic!("strategy blew up"));
    assert_eq!(
        result.unwrap_err(),
        EvalError::Panicked {
            rule_id: "P1".to_string(),
            message: "strategy blew up".to_string()
        }
    );

    let formatted: Result<(), EvalError> = isolate("P2", || panic!("bad value {}", 7));
    assert!(matches!(formatted, Err(EvalError::Panicked { ref message, .. }) if message == "bad value 7"));
}

#[test]
fn reload_mid_batch_does_not_affect_a_held_snapshot() {
    let registry = Arc::new(RuleRegistry::new());
    registry.register(capital_rule());
    let eval = RuleEvaluator::new(Arc::clone(&registry), &EvaluationConfig::default()).unwrap();

    let data = SubjectRecord::new("M").with("registered_capital", 1);
    let held = registry.snapshot();
    registry.remove("R1");

    assert!(held.get("R1").is_some());
    assert_eq!(eval.evaluate_batch(&data, None).evaluated, 0);
}

#[test]
fn batch_on_a_held_snapshot_ignores_later_registry_changes() {
    let registry = Arc::new(RuleRegistry::new());
    registry.register(capital_rule());
    let eval = RuleEvaluator::new(Arc::clone(&registry), &EvaluationConfig::default()).unwrap();
    let data = SubjectRecord::new("M").with("registered_capital", 1);

    let held = registry.snapshot();
    registry.remove("R1");
    registry.register(
        Rule::new("R9", "Minimum employees", "qualification", "threshold", Severity::Low)
            .with_param("min_employee_count", 10),
    );

    let outcome = eval.evaluate_batch_on(&held, &data, None);
    assert_eq!(outcome.evaluated, 1);
    assert_eq!(outcome.violations.len(), 1);
    assert_eq!(outcome.violations[0].rule_id, "R1");
    assert!(outcome.skipped.is_empty());

    // The live registry has moved on.
    let live = eval.evaluate_batch(&data, None);
    assert_eq!(live.evaluated, 1);
    assert!(live.violations.iter().all(|v| v.rule_id != "R1"));
}
