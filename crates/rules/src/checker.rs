//! Compliance checker: batch evaluation, scoring and recommendations for one subject.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use guard_core::SubjectRecord;

use crate::evaluator::{RuleEvaluator, SkippedRule};
use crate::registry::RuleSet;
use crate::schema::{Severity, Violation};
use crate::scoring::{RiskScorer, RiskStatus};

/// Result of [`ComplianceChecker::check_subject`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub report_id: String,
    pub subject_id: String,
    pub checked_at: DateTime<Utc>,
    pub status: RiskStatus,
    pub risk_score: f64,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
    pub summary: String,
    pub rules_evaluated: usize,
    /// Rules that could not be evaluated; not counted as violations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRule>,
}

impl CheckReport {
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct ComplianceChecker {
    evaluator: Arc<RuleEvaluator>,
    scorer: RiskScorer,
}

impl ComplianceChecker {
    pub fn new(evaluator: Arc<RuleEvaluator>, scorer: RiskScorer) -> Self {
        Self { evaluator, scorer }
    }

    pub fn evaluator(&self) -> &Arc<RuleEvaluator> {
        &self.evaluator
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    /// Evaluate all enabled rules (optionally of one category) against `record`.
    pub fn check_subject(&self, record: &SubjectRecord, category: Option<&str>) -> CheckReport {
        let rules = self.evaluator.registry().snapshot();
        let outcome = self.evaluator.evaluate_batch_on(&rules, record, category);

        let risk_score = self.scorer.score(&outcome.violations);
        let status = self.scorer.status(risk_score);
        let recommendations = recommendations(&rules, &outcome.violations);
        let summary = summarize(outcome.evaluated, &outcome.violations, outcome.skipped.len(), risk_score);

        CheckReport {
            report_id: Uuid::new_v4().to_string(),
            subject_id: record.subject_id.clone(),
            checked_at: Utc::now(),
            status,
            risk_score,
            violations: outcome.violations,
            recommendations,
            summary,
            rules_evaluated: outcome.evaluated,
            skipped: outcome.skipped,
        }
    }
}

/// One line per violated rule, keyed on its category; deduplicated in
/// first-seen order. Unknown categories fall back to the violation's actions.
pub fn recommendations(rules: &RuleSet, violations: &[Violation]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |line: String| {
        if !out.contains(&line) {
            out.push(line);
        }
    };

    for v in violations {
        let Some(registered) = rules.get(&v.rule_id) else {
            v.suggested_actions.iter().cloned().for_each(&mut push);
            continue;
        };
        let rule = &registered.rule;
        match rule.category.as_str() {
            "financial" => push(format!("Strengthen financial controls, in particular around {}", rule.name)),
            "qualification" => push(format!("Provide or renew the qualification documents for {}", rule.name)),
            "risk" => push(format!("Tighten risk controls related to {}", rule.name)),
            _ => v.suggested_actions.iter().cloned().for_each(&mut push),
        }
    }
    out
}

fn summarize(evaluated: usize, violations: &[Violation], skipped: usize, risk_score: f64) -> String {
    let mut summary = format!("{} check(s) executed; ", evaluated);
    if violations.is_empty() {
        summary.push_str("no violations found.");
    } else {
        summary.push_str(&format!("{} violation(s) found", violations.len()));
        let high = violations.iter().filter(|v| v.severity == Severity::High).count();
        if high > 0 {
            summary.push_str(&format!(", {} of them high severity", high));
        }
        summary.push_str(&format!("; overall risk score {}.", risk_score));
    }
    if skipped > 0 {
        summary.push_str(&format!(" {} rule(s) could not be evaluated.", skipped));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RuleRegistry;
    use crate::schema::Rule;
    use crate::scoring::ScoringMode;
    use guard_core::config::EvaluationConfig;
    use serde_json::json;

    fn checker() -> ComplianceChecker {
        let registry = Arc::new(RuleRegistry::new());
        registry.register_batch(vec![
            Rule::new("R1", "registered capital", "financial", "threshold", Severity::High)
                .with_param("min_registered_capital", 100000),
            Rule::new("R2", "debt ratio", "financial", "threshold", Severity::Low)
                .with_param("max_debt_ratio", 0.7),
            Rule::new("Q1", "business licence", "qualification", "checklist", Severity::Medium)
                .with_param("required_items", json!(["business_licence"])),
            Rule::new("O1", "opening hours", "operations", "time_window", Severity::Low)
                .with_param("allowed_ranges", json!({"weekday": ["09:00", "18:00"]}))
                .with_actions(vec!["Restrict trading to opening hours".into()]),
        ]);
        let evaluator = RuleEvaluator::new(registry, &EvaluationConfig::default()).unwrap();
        ComplianceChecker::new(Arc::new(evaluator), RiskScorer::new(ScoringMode::MeanWeight))
    }

    #[test]
    fn clean_subject_is_low_risk() {
        let record = SubjectRecord::new("M-1")
            .with("registered_capital", 200000)
            .with("debt_ratio", 0.2)
            .with("items", json!(["business_licence"]));
        let report = checker().check_subject(&record, None);

        assert!(report.is_compliant());
        assert_eq!(report.risk_score, 0.0);
        assert_eq!(report.status, RiskStatus::LowRisk);
        assert_eq!(report.rules_evaluated, 4);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.summary, "4 check(s) executed; no violations found.");
    }

    #[test]
    fn violations_drive_score_status_and_recommendations() {
        let record = SubjectRecord::new("M-2")
            .with("registered_capital", 50000)
            .with("debt_ratio", 0.9)
            .with("items", json!([]))
            .with("time_series", json!([["2024-01-03T23:00:00", 1]]));
        let report = checker().check_subject(&record, None);

        assert_eq!(report.violations.len(), 4);
        // (1.0 + 0.3 + 0.6 + 0.3) * 100 / 4
        assert_eq!(report.risk_score, 55.0);
        assert_eq!(report.status, RiskStatus::MediumRisk);
        assert_eq!(
            report.recommendations,
            vec![
                "Strengthen financial controls, in particular around registered capital",
                "Strengthen financial controls, in particular around debt ratio",
                "Provide or renew the qualification documents for business licence",
                "Restrict trading to opening hours",
            ]
        );
        assert!(report.summary.contains("4 violation(s) found, 1 of them high severity"));
    }

    #[test]
    fn category_filter_limits_the_check() {
        let record = SubjectRecord::new("M-3").with("registered_capital", 1);
        let report = checker().check_subject(&record, Some("financial"));
        assert_eq!(report.rules_evaluated, 2);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.risk_score, 100.0);
        assert_eq!(report.status, RiskStatus::HighRisk);
    }

    #[test]
    fn recommendations_are_deduplicated() {
        let checker = checker();
        let rules = checker.evaluator().registry().snapshot();
        let record = SubjectRecord::new("M").with("registered_capital", 1);
        let v = checker.evaluator().evaluate_rule("R1", &record).unwrap().unwrap();
        let recs = recommendations(&rules, &[v.clone(), v]);
        assert_eq!(recs.len(), 1);
    }
}
