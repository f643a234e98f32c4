//! Parallel batch evaluation with per-rule fault isolation.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use guard_core::SubjectRecord;

use crate::diagnostics::{ExecutionPhase, LogLevel};
use crate::registry::{RegisteredRule, RuleSet};
use crate::schema::Violation;

use super::{evaluate_registered, isolate, EvalError, RuleEvaluator};

/// A rule left out of a batch result, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedRule {
    pub rule_id: String,
    pub phase: ExecutionPhase,
    pub reason: String,
}

/// Result of one batch: violations in rule registration order plus the
/// rules that could not be evaluated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub violations: Vec<Violation>,
    pub skipped: Vec<SkippedRule>,
    /// Enabled rules attempted (passed, violated or skipped).
    pub evaluated: usize,
}

impl RuleEvaluator {
    /// Evaluate every enabled rule (optionally of one category) against
    /// `data`. Never fails; see [`BatchOutcome::skipped`] for rules that
    /// errored.
    pub fn evaluate_batch(&self, data: &SubjectRecord, category: Option<&str>) -> BatchOutcome {
        self.evaluate_batch_on(&self.registry.snapshot(), data, category)
    }

    /// Like [`evaluate_batch`](Self::evaluate_batch), but against a snapshot
    /// the caller already holds, so the caller sees the same rule set the
    /// batch ran on even if the registry is swapped meanwhile.
    pub fn evaluate_batch_on(&self, rule_set: &RuleSet, data: &SubjectRecord, category: Option<&str>) -> BatchOutcome {
        let rules: Vec<Arc<RegisteredRule>> = rule_set
            .list(category)
            .into_iter()
            .filter(|r| r.rule.enabled)
            .collect();

        let started = Instant::now();
        let results: Vec<(Arc<RegisteredRule>, Result<Option<Violation>, EvalError>, u64)> = self.pool.install(|| {
            rules
                .into_par_iter()
                .map(|registered| {
                    let t0 = Instant::now();
                    let result = isolate(&registered.rule.id, || {
                        evaluate_registered(&registered, data, self.deadline())
                    });
                    let elapsed_ms = t0.elapsed().as_millis() as u64;
                    (registered, result, elapsed_ms)
                })
                .collect()
        });

        let mut outcome = BatchOutcome {
            evaluated: results.len(),
            ..Default::default()
        };
        for (registered, result, elapsed_ms) in results {
            match result {
                Ok(Some(violation)) => {
                    debug!(rule_id = %registered.rule.id, subject = %data.subject_id, "rule violated");
                    outcome.violations.push(violation);
                }
                Ok(None) => {}
                Err(e) => {
                    let phase = e.phase();
                    warn!(rule_id = %registered.rule.id, subject = %data.subject_id, error = %e, "rule evaluation failed, skipping");
                    self.diagnostics.log_with_details(
                        &registered.rule.id,
                        if phase == ExecutionPhase::Skipped { LogLevel::Warning } else { LogLevel::Error },
                        phase,
                        e.to_string(),
                        Some(json!({ "subject_id": data.subject_id, "check_method": registered.rule.check_method })),
                        Some(elapsed_ms),
                    );
                    outcome.skipped.push(SkippedRule {
                        rule_id: registered.rule.id.clone(),
                        phase,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            subject = %data.subject_id,
            category = category.unwrap_or("*"),
            evaluated = outcome.evaluated,
            violations = outcome.violations.len(),
            skipped = outcome.skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch evaluated"
        );
        outcome
    }
}
