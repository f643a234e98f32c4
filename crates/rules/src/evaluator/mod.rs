//! Rule evaluator: single-rule dispatch and fault-isolated batch evaluation.
//!
//! - [`RuleEvaluator::evaluate_rule`] is fail-fast: an unknown rule, an
//!   unsupported check method or bad data comes back as an [`EvalError`].
//! - [`RuleEvaluator::evaluate_batch`] never fails. Rules run in parallel on
//!   a bounded rayon pool, each under its own deadline and panic guard; a
//!   rule that errors, times out or panics is logged to the
//!   [`DiagnosticsLog`] and left out of the violations.

mod batch;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use guard_core::config::EvaluationConfig;
use guard_core::SubjectRecord;

use crate::diagnostics::{DiagnosticsLog, ExecutionPhase};
use crate::registry::{RegisteredRule, RuleRegistry};
use crate::schema::Violation;
use crate::strategies::{CheckError, CheckStrategy, Deadline, Finding};

pub use batch::{BatchOutcome, SkippedRule};

/// Errors surfaced by single-rule evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("rule {rule_id}: unsupported check method '{method}'")]
    UnsupportedCheckMethod { rule_id: String, method: String },

    #[error("rule {rule_id}: {source}")]
    Check {
        rule_id: String,
        #[source]
        source: CheckError,
    },

    #[error("rule {rule_id}: evaluation panicked: {message}")]
    Panicked { rule_id: String, message: String },

    #[error("failed to build evaluation pool: {0}")]
    Pool(String),
}

impl EvalError {
    /// Diagnostics phase this failure is filed under.
    pub fn phase(&self) -> ExecutionPhase {
        match self {
            EvalError::Check {
                source: CheckError::Timeout { .. },
                ..
            } => ExecutionPhase::Timeout,
            EvalError::UnsupportedCheckMethod { .. } | EvalError::RuleNotFound(_) => ExecutionPhase::Skipped,
            _ => ExecutionPhase::Evaluation,
        }
    }
}

/// Evaluates registered rules against subject records.
pub struct RuleEvaluator {
    registry: Arc<RuleRegistry>,
    diagnostics: Arc<DiagnosticsLog>,
    pool: rayon::ThreadPool,
    rule_timeout: Option<Duration>,
}

impl RuleEvaluator {
    /// Build an evaluator with `max_workers` threads and a per-rule budget of
    /// `rule_timeout_ms` (0 disables the budget).
    pub fn new(registry: Arc<RuleRegistry>, config: &EvaluationConfig) -> Result<Self, EvalError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers.max(1))
            .thread_name(|i| format!("guard-eval-{i}"))
            .build()
            .map_err(|e| EvalError::Pool(e.to_string()))?;
        let rule_timeout = (config.rule_timeout_ms > 0).then(|| Duration::from_millis(config.rule_timeout_ms));
        Ok(Self {
            registry,
            diagnostics: Arc::new(DiagnosticsLog::with_max_entries(config.diagnostics_capacity)),
            pool,
            rule_timeout,
        })
    }

    /// Share an existing diagnostics log (e.g. the registry's).
    pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticsLog>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsLog> {
        &self.diagnostics
    }

    fn deadline(&self) -> Deadline {
        self.rule_timeout.map(Deadline::after).unwrap_or_else(Deadline::unbounded)
    }

    /// Evaluate one rule by id. A disabled rule passes without running.
    pub fn evaluate_rule(&self, rule_id: &str, data: &SubjectRecord) -> Result<Option<Violation>, EvalError> {
        let registered = self
            .registry
            .get(rule_id)
            .ok_or_else(|| EvalError::RuleNotFound(rule_id.to_string()))?;
        isolate(&registered.rule.id, || evaluate_registered(&registered, data, self.deadline()))
    }
}

/// Run one registered rule against `data`.
pub(crate) fn evaluate_registered(
    registered: &RegisteredRule,
    data: &SubjectRecord,
    deadline: Deadline,
) -> Result<Option<Violation>, EvalError> {
    let rule = &registered.rule;
    if !rule.enabled {
        return Ok(None);
    }

    let check = registered.check.as_ref().map_err(|e| match e {
        CheckError::Unsupported(method) => EvalError::UnsupportedCheckMethod {
            rule_id: rule.id.clone(),
            method: method.clone(),
        },
        other => EvalError::Check {
            rule_id: rule.id.clone(),
            source: other.clone(),
        },
    })?;

    let outcome = check.evaluate(data, &deadline).and_then(|finding| {
        // A single unit of work may overrun the budget without hitting a checkpoint.
        deadline.check()?;
        Ok(finding)
    });
    let finding = outcome.map_err(|source| EvalError::Check {
        rule_id: rule.id.clone(),
        source,
    })?;

    Ok(finding.map(|f| to_violation(registered, data, f)))
}

fn to_violation(registered: &RegisteredRule, data: &SubjectRecord, finding: Finding) -> Violation {
    let rule = &registered.rule;
    Violation {
        rule_id: rule.id.clone(),
        subject_id: data.subject_id.clone(),
        timestamp: Utc::now(),
        severity: rule.severity,
        description: finding.description,
        evidence_refs: Vec::new(),
        suggested_actions: rule.suggested_actions(),
        details: finding.details,
    }
}

/// Run `f`, turning a panic into [`EvalError::Panicked`].
pub(crate) fn isolate<T>(
    rule_id: &str,
    f: impl FnOnce() -> Result<T, EvalError>,
) -> Result<T, EvalError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(EvalError::Panicked {
                rule_id: rule_id.to_string(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests;
