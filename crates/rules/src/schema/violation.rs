//! Violations: the output of a failed check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;

/// Outcome of a rule whose condition was not satisfied by the data.
///
/// Produced only by the evaluator. Attaching evidence consumes the value and
/// returns a new one; nothing mutates a violation in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule_id: String,
    pub subject_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_refs: Vec<String>,
    pub suggested_actions: Vec<String>,
    /// Structured facts behind the description (field, observed value, bound).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl Violation {
    pub fn with_evidence_refs(mut self, refs: Vec<String>) -> Self {
        self.evidence_refs = refs;
        self
    }
}
