//! Shared types for check strategies: findings, errors, deadlines, value helpers.

use std::time::{Duration, Instant};

use serde_json::Value;

/// What a failed check reports back to the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Human-readable explanation of the breach.
    pub description: String,
    /// Structured facts behind the description.
    pub details: Value,
}

impl Finding {
    pub fn new(description: impl Into<String>, details: Value) -> Self {
        Self {
            description: description.into(),
            details,
        }
    }
}

/// Errors raised while compiling or evaluating a check.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    #[error("unsupported check method '{0}'")]
    Unsupported(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid data in field '{field}': {reason}")]
    InvalidData { field: String, reason: String },

    #[error("evaluation exceeded its {budget_ms}ms budget")]
    Timeout { budget_ms: u64 },
}

impl CheckError {
    pub(crate) fn params(msg: impl Into<String>) -> Self {
        CheckError::InvalidParameters(msg.into())
    }

    pub(crate) fn data(field: &str, reason: impl Into<String>) -> Self {
        CheckError::InvalidData {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Evaluation budget for one rule. Strategies call [`Deadline::check`]
/// between units of work (fields, patterns, timestamps).
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn check(&self) -> Result<(), CheckError> {
        match self.budget {
            Some(budget) if self.started.elapsed() > budget => Err(CheckError::Timeout {
                budget_ms: budget.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

/// Numeric view of a JSON value: numbers as-is, numeric strings parsed.
pub(crate) fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Display form of a JSON value: strings unquoted, everything else as compact JSON.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_accepts_numbers_and_numeric_strings() {
        assert_eq!(numeric(&json!(3)), Some(3.0));
        assert_eq!(numeric(&json!(2.5)), Some(2.5));
        assert_eq!(numeric(&json!(" 1000 ")), Some(1000.0));
        assert_eq!(numeric(&json!("abc")), None);
        assert_eq!(numeric(&json!(true)), None);
    }

    #[test]
    fn display_unquotes_strings() {
        assert_eq!(display(&json!("abc")), "abc");
        assert_eq!(display(&json!(100000)), "100000");
        assert_eq!(display(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn zero_budget_deadline_expires() {
        let deadline = Deadline::after(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(deadline.check(), Err(CheckError::Timeout { budget_ms: 0 })));
        assert!(Deadline::unbounded().check().is_ok());
    }
}
