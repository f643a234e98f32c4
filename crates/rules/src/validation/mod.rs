//! Declaration validation with structured errors and suggestions.
//!
//! Every declaration of a [`DeclarationSet`] is checked before anything is
//! registered: required fields, severity, check method and the strategy
//! parameters themselves. Problems are collected across all rules so a
//! single [`RuleValidationError`] lists everything that needs fixing.

mod declaration_checks;

pub mod fuzzy;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{DeclarationSet, Rule};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    /// Rule location, e.g. `"financial.R1.severity"`.
    pub path: String,
    /// Offending rule id; `None` for whole-file problems.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// File the declaration came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{}: ", origin)?;
        }
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path)?;
        }
        f.write_str(&self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", s)?;
        }
        Ok(())
    }
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Ids of every rule with at least one error, in first-seen order.
    pub fn offending_rules(&self) -> Vec<&str> {
        offending(&self.errors)
    }
}

fn offending(errors: &[ValidationError]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for id in errors.iter().filter_map(|e| e.rule_id.as_deref()) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Aggregated load-time failure: every problem of every malformed rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct RuleValidationError {
    pub errors: Vec<ValidationError>,
}

impl RuleValidationError {
    pub fn offending_rules(&self) -> Vec<&str> {
        offending(&self.errors)
    }
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rule declaration error(s)", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n  - {}", e)?;
        }
        Ok(())
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate every declaration without building anything.
pub fn validate_declarations(set: &DeclarationSet) -> ValidationResult {
    let mut result = ValidationResult::new();

    for (origin, reason) in &set.unreadable {
        result.push(ValidationError {
            path: String::new(),
            rule_id: None,
            origin: Some(origin.clone()),
            message: format!("YAML parse error: {}", reason),
            suggestion: None,
        });
    }

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for declared in &set.rules {
        declaration_checks::validate_declared(declared, &mut result);
        if let Some(previous) = seen.insert(declared.id.as_str(), declared.category.as_str()) {
            result.warn(
                format!("{}.{}", declared.category, declared.id),
                format!(
                    "rule id '{}' is declared again (previously under '{}'); the later declaration wins",
                    declared.id, previous
                ),
            );
        }
    }

    result
}

/// Validate and convert declarations into rules. Nothing is returned unless
/// every declaration is valid.
pub fn build_rules(set: &DeclarationSet) -> Result<Vec<Rule>, RuleValidationError> {
    let result = validate_declarations(set);
    if !result.valid {
        return Err(RuleValidationError { errors: result.errors });
    }
    for w in &result.warnings {
        tracing::warn!(path = %w.path, "{}", w.message);
    }

    Ok(set
        .rules
        .iter()
        .filter_map(declaration_checks::to_rule)
        .collect())
}
