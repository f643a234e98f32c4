//! Per-declaration checks and conversion into [`Rule`].

use crate::schema::{CheckMethod, DeclaredRule, Rule, Severity};
use crate::strategies::{Check, CheckError};

use super::fuzzy::suggest;
use super::{ValidationError, ValidationResult};

const SEVERITY_NAMES: &[&str] = &["high", "medium", "low"];

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

pub(crate) fn validate_declared(declared: &DeclaredRule, result: &mut ValidationResult) {
    let decl = &declared.declaration;
    let base = format!("{}.{}", declared.category, declared.id);
    let mut error = |field: &str, message: String, suggestion: Option<String>| {
        result.push(ValidationError {
            path: format!("{}.{}", base, field),
            rule_id: Some(declared.id.clone()),
            origin: declared.origin.clone(),
            message,
            suggestion,
        });
    };

    if declared.id.trim().is_empty() {
        error("id", "rule id is empty".to_string(), None);
    }
    if !present(&decl.name) {
        error("name", "missing required field 'name'".to_string(), None);
    }
    if !present(&decl.description) {
        error("description", "missing required field 'description'".to_string(), None);
    }
    if decl.action.as_ref().map_or(true, |a| a.is_empty()) {
        error("action", "missing required field 'action'".to_string(), None);
    }

    match decl.severity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => error("severity", "missing required field 'severity'".to_string(), None),
        Some(raw) => {
            if raw.parse::<Severity>().is_err() {
                let suggestion = suggest(raw, SEVERITY_NAMES).map(str::to_string);
                error("severity", format!("unknown severity '{}'", raw), suggestion);
            }
        }
    }

    match decl.check_method.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => error(
            "check_method",
            "missing required field 'check_method' (or 'condition')".to_string(),
            None,
        ),
        Some(raw) => match raw.parse::<CheckMethod>() {
            Err(_) => {
                let suggestion = suggest(raw, CheckMethod::NAMES).map(str::to_string);
                error("check_method", format!("unsupported check method '{}'", raw), suggestion);
            }
            Ok(method) => {
                if let Err(e) = Check::compile(method, &decl.parameters) {
                    let message = match e {
                        CheckError::InvalidParameters(msg) => msg,
                        other => other.to_string(),
                    };
                    error("parameters", message, None);
                }
            }
        },
    }
}

/// Convert a declaration that passed [`validate_declared`].
pub(crate) fn to_rule(declared: &DeclaredRule) -> Option<Rule> {
    let decl = &declared.declaration;
    let severity = decl.severity.as_deref()?.parse::<Severity>().ok()?;
    Some(Rule {
        id: declared.id.clone(),
        name: decl.name.clone()?,
        category: declared.category.clone(),
        description: decl.description.clone().unwrap_or_default(),
        check_method: decl.check_method.as_deref()?.trim().to_string(),
        parameters: decl.parameters.clone(),
        severity,
        enabled: decl.enabled.unwrap_or(true),
        actions: decl
            .action
            .clone()
            .map(|a| a.into_vec())
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect(),
    })
}
