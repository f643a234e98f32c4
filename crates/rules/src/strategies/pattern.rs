//! Pattern check: regexes over every field, or structured per-field conditions.

use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};

use guard_core::SubjectRecord;

use super::types::{display, numeric, CheckError, Deadline, Finding};
use super::CheckStrategy;
use crate::schema::Parameters;

/// Compiled-program size cap for rule-supplied regexes.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// One entry of the `patterns` parameter.
#[derive(Debug, Clone)]
pub enum PatternSpec {
    /// Tested against the stringified value of every field.
    Regex { source: String, regex: Regex },
    /// Tested against one field only; any satisfied clause matches.
    Condition {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
        pattern: Option<Regex>,
    },
}

#[derive(Debug, Clone)]
pub struct PatternCheck {
    pub patterns: Vec<PatternSpec>,
}

fn compile_regex(source: &str) -> Result<Regex, CheckError> {
    RegexBuilder::new(source)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| CheckError::params(format!("invalid pattern '{}': {}", source, e)))
}

impl PatternCheck {
    pub fn compile(params: &Parameters) -> Result<Self, CheckError> {
        let list = match params.get("patterns") {
            Some(Value::Array(list)) => list,
            Some(other) => {
                return Err(CheckError::params(format!(
                    "`patterns` must be a list, got {}",
                    other
                )))
            }
            None => return Err(CheckError::params("pattern check requires a `patterns` list")),
        };

        let mut patterns = Vec::with_capacity(list.len());
        for (i, entry) in list.iter().enumerate() {
            let spec = match entry {
                Value::String(source) => PatternSpec::Regex {
                    source: source.clone(),
                    regex: compile_regex(source)?,
                },
                Value::Object(map) => {
                    let field = map
                        .get("field")
                        .and_then(Value::as_str)
                        .ok_or_else(|| CheckError::params(format!("patterns[{}] is missing `field`", i)))?
                        .to_string();
                    let bound = |key: &str| -> Result<Option<f64>, CheckError> {
                        match map.get(key) {
                            None | Some(Value::Null) => Ok(None),
                            Some(v) => numeric(v).map(Some).ok_or_else(|| {
                                CheckError::params(format!("patterns[{}].{} must be numeric", i, key))
                            }),
                        }
                    };
                    let min = bound("min")?;
                    let max = bound("max")?;
                    let pattern = match map.get("pattern") {
                        None | Some(Value::Null) => None,
                        Some(Value::String(s)) => Some(compile_regex(s)?),
                        Some(_) => {
                            return Err(CheckError::params(format!(
                                "patterns[{}].pattern must be a string",
                                i
                            )))
                        }
                    };
                    if min.is_none() && max.is_none() && pattern.is_none() {
                        return Err(CheckError::params(format!(
                            "patterns[{}] needs at least one of `min`, `max`, `pattern`",
                            i
                        )));
                    }
                    PatternSpec::Condition { field, min, max, pattern }
                }
                other => {
                    return Err(CheckError::params(format!(
                        "patterns[{}] must be a string or a mapping, got {}",
                        i, other
                    )))
                }
            };
            patterns.push(spec);
        }

        if patterns.is_empty() {
            return Err(CheckError::params("`patterns` list is empty"));
        }
        Ok(Self { patterns })
    }
}

impl CheckStrategy for PatternCheck {
    fn evaluate(&self, data: &SubjectRecord, deadline: &Deadline) -> Result<Option<Finding>, CheckError> {
        for spec in &self.patterns {
            deadline.check()?;
            match spec {
                PatternSpec::Regex { source, regex } => {
                    for (field, value) in &data.fields {
                        deadline.check()?;
                        let text = display(value);
                        if regex.is_match(&text) {
                            return Ok(Some(Finding::new(
                                format!("field {} matched prohibited pattern '{}'", field, source),
                                json!({ "field": field, "observed": value, "pattern": source }),
                            )));
                        }
                    }
                }
                PatternSpec::Condition { field, min, max, pattern } => {
                    let Some(value) = data.get(field).filter(|v| !v.is_null()) else {
                        continue;
                    };
                    if min.is_some() || max.is_some() {
                        let observed = numeric(value).ok_or_else(|| {
                            CheckError::data(field, format!("expected a number, got {}", value))
                        })?;
                        if let Some(min) = min.filter(|m| observed < *m) {
                            return Ok(Some(Finding::new(
                                format!("{} {} is below the allowed minimum {}", field, display(value), min),
                                json!({ "field": field, "observed": value, "min": min }),
                            )));
                        }
                        if let Some(max) = max.filter(|m| observed > *m) {
                            return Ok(Some(Finding::new(
                                format!("{} {} is above the allowed maximum {}", field, display(value), max),
                                json!({ "field": field, "observed": value, "max": max }),
                            )));
                        }
                    }
                    if let Some(regex) = pattern {
                        if regex.is_match(&display(value)) {
                            return Ok(Some(Finding::new(
                                format!("{} matched prohibited pattern '{}'", field, regex.as_str()),
                                json!({ "field": field, "observed": value, "pattern": regex.as_str() }),
                            )));
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}
