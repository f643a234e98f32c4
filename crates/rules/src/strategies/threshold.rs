//! Threshold check: `min_<field>` / `max_<field>` bounds with strict comparison.

use serde_json::{json, Value};

use guard_core::SubjectRecord;

use super::types::{display, numeric, CheckError, Deadline, Finding};
use super::CheckStrategy;
use crate::schema::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Min,
    Max,
}

/// One `min_<field>` or `max_<field>` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub field: String,
    pub kind: BoundKind,
    pub limit: f64,
    /// Declared value, kept for descriptions (`100000`, not `100000.0`).
    pub declared: Value,
}

/// Bounds in declaration order; the first breached bound wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCheck {
    pub bounds: Vec<Bound>,
}

impl ThresholdCheck {
    pub fn compile(params: &Parameters) -> Result<Self, CheckError> {
        let mut bounds = Vec::new();
        for (key, value) in params {
            let (kind, field) = if let Some(field) = key.strip_prefix("min_") {
                (BoundKind::Min, field)
            } else if let Some(field) = key.strip_prefix("max_") {
                (BoundKind::Max, field)
            } else {
                continue;
            };
            if field.is_empty() {
                return Err(CheckError::params(format!("parameter '{}' names no field", key)));
            }
            let limit = numeric(value).ok_or_else(|| {
                CheckError::params(format!("parameter '{}' must be numeric, got {}", key, value))
            })?;
            bounds.push(Bound {
                field: field.to_string(),
                kind,
                limit,
                declared: value.clone(),
            });
        }

        if bounds.is_empty() {
            return Err(CheckError::params(
                "threshold check declares no min_<field> or max_<field> parameter",
            ));
        }
        Ok(Self { bounds })
    }
}

impl CheckStrategy for ThresholdCheck {
    fn evaluate(&self, data: &SubjectRecord, deadline: &Deadline) -> Result<Option<Finding>, CheckError> {
        for bound in &self.bounds {
            deadline.check()?;

            // Absent (or null) fields read as zero.
            let observed = match data.get(&bound.field) {
                None | Some(Value::Null) => 0.0,
                Some(v) => numeric(v).ok_or_else(|| {
                    CheckError::data(&bound.field, format!("expected a number, got {}", v))
                })?,
            };
            let observed_display = data
                .get(&bound.field)
                .filter(|v| !v.is_null())
                .map(display)
                .unwrap_or_else(|| "0".to_string());

            let breached = match bound.kind {
                BoundKind::Min => observed < bound.limit,
                BoundKind::Max => observed > bound.limit,
            };
            if !breached {
                continue;
            }

            let (label, relation) = match bound.kind {
                BoundKind::Min => ("min", "below minimum"),
                BoundKind::Max => ("max", "above maximum"),
            };
            let description = format!(
                "{} {} is {} threshold {}",
                bound.field,
                observed_display,
                relation,
                display(&bound.declared)
            );
            return Ok(Some(Finding::new(
                description,
                json!({
                    "field": bound.field,
                    "observed": observed,
                    "bound": label,
                    "threshold": bound.declared,
                }),
            )));
        }
        Ok(None)
    }
}
