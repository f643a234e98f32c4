//! Checklist check: every required item must be present in the subject data.

use serde_json::{json, Value};

use guard_core::SubjectRecord;

use super::types::{display, CheckError, Deadline, Finding};
use super::CheckStrategy;
use crate::schema::Parameters;

const DEFAULT_ITEMS_FIELD: &str = "items";

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistCheck {
    pub required: Vec<String>,
    /// Data field holding the present items.
    pub items_field: String,
}

impl ChecklistCheck {
    pub fn compile(params: &Parameters) -> Result<Self, CheckError> {
        let list = params
            .get("required_items")
            .or_else(|| params.get("required_equipment"))
            .ok_or_else(|| CheckError::params("checklist check requires `required_items`"))?;
        let Value::Array(list) = list else {
            return Err(CheckError::params("`required_items` must be a list"));
        };
        let required = list.iter().map(display).collect();

        let items_field = match params.get("items_field") {
            None => DEFAULT_ITEMS_FIELD.to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => return Err(CheckError::params("`items_field` must be a non-empty string")),
        };

        Ok(Self { required, items_field })
    }
}

impl CheckStrategy for ChecklistCheck {
    fn evaluate(&self, data: &SubjectRecord, deadline: &Deadline) -> Result<Option<Finding>, CheckError> {
        deadline.check()?;
        let missing: Vec<&String> = match data.get(&self.items_field) {
            None | Some(Value::Null) => self.required.iter().collect(),
            Some(Value::Array(present)) => {
                let present: Vec<String> = present.iter().map(display).collect();
                self.required.iter().filter(|r| !present.contains(r)).collect()
            }
            // Free-text field (e.g. a business scope): an item is present when mentioned.
            Some(Value::String(text)) => {
                let text = text.to_lowercase();
                self.required
                    .iter()
                    .filter(|r| !text.contains(&r.to_lowercase()))
                    .collect()
            }
            Some(other) => {
                return Err(CheckError::data(
                    &self.items_field,
                    format!("expected a list or text, got {}", other),
                ))
            }
        };

        if missing.is_empty() {
            return Ok(None);
        }
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        Ok(Some(Finding::new(
            format!("missing required items: {}", names.join(", ")),
            json!({ "field": self.items_field, "missing_items": names }),
        )))
    }
}
