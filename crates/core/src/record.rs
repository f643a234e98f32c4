use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GuardError;

/// Keys probed, in order, when a raw record does not carry an explicit subject id.
pub const SUBJECT_ID_KEYS: &[&str] = &["subject_id", "merchant_id", "id"];

/// Subject id used when none of [`SUBJECT_ID_KEYS`] is present.
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// One entity's data as handed over by a caller (a merchant profile, a
/// month of cost metrics, ...). Rules read `fields`; violations carry `subject_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubjectRecord {
    pub subject_id: String,
    pub fields: Map<String, Value>,
}

impl SubjectRecord {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Build from a raw JSON object. The subject id is taken from the first
    /// key of [`SUBJECT_ID_KEYS`] present; numbers are stringified.
    pub fn from_value(value: Value) -> Result<Self, GuardError> {
        let Value::Object(fields) = value else {
            return Err(GuardError::InvalidRecord(
                "subject record must be a JSON object".to_string(),
            ));
        };

        let subject_id = SUBJECT_ID_KEYS
            .iter()
            .find_map(|k| match fields.get(*k) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string());

        Ok(Self { subject_id, fields })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subject_id_prefers_explicit_key() {
        let rec = SubjectRecord::from_value(json!({
            "merchant_id": "M-1",
            "subject_id": "S-9",
            "revenue": 10
        }))
        .unwrap();
        assert_eq!(rec.subject_id, "S-9");
        assert_eq!(rec.get("revenue"), Some(&json!(10)));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let rec = SubjectRecord::from_value(json!({"id": 42})).unwrap();
        assert_eq!(rec.subject_id, "42");
    }

    #[test]
    fn missing_id_falls_back_to_unknown() {
        let rec = SubjectRecord::from_value(json!({"revenue": 1})).unwrap();
        assert_eq!(rec.subject_id, UNKNOWN_SUBJECT);
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(SubjectRecord::from_value(json!([1, 2])).is_err());
    }
}
