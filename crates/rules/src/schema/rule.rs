//! Registered rule definition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;

/// Ordered strategy parameters (declaration order is evaluation order).
pub type Parameters = IndexMap<String, Value>;

/// A declarative, named condition with a severity and a check method.
///
/// `check_method` keeps the declared tag; the registry resolves it into a
/// compiled check when the rule is registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub check_method: String,
    #[serde(default)]
    pub parameters: Parameters,
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Suggested remediation steps copied into every violation of this rule.
    #[serde(default)]
    pub actions: Vec<String>,
}

pub(crate) fn default_true() -> bool {
    true
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        check_method: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            description: String::new(),
            check_method: check_method.into(),
            parameters: Parameters::new(),
            severity,
            enabled: true,
            actions: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions = actions;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Actions attached to violations: the declared ones, or generic
    /// category/name based steps when the declaration lists none.
    pub fn suggested_actions(&self) -> Vec<String> {
        if !self.actions.is_empty() {
            return self.actions.clone();
        }
        vec![
            format!("Review the {} compliance requirements", self.category),
            format!("Remediate issues related to {}", self.name),
            "Preserve the related evidence".to_string(),
        ]
    }
}
