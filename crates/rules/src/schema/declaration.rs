//! Raw rule declarations as read from declaration files.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Parameters;

/// One declaration file: `category → rule id → declaration`.
pub type DeclarationFile = IndexMap<String, IndexMap<String, RuleDeclaration>>;

/// Raw declaration of a single rule.
///
/// Every field is optional at the serde level so validation can report all
/// missing fields of all rules at once instead of stopping at the first
/// deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleDeclaration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Check method tag. `condition` is accepted as a legacy spelling.
    #[serde(default, alias = "condition")]
    pub check_method: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub action: Option<ActionSpec>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// The `action` field: either a single instruction or an ordered list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ActionSpec {
    One(String),
    Many(Vec<String>),
}

impl ActionSpec {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ActionSpec::One(s) => vec![s],
            ActionSpec::Many(v) => v,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ActionSpec::One(s) => s.trim().is_empty(),
            ActionSpec::Many(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }
}

/// A declaration together with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredRule {
    pub category: String,
    pub id: String,
    pub declaration: RuleDeclaration,
    /// File the declaration came from, when loaded from disk.
    pub origin: Option<String>,
}

/// Flattened declarations from one or more sources, in source order.
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    pub rules: Vec<DeclaredRule>,
    /// Sources that could not be parsed at all: (origin, error).
    pub unreadable: Vec<(String, String)>,
}

impl DeclarationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every rule of a parsed declaration file.
    pub fn extend_file(&mut self, file: DeclarationFile, origin: Option<&str>) {
        for (category, group) in file {
            for (id, declaration) in group {
                self.rules.push(DeclaredRule {
                    category: category.clone(),
                    id,
                    declaration,
                    origin: origin.map(str::to_string),
                });
            }
        }
    }

    /// Parse a YAML declaration document and append its rules.
    /// A parse failure is recorded as an unreadable source rather than returned.
    pub fn extend_yaml(&mut self, yaml: &str, origin: &str) {
        match serde_yaml::from_str::<Option<DeclarationFile>>(yaml) {
            Ok(Some(file)) => self.extend_file(file, Some(origin)),
            Ok(None) => {}
            Err(e) => self.unreadable.push((origin.to_string(), e.to_string())),
        }
    }

    pub fn from_yaml(yaml: &str, origin: &str) -> Self {
        let mut set = Self::new();
        set.extend_yaml(yaml, origin);
        set
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
