//! Persisted evidence and chain records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One immutable piece of audit evidence.
///
/// `hash` is the SHA-256 of the canonical form of `content` at creation time.
/// Any later change creates a new record; stored ones are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub id: String,
    #[serde(rename = "type")]
    pub evidence_type: String,
    pub source: String,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
    #[serde(default)]
    pub related_rule: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Input for [`EvidenceStore::create`](crate::EvidenceStore::create).
#[derive(Debug, Clone, Default)]
pub struct NewEvidence<C> {
    pub evidence_type: String,
    pub source: String,
    pub content: C,
    pub related_rule: Option<String>,
    pub metadata: Map<String, Value>,
}

impl<C> NewEvidence<C> {
    pub fn new(evidence_type: impl Into<String>, source: impl Into<String>, content: C) -> Self {
        Self {
            evidence_type: evidence_type.into(),
            source: source.into(),
            content,
            related_rule: None,
            metadata: Map::new(),
        }
    }

    pub fn related_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.related_rule = Some(rule_id.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// An ordered derivation path over evidence ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceChain {
    pub id: String,
    /// Order is significant and preserved on read.
    pub evidence_ids: Vec<String>,
    pub conclusion: String,
    pub risk_level: String,
    pub timestamp: DateTime<Utc>,
    pub reviewer: String,
}

impl EvidenceChain {
    /// Directed edges between consecutive members.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.evidence_ids
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect()
    }
}

/// A chain with its evidence loaded, in chain order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedChain {
    pub chain: EvidenceChain,
    pub evidence: Vec<Evidence>,
}

impl ResolvedChain {
    /// Graphviz rendering of the chain, one node per evidence.
    pub fn to_dot(&self) -> String {
        let mut out = format!("digraph \"{}\" {{\n  rankdir=LR;\n", self.chain.id);
        out.push_str(&format!(
            "  label=\"{}\\nrisk: {}\";\n",
            escape(&self.chain.conclusion),
            escape(&self.chain.risk_level)
        ));
        for e in &self.evidence {
            out.push_str(&format!(
                "  \"{}\" [shape=box, label=\"{}\\n{}\"];\n",
                e.id,
                escape(&e.evidence_type),
                e.id
            ));
        }
        for (from, to) in self.chain.edges() {
            out.push_str(&format!("  \"{}\" -> \"{}\";\n", from, to));
        }
        out.push('}');
        out.push('\n');
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
