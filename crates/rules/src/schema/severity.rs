//! Rule severity and its scoring weight.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Qualitative weight attached to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    /// Weight used by the risk scorer.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::High => 1.0,
            Severity::Medium => 0.6,
            Severity::Low => 0.3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" | "高" | "高风险" => Ok(Severity::High),
            "medium" | "中" | "中风险" => Ok(Severity::Medium),
            "low" | "低" | "低风险" => Ok(Severity::Low),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}
