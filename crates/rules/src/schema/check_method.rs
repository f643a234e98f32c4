//! Check method tags, resolved once at registration time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of check strategies a rule can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMethod {
    Threshold,
    Pattern,
    TimeWindow,
    Checklist,
}

impl CheckMethod {
    /// Canonical tag names, used for "did you mean" suggestions.
    pub const NAMES: &'static [&'static str] = &["threshold", "pattern", "time_window", "checklist"];
}

impl fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMethod::Threshold => write!(f, "threshold"),
            CheckMethod::Pattern => write!(f, "pattern"),
            CheckMethod::TimeWindow => write!(f, "time_window"),
            CheckMethod::Checklist => write!(f, "checklist"),
        }
    }
}

impl FromStr for CheckMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "threshold" | "阈值" => Ok(CheckMethod::Threshold),
            "pattern" | "pattern_match" | "模式匹配" => Ok(CheckMethod::Pattern),
            "time_window" | "time_series" | "时间序列" => Ok(CheckMethod::TimeWindow),
            "checklist" | "清单" => Ok(CheckMethod::Checklist),
            other => Err(format!("unknown check method: '{}'", other)),
        }
    }
}
