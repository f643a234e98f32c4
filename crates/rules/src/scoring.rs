//! Risk scoring: violations → a bounded score in [0, 100] and a status band.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use guard_core::config::EvaluationConfig;

use crate::schema::Violation;

/// How violation weights are folded into a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// `Σ w×100 / Σ w`: 100 whenever anything is violated, 0 otherwise.
    /// Kept for reports that expect the legacy numbers.
    Literal,
    /// `Σ w×100 / count`: the mean severity weight on a 0–100 scale.
    #[default]
    MeanWeight,
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "literal" | "legacy" => Ok(ScoringMode::Literal),
            "mean_weight" | "mean" => Ok(ScoringMode::MeanWeight),
            other => Err(format!("unknown scoring mode '{}' (expected mean_weight or literal)", other)),
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoringMode::Literal => "literal",
            ScoringMode::MeanWeight => "mean_weight",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::LowRisk => "low_risk",
            RiskStatus::MediumRisk => "medium_risk",
            RiskStatus::HighRisk => "high_risk",
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScorer {
    pub mode: ScoringMode,
    /// Scores at or above this are high risk.
    pub high_threshold: f64,
    /// Scores at or above this (and below `high_threshold`) are medium risk.
    pub medium_threshold: f64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(ScoringMode::default())
    }
}

impl RiskScorer {
    pub fn new(mode: ScoringMode) -> Self {
        Self {
            mode,
            high_threshold: 70.0,
            medium_threshold: 30.0,
        }
    }

    /// An unknown `risk_scoring` value falls back to the default mode.
    pub fn from_config(config: &EvaluationConfig) -> Self {
        let mode = config.risk_scoring.parse().unwrap_or_else(|e: String| {
            warn!(error = %e, "falling back to mean_weight scoring");
            ScoringMode::default()
        });
        Self {
            mode,
            high_threshold: config.high_risk_threshold,
            medium_threshold: config.medium_risk_threshold,
        }
    }

    /// Score rounded to two decimals; 0 when there are no violations.
    pub fn score(&self, violations: &[Violation]) -> f64 {
        if violations.is_empty() {
            return 0.0;
        }
        let total: f64 = violations.iter().map(|v| v.severity.weight()).sum();
        let raw = match self.mode {
            ScoringMode::Literal if total > 0.0 => total * 100.0 / total,
            ScoringMode::Literal => 0.0,
            ScoringMode::MeanWeight => total * 100.0 / violations.len() as f64,
        };
        round2(raw.clamp(0.0, 100.0))
    }

    pub fn status(&self, score: f64) -> RiskStatus {
        if score >= self.high_threshold {
            RiskStatus::HighRisk
        } else if score >= self.medium_threshold {
            RiskStatus::MediumRisk
        } else {
            RiskStatus::LowRisk
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
