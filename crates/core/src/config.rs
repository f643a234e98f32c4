use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub evaluation: EvaluationConfig,
    pub evidence: EvidenceConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `GUARD_PROFILE` env var. When set (e.g. `AUDIT`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("GUARD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            evaluation: EvaluationConfig::from_env_profiled(p),
            evidence: EvidenceConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  rules:       dir={}, watch={}",
            self.rules.rules_dir.display(),
            self.rules.watch
        );
        tracing::info!(
            "  evaluation:  workers={}, rule_timeout_ms={}, scoring={}",
            self.evaluation.max_workers,
            self.evaluation.rule_timeout_ms,
            self.evaluation.risk_scoring
        );
        tracing::info!(
            "  evidence:    dir={}, io_timeout_ms={}",
            self.evidence.evidence_dir.display(),
            self.evidence.io_timeout_ms
        );
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Directory scanned for `*.yml` / `*.yaml` rule declaration files.
    pub rules_dir: PathBuf,
    /// Reload the registry when files under `rules_dir` change.
    pub watch: bool,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
            watch: profiled_env_bool(p, "GUARD_WATCH_RULES", false),
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Upper bound on threads used for one batch evaluation.
    pub max_workers: usize,
    /// Per-rule evaluation budget in milliseconds.
    pub rule_timeout_ms: u64,
    /// "mean_weight" or "literal"
    pub risk_scoring: String,
    pub high_risk_threshold: f64,
    pub medium_risk_threshold: f64,
    /// Per-rule cap of the in-memory diagnostics log.
    pub diagnostics_capacity: usize,
}

impl EvaluationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_workers: profiled_env_usize(p, "GUARD_MAX_WORKERS", 4).max(1),
            rule_timeout_ms: profiled_env_u64(p, "GUARD_RULE_TIMEOUT_MS", 250),
            risk_scoring: profiled_env_or(p, "GUARD_RISK_SCORING", "mean_weight"),
            high_risk_threshold: profiled_env_f64(p, "GUARD_HIGH_RISK_THRESHOLD", 70.0),
            medium_risk_threshold: profiled_env_f64(p, "GUARD_MEDIUM_RISK_THRESHOLD", 30.0),
            diagnostics_capacity: profiled_env_usize(p, "GUARD_DIAGNOSTICS_CAPACITY", 500),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            rule_timeout_ms: 250,
            risk_scoring: "mean_weight".to_string(),
            high_risk_threshold: 70.0,
            medium_risk_threshold: 30.0,
            diagnostics_capacity: 500,
        }
    }
}

// ── Evidence ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Root of the evidence store (`evidence/` and `chains/` live below it).
    pub evidence_dir: PathBuf,
    /// Budget for a single store read/write when driven from async code.
    pub io_timeout_ms: u64,
}

impl EvidenceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            evidence_dir: PathBuf::from(profiled_env_or(p, "EVIDENCE_DIR", "data/evidence")),
            io_timeout_ms: profiled_env_u64(p, "GUARD_EVIDENCE_IO_TIMEOUT_MS", 5_000),
        }
    }
}
