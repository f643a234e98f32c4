//! In-memory diagnostics log for rule evaluation and registry reloads.
//!
//! Batch evaluation never fails because of a single rule; what went wrong is
//! recorded here instead, per rule, capped at a configurable maximum
//! (default 500) with FIFO eviction. Uses `std::sync::RwLock` so it can be
//! written from rayon workers and read from async handlers alike.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pseudo rule id under which registry-wide events are filed.
pub const REGISTRY_SCOPE: &str = "*registry*";

/// Severity level for diagnostics entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Numeric severity for comparison (higher = more severe).
    pub fn as_severity(&self) -> u8 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
        }
    }
}

/// What the entry is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// The check itself failed (bad data, bad parameters, panic).
    Evaluation,
    /// The check ran out of its time budget.
    Timeout,
    /// The rule was excluded before running (unsupported method).
    Skipped,
    /// A registry reload was attempted.
    Reload,
}

/// A single diagnostics entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub level: LogLevel,
    pub phase: ExecutionPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Query parameters for filtering entries.
#[derive(Debug, Default, Deserialize)]
pub struct LogQueryParams {
    /// Minimum log level (inclusive).
    pub level: Option<LogLevel>,
    pub phase: Option<ExecutionPhase>,
    /// Maximum number of entries to return (default 100).
    pub limit: Option<u32>,
    /// Only return entries at or after this ISO 8601 timestamp.
    pub since: Option<String>,
}

/// Per-rule diagnostics with FIFO eviction.
pub struct DiagnosticsLog {
    entries: RwLock<HashMap<String, VecDeque<LogEntry>>>,
    max_entries_per_rule: usize,
}

impl DiagnosticsLog {
    /// Create a log with the default cap of 500 entries per rule.
    pub fn new() -> Self {
        Self::with_max_entries(500)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries_per_rule: max.max(1),
        }
    }

    pub fn log(&self, rule_id: &str, level: LogLevel, phase: ExecutionPhase, message: impl Into<String>) {
        self.log_with_details(rule_id, level, phase, message, None, None);
    }

    pub fn log_with_details(
        &self,
        rule_id: &str,
        level: LogLevel,
        phase: ExecutionPhase,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
        duration_ms: Option<u64>,
    ) {
        self.push(LogEntry {
            timestamp: Utc::now(),
            rule_id: rule_id.to_string(),
            level,
            phase,
            message: message.into(),
            details,
            duration_ms,
        });
    }

    /// Append a prepared entry.
    pub fn push(&self, entry: LogEntry) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let deque = guard.entry(entry.rule_id.clone()).or_default();
        deque.push_back(entry);
        while deque.len() > self.max_entries_per_rule {
            deque.pop_front();
        }
    }

    /// Entries for one rule, newest first.
    pub fn query(&self, rule_id: &str, params: &LogQueryParams) -> Vec<LogEntry> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let Some(deque) = guard.get(rule_id) else {
            return Vec::new();
        };
        filter_entries(deque.iter(), params)
    }

    /// Entries across all rules, newest first.
    pub fn query_all(&self, params: &LogQueryParams) -> Vec<LogEntry> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<&LogEntry> = guard.values().flatten().collect();
        all.sort_by_key(|e| e.timestamp);
        filter_entries(all.into_iter(), params)
    }

    /// Rule ids with at least one entry, sorted.
    pub fn rule_ids(&self) -> Vec<String> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self, rule_id: &str) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(rule_id);
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter oldest-first entries and return them newest-first.
fn filter_entries<'a>(
    entries: impl DoubleEndedIterator<Item = &'a LogEntry>,
    params: &LogQueryParams,
) -> Vec<LogEntry> {
    let min_severity = params.level.map(|l| l.as_severity()).unwrap_or(0);
    let since: Option<DateTime<Utc>> = params
        .since
        .as_ref()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());
    let limit = params.limit.unwrap_or(100) as usize;

    entries
        .rev()
        .filter(|e| e.level.as_severity() >= min_severity)
        .filter(|e| params.phase.map_or(true, |p| e.phase == p))
        .filter(|e| since.map_or(true, |s| e.timestamp >= s))
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_log_and_query() {
        let log = DiagnosticsLog::new();
        log.log("R1", LogLevel::Info, ExecutionPhase::Evaluation, "started");
        log.log("R1", LogLevel::Warning, ExecutionPhase::Timeout, "slow");
        log.log("R1", LogLevel::Error, ExecutionPhase::Evaluation, "bad data");

        let entries = log.query("R1", &LogQueryParams::default());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "bad data");
        assert_eq!(entries[2].message, "started");
    }

    #[test]
    fn test_level_and_phase_filter() {
        let log = DiagnosticsLog::new();
        log.log("R1", LogLevel::Debug, ExecutionPhase::Evaluation, "debug");
        log.log("R1", LogLevel::Warning, ExecutionPhase::Timeout, "timeout");
        log.log("R1", LogLevel::Error, ExecutionPhase::Evaluation, "error");

        let warn_up = log.query(
            "R1",
            &LogQueryParams { level: Some(LogLevel::Warning), ..Default::default() },
        );
        assert_eq!(warn_up.len(), 2);

        let timeouts = log.query(
            "R1",
            &LogQueryParams { phase: Some(ExecutionPhase::Timeout), ..Default::default() },
        );
        assert_eq!(timeouts.len(), 1);
        assert_eq!(timeouts[0].message, "timeout");
    }

    #[test]
    fn test_fifo_eviction() {
        let log = DiagnosticsLog::with_max_entries(3);
        for i in 1..=4 {
            log.log("R1", LogLevel::Error, ExecutionPhase::Evaluation, format!("msg {}", i));
        }
        let entries = log.query("R1", &LogQueryParams::default());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "msg 4");
        assert_eq!(entries[2].message, "msg 2");
    }

    #[test]
    fn test_query_all_spans_rules() {
        let log = DiagnosticsLog::new();
        log.log("R1", LogLevel::Error, ExecutionPhase::Evaluation, "r1");
        log.log("R2", LogLevel::Warning, ExecutionPhase::Skipped, "r2");
        log.log(REGISTRY_SCOPE, LogLevel::Error, ExecutionPhase::Reload, "reload failed");

        let all = log.query_all(&LogQueryParams { limit: Some(2), ..Default::default() });
        assert_eq!(all.len(), 2);
        assert_eq!(log.rule_ids(), vec![REGISTRY_SCOPE.to_string(), "R1".to_string(), "R2".to_string()]);
    }

    #[test]
    fn test_clear_and_missing_rule() {
        let log = DiagnosticsLog::new();
        log.log_with_details(
            "R1",
            LogLevel::Error,
            ExecutionPhase::Evaluation,
            "failed",
            Some(serde_json::json!({"field": "revenue"})),
            Some(3),
        );
        assert_eq!(log.query("R1", &LogQueryParams::default())[0].duration_ms, Some(3));
        log.clear("R1");
        assert!(log.query("R1", &LogQueryParams::default()).is_empty());
        assert!(log.query("nope", &LogQueryParams::default()).is_empty());
    }
}
