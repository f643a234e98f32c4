//! Declarative compliance rule engine.
//!
//! This crate provides:
//! - YAML rule declarations (category → rule id → declaration) with
//!   aggregated load-time validation
//! - A rule registry swapped atomically on reload, plus a filesystem loader
//!   with hot-reload via `notify`
//! - Built-in check strategies (threshold, pattern, time window, checklist)
//! - Fault-isolated parallel batch evaluation with a diagnostics log
//! - Risk scoring and per-subject compliance reports

pub mod checker;
pub mod diagnostics;
pub mod evaluator;
pub mod loader;
pub mod prepare;
pub mod registry;
pub mod schema;
pub mod scoring;
pub mod strategies;
pub mod validation;

pub use checker::{CheckReport, ComplianceChecker};
pub use diagnostics::DiagnosticsLog;
pub use evaluator::{BatchOutcome, EvalError, RuleEvaluator};
pub use loader::{RuleError, RuleLoader};
pub use registry::{RegisteredRule, RuleRegistry, RuleSet, RuleSource};
pub use schema::{CheckMethod, DeclarationSet, Rule, Severity, Violation};
pub use scoring::{RiskScorer, RiskStatus, ScoringMode};
pub use validation::RuleValidationError;
