//! Error types and load result structures for the rule loader and registry.

use std::path::PathBuf;

use crate::validation::RuleValidationError;

/// Errors that can occur during rule loading and management.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule not found: {0}")]
    NotFound(String),

    /// Aggregated declaration errors; nothing was registered.
    #[error(transparent)]
    Validation(#[from] RuleValidationError),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("registry has no rule source to reload from")]
    NoSource,
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Outcome of reading a single declaration file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file read.
#[derive(Debug)]
pub enum LoadStatus {
    /// File parsed; `rules` declarations were collected.
    Loaded { rules: usize },
    /// File was skipped (dotfile, non-YAML, etc.).
    Skipped { reason: String },
    /// File could not be read or parsed.
    Failed { error: String },
}
