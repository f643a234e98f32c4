//! Filesystem rule loader with hot-reload via `notify` watcher.
//!
//! Reads declaration files from the rules directory into a
//! [`DeclarationSet`](crate::schema::DeclarationSet) and, when watching,
//! reloads the registry atomically whenever a YAML file changes.

mod core;
mod error;
mod watcher;


pub use self::core::{RuleLoader, RuleWatcher, ScanReport};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
