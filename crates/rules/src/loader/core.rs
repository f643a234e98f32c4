//! Core [`RuleLoader`]: directory-backed rule declarations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::registry::{RuleRegistry, RuleSource};
use crate::schema::{DeclarationFile, DeclarationSet};

use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::watcher::handle_fs_event;

/// Declarations read from a directory, plus what happened to each file.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub declarations: DeclarationSet,
    pub files: Vec<LoadResult>,
}

/// Filesystem-backed rule source.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files. Each file is
/// a mapping `category → rule id → declaration`. Files are visited in path
/// order so later files win on duplicate ids deterministically.
#[derive(Debug, Clone)]
pub struct RuleLoader {
    rules_dir: PathBuf,
}

/// Keeps the filesystem watcher alive; dropping it stops hot reload.
pub struct RuleWatcher {
    _watcher: RecommendedWatcher,
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

impl RuleLoader {
    /// Create a loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: PathBuf) -> Self {
        if !rules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self { rules_dir }
    }

    /// Recursively scan the rules directory.
    ///
    /// Dotfiles and non-YAML files are skipped. A file that cannot be read or
    /// parsed is reported in [`ScanReport::files`] and recorded as unreadable
    /// in the declaration set, so validation fails on it later.
    pub fn scan(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        self.scan_dir_recursive(&self.rules_dir, &mut report)?;
        Ok(report)
    }

    fn scan_dir_recursive(&self, dir: &Path, report: &mut ScanReport) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };
        let mut paths = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        for path in paths {
            if is_dotfile(&path) {
                if path.is_file() {
                    report.files.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, report)?;
                continue;
            }

            if !is_yaml(&path) {
                report.files.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            let origin = path.display().to_string();
            match self.load_file(&path) {
                Ok(file) => {
                    let rules = file.values().map(|group| group.len()).sum();
                    info!(path = %origin, rules, "read rule declarations");
                    report.declarations.extend_file(file, Some(&origin));
                    report.files.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { rules },
                    });
                }
                Err(e) => {
                    warn!(path = %origin, error = %e, "failed to read rule file");
                    report.declarations.unreadable.push((origin, e.to_string()));
                    report.files.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse a single declaration file. An empty file holds no rules.
    pub fn load_file(&self, path: &Path) -> Result<DeclarationFile> {
        let contents = fs::read_to_string(path)?;
        let file: Option<DeclarationFile> = serde_yaml::from_str(&contents)?;
        Ok(file.unwrap_or_default())
    }

    /// Scan and load into `registry` in one step.
    pub fn load_into(&self, registry: &RuleRegistry) -> Result<usize> {
        registry.load_from_source(&self.scan()?.declarations)
    }

    /// Start a filesystem watcher that reloads `registry` whenever a YAML
    /// file under the rules directory changes.
    ///
    /// A reload that fails validation is logged and the previous rule set
    /// stays active.
    pub fn watch(&self, registry: Arc<RuleRegistry>) -> Result<RuleWatcher> {
        let rules_dir = self.rules_dir.clone();

        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => handle_fs_event(&event, &registry),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            }
        })?;

        watcher.watch(&rules_dir, RecursiveMode::Recursive)?;

        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %rules_dir.display(), "watching rules directory for changes (recursive)");
        Ok(RuleWatcher { _watcher: watcher })
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }
}

impl RuleSource for RuleLoader {
    fn declarations(&self) -> Result<DeclarationSet> {
        if !self.rules_dir.is_dir() {
            return Err(RuleError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("rules directory {} does not exist", self.rules_dir.display()),
            )));
        }
        Ok(self.scan()?.declarations)
    }

    fn describe(&self) -> String {
        self.rules_dir.display().to_string()
    }
}
