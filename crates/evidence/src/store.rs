//! Filesystem evidence store: one write-once JSON file per record.
//!
//! ```text
//! <root>/evidence/<id>.json
//! <root>/chains/<id>.json
//! ```
//!
//! Records are first written to a dot-prefixed temp file and then hard-linked
//! to their final name, which fails if the name is taken. A record is
//! therefore never overwritten and never observed half-written.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use guard_rules::Violation;

use crate::canonical::{content_hash, to_content_value};
use crate::error::{EvidenceError, Result};
use crate::id::{is_valid_id, next_id, EVIDENCE_PREFIX};
use crate::model::{Evidence, NewEvidence};

const EVIDENCE_DIR: &str = "evidence";
pub(crate) const CHAINS_DIR: &str = "chains";
const MAX_ID_ATTEMPTS: usize = 16;

/// Evidence type used by [`EvidenceStore::record_violation`].
pub const VIOLATION_EVIDENCE: &str = "rule_violation";

#[derive(Debug, Clone)]
pub struct EvidenceStore {
    root: PathBuf,
}

impl EvidenceStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(EVIDENCE_DIR))?;
        fs::create_dir_all(root.join(CHAINS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn evidence_path(&self, id: &str) -> PathBuf {
        self.root.join(EVIDENCE_DIR).join(format!("{id}.json"))
    }

    pub(crate) fn chain_path(&self, id: &str) -> PathBuf {
        self.root.join(CHAINS_DIR).join(format!("{id}.json"))
    }

    /// Hash, persist and return a new evidence record.
    pub fn create<C: Serialize>(&self, new: NewEvidence<C>) -> Result<Evidence> {
        let content = to_content_value(&new.content)?;
        let hash = content_hash(&content);

        let timestamp = Utc::now();
        let mut evidence = Evidence {
            id: next_id(EVIDENCE_PREFIX, timestamp),
            evidence_type: new.evidence_type,
            source: new.source,
            content,
            timestamp,
            hash,
            related_rule: new.related_rule,
            metadata: new.metadata,
        };

        let mut attempts = 0;
        loop {
            match self.write_once(&self.evidence_path(&evidence.id), &evidence) {
                Ok(()) => break,
                // Another process minted the same id; take the next one.
                Err(EvidenceError::AlreadyExists { .. }) if attempts < MAX_ID_ATTEMPTS => {
                    attempts += 1;
                    evidence.id = next_id(EVIDENCE_PREFIX, timestamp);
                }
                Err(e) => return Err(e),
            }
        }

        info!(evidence_id = %evidence.id, evidence_type = %evidence.evidence_type, "created evidence");
        Ok(evidence)
    }

    /// Preserve a violation as evidence of its rule. The violation itself
    /// (description, details, severity) becomes the content.
    pub fn record_violation(&self, violation: &Violation, source: &str) -> Result<Evidence> {
        self.create(
            NewEvidence::new(VIOLATION_EVIDENCE, source, violation)
                .related_rule(violation.rule_id.clone())
                .meta("subject_id", violation.subject_id.clone())
                .meta("severity", violation.severity.as_str()),
        )
    }

    pub fn get(&self, id: &str) -> Result<Evidence> {
        if !is_valid_id(id) {
            return Err(EvidenceError::NotFound(id.to_string()));
        }
        read_record(&self.evidence_path(id), id).map_err(|e| match e {
            EvidenceError::Io(io) if io.kind() == io::ErrorKind::NotFound => EvidenceError::NotFound(id.to_string()),
            other => other,
        })
    }

    pub fn exists(&self, id: &str) -> bool {
        is_valid_id(id) && self.evidence_path(id).is_file()
    }

    /// All evidence ids, sorted (ids sort by creation time).
    pub fn list_ids(&self) -> Result<Vec<String>> {
        list_record_ids(&self.root.join(EVIDENCE_DIR))
    }

    /// Evidence whose serialized top-level fields equal every criterion
    /// (`type`, `source`, `related_rule`, ...). Linear scan.
    pub fn search(&self, criteria: &Map<String, Value>) -> Result<Vec<Evidence>> {
        let mut found = Vec::new();
        for id in self.list_ids()? {
            let raw: Value = match read_record(&self.evidence_path(&id), &id) {
                Ok(v) => v,
                Err(e) => {
                    warn!(evidence_id = %id, error = %e, "skipping unreadable evidence during search");
                    continue;
                }
            };
            let matches = criteria.iter().all(|(k, v)| raw.get(k) == Some(v));
            if !matches {
                continue;
            }
            match serde_json::from_value::<Evidence>(raw) {
                Ok(evidence) => found.push(evidence),
                Err(e) => warn!(evidence_id = %id, error = %e, "skipping malformed evidence during search"),
            }
        }
        debug!(criteria = ?criteria, hits = found.len(), "evidence search");
        Ok(found)
    }

    /// Write `record` to `path` unless something already lives there.
    pub(crate) fn write_once<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if path.exists() {
            return Err(EvidenceError::AlreadyExists { id });
        }

        let bytes =
            serde_json::to_vec_pretty(record).map_err(|e| EvidenceError::Serialization(e.to_string()))?;
        let dir = path.parent().unwrap_or(&self.root);
        let tmp = dir.join(format!(".{}.{}.tmp", id, std::process::id()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        let linked = fs::hard_link(&tmp, path);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(EvidenceError::AlreadyExists { id }),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn read_record<T: DeserializeOwned>(path: &Path, id: &str) -> Result<T> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| EvidenceError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn list_record_ids(dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if is_json && !stem.starts_with('.') {
            ids.push(stem.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}
