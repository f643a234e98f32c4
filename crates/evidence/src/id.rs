//! Time-derived record ids: `<prefix><yyyymmddHHMMSSffffff>-<seq>`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

pub const EVIDENCE_PREFIX: &str = "E";
pub const CHAIN_PREFIX: &str = "C";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Next id for `prefix` at `at`. The process-wide sequence keeps ids unique
/// when several are minted within the same microsecond.
pub fn next_id(prefix: &str, at: DateTime<Utc>) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}{}-{:06}", prefix, at.format("%Y%m%d%H%M%S%6f"), seq % 1_000_000)
}

/// Ids are used as file names, so only a safe alphabet is accepted.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
