//! Tamper-evident audit evidence.
//!
//! Evidence records are immutable JSON documents whose `hash` is the SHA-256
//! of the canonical serialization of their content. Chains link evidence ids
//! into ordered derivation paths. Both live as write-once files under a
//! store root.

pub mod canonical;
pub mod chain;
pub mod error;
mod finite;
pub mod id;
pub mod model;
pub mod store;
pub mod verify;

pub use canonical::{content_hash, CanonicalBytes};
pub use error::{EvidenceError, Result};
pub use model::{Evidence, EvidenceChain, NewEvidence, ResolvedChain};
pub use store::{EvidenceStore, VIOLATION_EVIDENCE};
pub use verify::{ChainIntegrity, Integrity, IntegrityReport};

#[cfg(test)]
mod tests;
