use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    /// Content (or metadata) cannot be represented as JSON.
    #[error("evidence content is not serializable: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("evidence not found: {0}")]
    NotFound(String),

    #[error("evidence chain not found: {0}")]
    ChainNotFound(String),

    #[error("an evidence chain needs at least one evidence id")]
    EmptyChain,

    #[error("chain references unknown evidence: {}", .0.join(", "))]
    UnknownEvidence(Vec<String>),

    #[error("record {id} already exists")]
    AlreadyExists { id: String },

    /// A stored record no longer parses.
    #[error("record {id} is unreadable: {reason}")]
    Corrupt { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
