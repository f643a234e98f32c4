//! Canonical JSON bytes and their SHA-256 digest.
//!
//! Object keys are sorted (by UTF-8 bytes) at every depth and output is
//! compact, so two structurally equal values always hash the same no matter
//! how they were built or in which order their keys were inserted.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{EvidenceError, Result};
use crate::finite::ensure_finite;

/// Bytes of a value in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn new(obj: &impl Serialize) -> Result<Self> {
        Ok(Self::from_value(&to_content_value(obj)?))
    }

    pub fn from_value(value: &Value) -> Self {
        let mut out = Vec::new();
        write_canonical(value, &mut out);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lower-case hex SHA-256 of the canonical bytes.
    pub fn sha256_hex(&self) -> String {
        let digest = Sha256::digest(&self.0);
        format!("{digest:x}")
    }
}

/// Converts `obj` to a JSON value, refusing NaN and infinities instead of
/// letting them degrade to `null`.
pub(crate) fn to_content_value(obj: &(impl Serialize + ?Sized)) -> Result<Value> {
    ensure_finite(obj).map_err(|e| EvidenceError::Serialization(e.to_string()))?;
    serde_json::to_value(obj).map_err(|e| EvidenceError::Serialization(e.to_string()))
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Digest of a JSON value's canonical form.
pub fn content_hash(value: &Value) -> String {
    CanonicalBytes::from_value(value).sha256_hex()
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(b':');
                write_canonical(val, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    // Scalars and strings use serde_json's compact encoding.
    out.extend_from_slice(value.to_string().as_bytes());
}
