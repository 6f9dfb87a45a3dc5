//! Idempotency key derivation.
//!
//! A key is a pure function of the record's origin system and origin id, so
//! re-deriving it from the same input always yields the same key.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Hex characters of the blake3 digest kept in the key.
const DIGEST_HEX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("origin_system is empty")]
    MissingOriginSystem,
    #[error("origin_id is empty")]
    MissingOriginId,
}

fn normalize(value: &str) -> String {
    value.nfc().collect::<String>().trim().to_string()
}

/// Derive `"{system}:{digest}"` from origin fields.
///
/// The system name is NFC-normalized, trimmed and lower-cased; the origin id
/// is NFC-normalized and trimmed but keeps its case.
pub fn derive_key(origin_system: &str, origin_id: &str) -> Result<String, KeyError> {
    let system = normalize(origin_system).to_lowercase();
    let id = normalize(origin_id);
    if system.is_empty() {
        return Err(KeyError::MissingOriginSystem);
    }
    if id.is_empty() {
        return Err(KeyError::MissingOriginId);
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(system.as_bytes());
    hasher.update(&[0]);
    hasher.update(id.as_bytes());
    let digest = hex::encode(hasher.finalize().as_bytes());

    let slug: String = system
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    Ok(format!("{}:{}", slug, &digest[..DIGEST_HEX_LEN]))
}

/// The digest part of a key (everything after the last `:`).
pub fn key_digest(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}
