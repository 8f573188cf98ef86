//! Key and Value Helpers
//!
//! Pure functions used by the facade: key validation, optional key hashing
//! and heap-size estimation of stored values.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

const STRING_CHAR_BYTES: u64 = 2;
const NUMBER_BYTES: u64 = 8;
const BOOLEAN_BYTES: u64 = 4;

/// Validates a caller supplied key, appending any issues to `errors`.
pub fn validate_key(key: &str, errors: &mut Vec<ValidationError>) {
    if key.is_empty() {
        errors.push(ValidationError::EmptyKey);
    } else if key.len() > MAX_KEY_LENGTH {
        errors.push(ValidationError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LENGTH,
        });
    }
}

/// Hashes a key into its hex-encoded SHA-256 digest.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves the key actually used against the store.
pub fn effective_key(key: &str, hash: bool) -> String {
    if hash {
        hash_key(key)
    } else {
        key.to_string()
    }
}

/// Estimates the in-memory footprint of a value in bytes.
///
/// Strings count two bytes per character, numbers eight, booleans four.
/// Object keys are counted as strings.
pub fn estimate_size(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => BOOLEAN_BYTES,
        Value::Number(_) => NUMBER_BYTES,
        Value::String(s) => string_size(s),
        Value::Array(items) => items.iter().map(estimate_size).sum(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| string_size(k) + estimate_size(v))
            .sum(),
    }
}

fn string_size(s: &str) -> u64 {
    s.chars().count() as u64 * STRING_CHAR_BYTES
}
