//! Deterministic employee identity keys and readable public ids

use sha2::{Digest, Sha256};

use super::normalize::normalize_text;

/// SHA-256 hex digest over `"<normalized name>|<normalized vendor>"`.
///
/// Casing and whitespace differences in either input yield the same key.
pub fn employee_key(name: &str, vendor: &str) -> String {
    let base = format!("{}|{}", normalize_text(name), normalize_text(vendor));
    hex::encode(Sha256::digest(base.as_bytes()))
}

/// `LAST-FIRST-###` for multi-word names, `NAME-###` for single words.
///
/// The id is zero-padded to at least three digits. A blank name yields only
/// the padded id.
pub fn public_id(name: &str, numeric_id: i64) -> String {
    let normalized = normalize_text(name);
    let parts: Vec<&str> = normalized.split(' ').filter(|p| !p.is_empty()).collect();
    let base = match parts.as_slice() {
        [] => return format!("{:03}", numeric_id),
        [only] => only.to_string(),
        [first, .., last] => format!("{}-{}", last, first),
    };
    format!("{}-{:03}", base.to_uppercase(), numeric_id)
}
