//! # SOPS Encryption Detection
//!
//! Detects SOPS ciphertext values and the SOPS metadata block.

use crate::constants::{CIPHERTEXT_PREFIX, SOPS_METADATA_KEY};

/// Check if a single value is SOPS ciphertext
///
/// SOPS encrypted values look like `ENC[AES256_GCM,data:...,iv:...,tag:...,type:str]`.
/// Only the structural prefix and closing bracket are checked; the content is opaque.
pub fn is_ciphertext(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with(CIPHERTEXT_PREFIX) && trimmed.ends_with(']')
}

/// Check if a value is in the form sops stores it
///
/// sops leaves empty strings empty instead of wrapping them in `ENC[...]`.
pub fn is_stored_encrypted(value: &str) -> bool {
    value.is_empty() || is_ciphertext(value)
}

/// Check if a parsed document carries a top-level SOPS metadata block
pub fn has_sops_metadata(document: &serde_yaml::Value) -> bool {
    document.get(SOPS_METADATA_KEY).is_some()
}
