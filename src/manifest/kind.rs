//! # Manifest Classifier
//!
//! Determines document shape from the `kind` field.

use crate::constants::{KIND_SECRET, KIND_SOPS_SECRET};
use serde_yaml::Value;

/// Document shape as far as the filter is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// Plaintext Kubernetes Secret
    Secret,
    /// Encrypted SopsSecret
    SopsSecret,
    /// Any other kind, or no kind at all
    Other,
}

impl ManifestKind {
    /// The `kind` value written for this shape
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Secret => KIND_SECRET,
            ManifestKind::SopsSecret => KIND_SOPS_SECRET,
            ManifestKind::Other => "Other",
        }
    }
}

/// Classify a parsed document by exact match on its `kind`
pub fn classify(document: &Value) -> ManifestKind {
    match document.get("kind").and_then(Value::as_str) {
        Some(KIND_SECRET) => ManifestKind::Secret,
        Some(KIND_SOPS_SECRET) => ManifestKind::SopsSecret,
        _ => ManifestKind::Other,
    }
}
