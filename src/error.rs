//! # Filter Errors
//!
//! Fatal errors raised while transforming a document. Passthrough cases never
//! produce an error; everything here aborts the surrounding git operation.

use crate::config::ConfigError;
use crate::manifest::{HarvestError, RewriteError};
use crate::sops::EngineError;
use thiserror::Error;

/// Fatal error for one filter invocation
#[derive(Debug, Error)]
pub enum FilterError {
    /// Sensitive field groups are malformed or inconsistent with the document kind
    #[error("malformed secret manifest: {0}")]
    Harvest(#[from] HarvestError),
    /// The SOPS engine could not produce a complete result
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Key material or recipients could not be resolved
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The rewritten manifest did not carry the expected content
    #[error("failed to rewrite manifest: {0}")]
    Rewrite(#[from] RewriteError),
}

impl FilterError {
    /// Get remediation guidance for this error
    pub fn remediation(&self) -> String {
        match self {
            FilterError::Harvest(_) => {
                "Fix the `data` / `stringData` sections so they are mappings of string keys to string values, and make sure the document kind matches its content (plaintext `Secret`, encrypted `SopsSecret`).".to_string()
            }
            FilterError::Engine(e) => e.remediation(),
            FilterError::Config(e) => e.remediation(),
            FilterError::Rewrite(_) => {
                "Write the manifest as a block-style YAML mapping with `kind`, `data` and `stringData` at the top level.".to_string()
            }
        }
    }
}
