//! # Filter Configuration
//!
//! Filter-level configuration loaded from environment variables, plus discovery of
//! the age key file and the SOPS recipients for the file being filtered.
//!
//! All configuration has sensible defaults and can be overridden via environment
//! variables or command-line flags.

mod filter;
pub mod keys;
pub mod recipients;

pub use filter::FilterConfig;
pub use keys::KeyLocator;
pub use recipients::{RecipientSource, SopsRecipients};

use std::path::PathBuf;
use thiserror::Error;

/// Key material and recipient resolution failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no age key file found (checked: {checked})")]
    KeyNotFound { checked: String },
    #[error("no age recipients configured for {file}")]
    NoRecipients { file: String },
    #[error("invalid {}: {message}", path.display())]
    InvalidSopsConfig { path: PathBuf, message: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Get remediation guidance for this error
    pub fn remediation(&self) -> String {
        match self {
            ConfigError::KeyNotFound { .. } => {
                "Set SOPS_AGE_KEY_FILE, or place the age key at .age/age.key in the repository or at ~/.config/sops/age/keys.txt.".to_string()
            }
            ConfigError::NoRecipients { .. } => {
                "Add a creation rule with `age:` recipients to .sops.yaml, or make sure the age key file carries a `# public key:` line.".to_string()
            }
            ConfigError::InvalidSopsConfig { .. } => {
                "Fix .sops.yaml: creation_rules must be a list of rules with an optional path_regex and an age recipient list.".to_string()
            }
            ConfigError::Io { .. } => {
                "Check that the file exists and is readable by the current user.".to_string()
            }
        }
    }
}
