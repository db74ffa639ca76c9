//! # Recipient Resolution
//!
//! Resolves the age recipients for the file being filtered from the
//! `creation_rules` of `.sops.yaml`, falling back to the public key recorded in
//! the age key file.

use crate::config::keys::{read_public_keys, KeyLocator};
use crate::config::ConfigError;
use crate::constants::SOPS_CONFIG_FILE;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supplies the recipient public keys for an encryption
pub trait RecipientSource {
    fn recipients(&self) -> Result<Vec<String>, ConfigError>;
}

impl RecipientSource for Vec<String> {
    fn recipients(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.clone())
    }
}

impl<R: RecipientSource + ?Sized> RecipientSource for &R {
    fn recipients(&self) -> Result<Vec<String>, ConfigError> {
        (**self).recipients()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SopsConfig {
    #[serde(default)]
    creation_rules: Vec<CreationRule>,
}

#[derive(Debug, Deserialize)]
struct CreationRule {
    #[serde(default)]
    path_regex: Option<String>,
    #[serde(default)]
    age: Option<AgeRecipients>,
}

/// `age:` is either a comma-separated string or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AgeRecipients {
    Joined(String),
    List(Vec<String>),
}

impl AgeRecipients {
    fn keys(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            AgeRecipients::Joined(joined) => joined.split(',').collect(),
            AgeRecipients::List(list) => list.iter().flat_map(|item| item.split(',')).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Recipients of the first creation rule that matches `file_path`
///
/// A rule without `path_regex` matches every file. Rules with a `path_regex`
/// are skipped when the file path is unknown. Returns `None` when no matching
/// rule lists age recipients.
pub fn recipients_for_file(
    config_text: &str,
    config_path: &Path,
    file_path: Option<&str>,
) -> Result<Option<Vec<String>>, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidSopsConfig {
        path: config_path.to_path_buf(),
        message,
    };

    let config: SopsConfig = if config_text.trim().is_empty() {
        SopsConfig::default()
    } else {
        serde_yaml::from_str(config_text).map_err(|e| invalid(e.to_string()))?
    };

    for rule in &config.creation_rules {
        let matches = match (&rule.path_regex, file_path) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(pattern), Some(path)) => Regex::new(pattern)
                .map_err(|e| invalid(format!("path_regex '{pattern}': {e}")))?
                .is_match(path),
        };
        if !matches {
            continue;
        }

        // First matching rule wins, as in sops itself
        return Ok(rule.age.as_ref().map(AgeRecipients::keys).filter(|keys| !keys.is_empty()));
    }

    Ok(None)
}

/// Recipients from `.sops.yaml` with the age key file as fallback
#[derive(Debug, Clone)]
pub struct SopsRecipients {
    config_path: PathBuf,
    file_path: Option<String>,
    key_locator: KeyLocator,
}

impl SopsRecipients {
    pub fn new(repo_root: &Path, file_path: Option<String>, key_locator: KeyLocator) -> Self {
        Self {
            config_path: repo_root.join(SOPS_CONFIG_FILE),
            file_path,
            key_locator,
        }
    }
}

impl RecipientSource for SopsRecipients {
    fn recipients(&self) -> Result<Vec<String>, ConfigError> {
        if self.config_path.is_file() {
            let text = std::fs::read_to_string(&self.config_path).map_err(|source| {
                ConfigError::Io {
                    path: self.config_path.clone(),
                    source,
                }
            })?;
            if let Some(keys) =
                recipients_for_file(&text, &self.config_path, self.file_path.as_deref())?
            {
                debug!(
                    "Resolved {} recipients from {}",
                    keys.len(),
                    self.config_path.display()
                );
                return Ok(keys);
            }
        }

        let key_file = self.key_locator.resolve()?;
        let keys = read_public_keys(&key_file)?;
        if keys.is_empty() {
            return Err(ConfigError::NoRecipients {
                file: self
                    .file_path
                    .clone()
                    .unwrap_or_else(|| "<stdin>".to_string()),
            });
        }
        debug!("Resolved {} recipients from {}", keys.len(), key_file.display());
        Ok(keys)
    }
}
