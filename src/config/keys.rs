//! # Age Key Discovery
//!
//! Resolves the age private key file with the precedence:
//!
//! 1. `SOPS_AGE_KEY_FILE`, when it names an existing file
//! 2. `.age/age.key` in the repository
//! 3. `$XDG_CONFIG_HOME/sops/age/keys.txt` (or `~/.config/sops/age/keys.txt`)
//!
//! Key material is only read, never written.

use crate::config::ConfigError;
use crate::constants::{DEFAULT_AGE_KEY_PATH, ENV_AGE_KEY_FILE, USER_AGE_KEY_PATH};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocator {
    explicit: Option<PathBuf>,
    repo_root: PathBuf,
    user_config_dir: Option<PathBuf>,
}

impl KeyLocator {
    pub fn new(
        explicit: Option<PathBuf>,
        repo_root: impl Into<PathBuf>,
        user_config_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            explicit,
            repo_root: repo_root.into(),
            user_config_dir,
        }
    }

    /// Build a locator from `SOPS_AGE_KEY_FILE`, `XDG_CONFIG_HOME` and `HOME`
    pub fn from_env(repo_root: &Path) -> Self {
        let explicit = std::env::var_os(ENV_AGE_KEY_FILE)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let user_config_dir = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .filter(|value| !value.is_empty())
                    .map(|home| PathBuf::from(home).join(".config"))
            });
        Self::new(explicit, repo_root, user_config_dir)
    }

    /// Candidate paths in precedence order
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(explicit) = &self.explicit {
            candidates.push(explicit.clone());
        }
        candidates.push(self.repo_root.join(DEFAULT_AGE_KEY_PATH));
        if let Some(config_dir) = &self.user_config_dir {
            candidates.push(config_dir.join(USER_AGE_KEY_PATH));
        }
        candidates
    }

    /// First existing candidate, made absolute
    pub fn resolve(&self) -> Result<PathBuf, ConfigError> {
        let candidates = self.candidates();
        for candidate in &candidates {
            if candidate.is_file() {
                let resolved = std::path::absolute(candidate).map_err(|source| ConfigError::Io {
                    path: candidate.clone(),
                    source,
                })?;
                debug!("Using age key file {}", resolved.display());
                return Ok(resolved);
            }
        }

        Err(ConfigError::KeyNotFound {
            checked: candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Public keys listed in an age key file as `# public key: age1...` comments
pub fn read_public_keys(key_file: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(key_file).map_err(|source| ConfigError::Io {
        path: key_file.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("# public key:"))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect())
}
