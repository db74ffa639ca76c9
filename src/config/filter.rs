//! # Filter Settings
//!
//! Marker annotation and engine settings loaded from environment variables.

use crate::constants::*;
use crate::manifest::{AnnotationGate, AnnotationMarker};
use std::path::PathBuf;

/// Filter configuration
///
/// Passed explicitly into the pipeline so differently configured filters can run
/// side by side.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Annotation that opts a Secret into encryption
    pub marker: AnnotationMarker,
    /// When false, every Secret / SopsSecret is in scope regardless of annotations
    pub require_annotation: bool,
    /// Explicit path to the `sops` executable (defaults to PATH lookup)
    pub sops_binary: Option<PathBuf>,
    /// Repository root; git runs filters from the top of the working tree
    pub repo_root: PathBuf,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            marker: AnnotationMarker::default(),
            require_annotation: true,
            sops_binary: None,
            repo_root: current_dir(),
        }
    }
}

impl FilterConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            marker: AnnotationMarker {
                key: env_var_or_default(ENV_ANNOTATION_KEY, DEFAULT_ANNOTATION_KEY.to_string()),
                value: env_var_or_default(
                    ENV_ANNOTATION_VALUE,
                    DEFAULT_ANNOTATION_VALUE.to_string(),
                ),
            },
            require_annotation: env_var_or_default(ENV_REQUIRE_ANNOTATION, true),
            sops_binary: std::env::var_os(ENV_SOPS_BINARY)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            repo_root: current_dir(),
        }
    }

    /// Annotation gate for this configuration
    pub fn gate(&self) -> AnnotationGate {
        AnnotationGate::new(self.marker.clone(), self.require_annotation)
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
