//! # Error Policy
//!
//! Fatal errors abort the git operation: the error and its remediation go to
//! stderr, nothing goes to stdout, and the process exits non-zero.

use crate::error::FilterError;
use std::process::ExitCode;
use tracing::error;

/// Report a fatal error and return the exit code for it
pub fn report_fatal(err: &anyhow::Error) -> ExitCode {
    error!("Filter failed: {:#}", err);
    eprintln!("sops-secret-filter: {err:#}");

    if let Some(remediation) = remediation_for(err) {
        eprintln!("  remediation: {remediation}");
    }

    ExitCode::FAILURE
}

/// Remediation text of the first `FilterError` in the chain
pub fn remediation_for(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FilterError>())
        .map(FilterError::remediation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use anyhow::Context;

    #[test]
    fn test_remediation_found_through_context() {
        let result: Result<(), FilterError> = Err(ConfigError::KeyNotFound {
            checked: ".age/age.key".to_string(),
        }
        .into());
        let err = result.context("clean failed").unwrap_err();
        let remediation = remediation_for(&err).unwrap();
        assert!(remediation.contains("SOPS_AGE_KEY_FILE"));
    }

    #[test]
    fn test_no_remediation_for_io_errors() {
        let err = anyhow::anyhow!("failed to read stdin");
        assert!(remediation_for(&err).is_none());
    }
}
