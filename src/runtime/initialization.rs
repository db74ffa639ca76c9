//! # Initialization
//!
//! Tracing subscriber setup. Stdout carries the filtered document, so every log
//! line goes to stderr.

use crate::constants::DEFAULT_LOG_FILTER;

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default `sops_secret_filter=warn` directive. A
/// subscriber that is already installed (tests, embedding) is left in place.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already initialized: {}", e);
    }
}
