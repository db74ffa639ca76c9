//! # sops-secret-filter
//!
//! Git clean/smudge filter entry point. Reads the whole blob from stdin, filters
//! it, and writes the result to stdout.
//!
//! ## Usage
//!
//! ```bash
//! # .git/config
//! [filter "sops-secret"]
//!     clean = sops-secret-filter clean %f
//!     smudge = sops-secret-filter smudge %f
//!     required = true
//!
//! # .gitattributes
//! *.yaml filter=sops-secret
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sops_secret_filter::pipeline::Direction;
use sops_secret_filter::runtime::{init_tracing, report_fatal};
use sops_secret_filter::{Filter, FilterConfig};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use zeroize::Zeroizing;

/// Encrypts annotated Kubernetes Secrets into SopsSecrets on clean and restores them on smudge
#[derive(Parser, Debug)]
#[command(name = "sops-secret-filter", version)]
#[command(about = "Git clean/smudge filter for Kubernetes Secrets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Annotation key that opts a Secret into encryption
    #[arg(long, global = true)]
    annotation_key: Option<String>,

    /// Required value of the opt-in annotation
    #[arg(long, global = true)]
    annotation_value: Option<String>,

    /// Only process Secrets carrying the opt-in annotation
    #[arg(long, global = true)]
    require_annotation: Option<bool>,

    /// Path to the sops executable (defaults to PATH lookup)
    #[arg(long, global = true)]
    sops_binary: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt Secrets read from stdin (git clean filter)
    Clean {
        /// Repository path of the file being filtered (git's %f)
        path: Option<String>,
    },
    /// Decrypt SopsSecrets read from stdin (git smudge filter)
    Smudge {
        /// Repository path of the file being filtered (git's %f)
        path: Option<String>,
    },
}

impl Cli {
    /// Environment configuration with command-line overrides applied
    fn config(&self) -> FilterConfig {
        let mut config = FilterConfig::from_env();
        if let Some(key) = &self.annotation_key {
            config.marker.key.clone_from(key);
        }
        if let Some(value) = &self.annotation_value {
            config.marker.value.clone_from(value);
        }
        if let Some(required) = self.require_annotation {
            config.require_annotation = required;
        }
        if let Some(binary) = &self.sops_binary {
            config.sops_binary = Some(binary.clone());
        }
        config
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_fatal(&e),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let (direction, path) = match &cli.command {
        Commands::Clean { path } => (Direction::Protect, path.clone()),
        Commands::Smudge { path } => (Direction::Reveal, path.clone()),
    };
    let config = cli.config();
    let label = path.as_deref().unwrap_or("<stdin>");
    debug!(
        "Running {} filter for {} (annotation {}={}, required: {})",
        direction,
        label,
        config.marker.key,
        config.marker.value,
        config.require_annotation
    );

    let mut input = Zeroizing::new(Vec::new());
    std::io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("Failed to read filter input from stdin")?;

    let filter = Filter::with_sops(&config, path.clone());
    let output = Zeroizing::new(
        filter
            .apply(direction, &input)
            .with_context(|| format!("{direction} filter failed for {label}"))?,
    );

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output)
        .context("Failed to write filter output to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
