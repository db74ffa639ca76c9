//! # SOPS Binary Engine
//!
//! Runs the `sops` executable over stdin/stdout pipes. Only the harvested field
//! groups (plus the `sops` block when decrypting) are handed to the process, so
//! the rest of the manifest never reaches the engine and nothing touches disk.

use crate::config::keys::KeyLocator;
use crate::config::ConfigError;
use crate::constants::ENV_AGE_KEY_FILE;
use crate::manifest::harvest::{harvest_fields, FieldSet};
use crate::manifest::render::render_group;
use crate::sops::engine::{EncryptionEngine, SealedFields, SopsMetadata};
use crate::sops::error::{classify_sops_error, EngineError, EngineFailureReason, EngineOperation};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error};
use zeroize::Zeroizing;

/// The real encryption engine: the `sops` CLI with age keys
#[derive(Debug, Clone)]
pub struct SopsBinaryEngine {
    binary: Option<PathBuf>,
    key_locator: KeyLocator,
}

impl SopsBinaryEngine {
    /// `binary` overrides the PATH lookup of `sops`
    pub fn new(binary: Option<PathBuf>, key_locator: KeyLocator) -> Self {
        Self {
            binary,
            key_locator,
        }
    }

    fn sops_path(&self, operation: EngineOperation) -> Result<PathBuf, EngineError> {
        match &self.binary {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(EngineError::new(
                operation,
                EngineFailureReason::BinaryNotFound,
                format!("configured sops binary {} does not exist", path.display()),
            )),
            None => which::which("sops").map_err(|e| {
                EngineError::new(
                    operation,
                    EngineFailureReason::BinaryNotFound,
                    format!("sops binary not found in PATH: {e}"),
                )
            }),
        }
    }

    fn key_file(&self, operation: EngineOperation) -> Result<PathBuf, EngineError> {
        self.key_locator.resolve().map_err(|e| match e {
            ConfigError::KeyNotFound { .. } => {
                EngineError::new(operation, EngineFailureReason::KeyNotFound, e.to_string())
            }
            other => EngineError::new(operation, EngineFailureReason::Unknown, other.to_string()),
        })
    }

    /// Pipe `input` through `sops <args> /dev/stdin` and return its stdout
    fn run(
        &self,
        operation: EngineOperation,
        args: &[&str],
        input: &str,
    ) -> Result<Zeroizing<String>, EngineError> {
        let sops_path = self.sops_path(operation)?;
        let key_file = self.key_file(operation)?;

        // Empty working directory: no .sops.yaml may override recipients or key selection
        let workdir = tempfile::tempdir().map_err(|e| {
            EngineError::new(
                operation,
                EngineFailureReason::Unknown,
                format!("failed to create working directory for sops: {e}"),
            )
        })?;

        debug!(
            "Executing: {} {} /dev/stdin (key file {})",
            sops_path.display(),
            args.join(" "),
            key_file.display()
        );

        let mut child = Command::new(&sops_path)
            .args(args)
            .arg("/dev/stdin")
            .current_dir(workdir.path())
            .env(ENV_AGE_KEY_FILE, &key_file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(operation, &sops_path, e))?;

        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            // stdin is fed while stdout is drained
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input.as_bytes())?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });

        let (output, written) = output;
        let output = output.map_err(|e| {
            EngineError::new(
                operation,
                EngineFailureReason::Unknown,
                format!("failed to wait for sops: {e}"),
            )
        })?;
        let stdout = Zeroizing::new(output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code();
            let reason = classify_sops_error(&stderr, exit_code);
            error!(
                "SOPS {} failed with exit code {:?} ({})",
                operation,
                exit_code,
                reason.as_str()
            );
            return Err(EngineError::new(
                operation,
                reason,
                format!("{} (exit code: {})", stderr.trim(), exit_code.unwrap_or(-1)),
            ));
        }

        if let Err(e) = written {
            return Err(EngineError::new(
                operation,
                EngineFailureReason::Unknown,
                format!("failed to write to sops stdin: {e}"),
            ));
        }

        let text = std::str::from_utf8(&stdout).map_err(|e| {
            EngineError::new(
                operation,
                EngineFailureReason::CorruptedFile,
                format!("sops output is not valid UTF-8: {e}"),
            )
        })?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

fn spawn_error(operation: EngineOperation, path: &Path, e: std::io::Error) -> EngineError {
    let reason = if e.kind() == std::io::ErrorKind::NotFound {
        EngineFailureReason::BinaryNotFound
    } else {
        EngineFailureReason::Unknown
    };
    EngineError::new(
        operation,
        reason,
        format!("failed to spawn {}: {e}", path.display()),
    )
}

/// Mini document holding only the sensitive groups, in harvested order
fn engine_input(fields: &FieldSet) -> Zeroizing<String> {
    let mut document = Zeroizing::new(String::new());
    for group in fields.groups() {
        document.push_str(&render_group(group, fields.in_group(group)));
    }
    document
}

fn parse_output(operation: EngineOperation, output: &str) -> Result<FieldSet, EngineError> {
    let document: serde_yaml::Value = serde_yaml::from_str(output).map_err(|e| {
        EngineError::new(
            operation,
            EngineFailureReason::CorruptedFile,
            format!("sops output is not valid YAML: {e}"),
        )
    })?;
    harvest_fields(&document).map_err(|e| {
        EngineError::new(
            operation,
            EngineFailureReason::IncompleteResult,
            format!("unexpected sops output: {e}"),
        )
    })
}

impl EncryptionEngine for SopsBinaryEngine {
    fn encrypt(&self, fields: &FieldSet, recipients: &[String]) -> Result<SealedFields, EngineError> {
        let operation = EngineOperation::Encrypt;
        if recipients.is_empty() {
            return Err(EngineError::new(
                operation,
                EngineFailureReason::InvalidKeyFormat,
                "no age recipients supplied",
            ));
        }

        let recipients = recipients.join(",");
        let input = engine_input(fields);
        let output = self.run(
            operation,
            &[
                "--encrypt",
                "--input-type",
                "yaml",
                "--output-type",
                "yaml",
                "--age",
                &recipients,
            ],
            &input,
        )?;

        let sealed = parse_output(operation, &output)?;
        let metadata = SopsMetadata::extract(&output).ok_or_else(|| {
            EngineError::new(
                operation,
                EngineFailureReason::IncompleteResult,
                "sops output has no sops metadata block",
            )
        })?;

        Ok(SealedFields {
            fields: sealed,
            metadata,
        })
    }

    fn decrypt(&self, fields: &FieldSet, metadata: &SopsMetadata) -> Result<FieldSet, EngineError> {
        let operation = EngineOperation::Decrypt;
        let mut input = engine_input(fields);
        // The block may come from a CRLF document; the mini document is LF
        input.push_str(&metadata.block().replace("\r\n", "\n"));

        let output = self.run(
            operation,
            &[
                "--decrypt",
                "--input-type",
                "yaml",
                "--output-type",
                "yaml",
            ],
            &input,
        )?;
        parse_output(operation, &output)
    }
}
