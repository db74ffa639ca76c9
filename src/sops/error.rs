//! # SOPS Engine Error Types
//!
//! Defines error types for SOPS encryption and decryption with classification of failures.

use std::fmt;
use thiserror::Error;

/// Direction of the engine call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
    Encrypt,
    Decrypt,
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineOperation::Encrypt => f.write_str("encryption"),
            EngineOperation::Decrypt => f.write_str("decryption"),
        }
    }
}

/// SOPS engine error with classification
#[derive(Debug, Error)]
#[error("SOPS {operation} failed: {reason:?} - {message}")]
pub struct EngineError {
    pub operation: EngineOperation,
    pub reason: EngineFailureReason,
    pub message: String,
}

impl EngineError {
    pub fn new(
        operation: EngineOperation,
        reason: EngineFailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            reason,
            message: message.into(),
        }
    }

    /// Get remediation guidance for this error
    pub fn remediation(&self) -> String {
        self.reason.remediation()
    }
}

/// Classification of SOPS engine failure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFailureReason {
    /// No age key file could be resolved, or SOPS could not retrieve the data key
    KeyNotFound,
    /// The key does not match any recipient of the document
    WrongKey,
    /// Key or recipient format invalid
    InvalidKeyFormat,
    /// MAC missing or mismatched
    IntegrityFailure,
    /// Engine input or output could not be read
    CorruptedFile,
    /// File format unsupported
    UnsupportedFormat,
    /// `sops` executable not available
    BinaryNotFound,
    /// The engine dropped, renamed or failed to transform at least one value
    IncompleteResult,
    /// Unknown error
    Unknown,
}

impl EngineFailureReason {
    /// Get snake_case reason string for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineFailureReason::KeyNotFound => "key_not_found",
            EngineFailureReason::WrongKey => "wrong_key",
            EngineFailureReason::InvalidKeyFormat => "invalid_key_format",
            EngineFailureReason::IntegrityFailure => "integrity_failure",
            EngineFailureReason::CorruptedFile => "corrupted_file",
            EngineFailureReason::UnsupportedFormat => "unsupported_format",
            EngineFailureReason::BinaryNotFound => "binary_not_found",
            EngineFailureReason::IncompleteResult => "incomplete_result",
            EngineFailureReason::Unknown => "unknown",
        }
    }

    /// Get remediation guidance for this error type
    pub fn remediation(&self) -> String {
        match self {
            EngineFailureReason::KeyNotFound => {
                "Provide an age key: set SOPS_AGE_KEY_FILE, or place the key at .age/age.key in the repository or at ~/.config/sops/age/keys.txt.".to_string()
            }
            EngineFailureReason::WrongKey => {
                "The age key does not match any recipient of this SopsSecret. Verify the key against the recipients in .sops.yaml.".to_string()
            }
            EngineFailureReason::InvalidKeyFormat => {
                "Ensure the age key file contains AGE-SECRET-KEY-1... identities and .sops.yaml lists age1... recipients.".to_string()
            }
            EngineFailureReason::IntegrityFailure => {
                "The SopsSecret MAC does not match its values. The stored document was modified outside of SOPS; restore it from history or re-encrypt the plaintext.".to_string()
            }
            EngineFailureReason::CorruptedFile => {
                "SOPS could not read the encrypted values. Verify the ciphertext and the sops metadata block were not edited by hand.".to_string()
            }
            EngineFailureReason::UnsupportedFormat => {
                "SOPS rejected the document format. Only YAML manifests are supported.".to_string()
            }
            EngineFailureReason::BinaryNotFound => {
                "Install sops (https://github.com/getsops/sops) and make sure it is on PATH, or point SOPS_FILTER_SOPS_BINARY at it.".to_string()
            }
            EngineFailureReason::IncompleteResult => {
                "SOPS did not return every value. Check .sops.yaml for encrypted_regex / unencrypted_suffix rules that exclude some keys.".to_string()
            }
            EngineFailureReason::Unknown => {
                "Unknown SOPS error. Re-run with RUST_LOG=sops_secret_filter=debug for the full engine output.".to_string()
            }
        }
    }
}

/// Classify SOPS error from error message and exit code
///
/// SOPS exit codes (from the SOPS `cmd/sops/codes` package):
/// - 2: Could not read input file
/// - 51: MAC mismatch
/// - 52: MAC not found
/// - 111: No encryption key found
/// - 128: Could not retrieve data key
/// - 203: File already encrypted
///
/// Exit codes are more reliable than error message parsing, so we check them first.
pub fn classify_sops_error(error_msg: &str, exit_code: Option<i32>) -> EngineFailureReason {
    if let Some(code) = exit_code {
        match code {
            111 | 128 => return EngineFailureReason::KeyNotFound,
            51 | 52 => return EngineFailureReason::IntegrityFailure,
            2 | 203 => return EngineFailureReason::CorruptedFile,
            // Exit code 1 is generic, fall through to message parsing
            _ => {}
        }
    }

    let error_lower = error_msg.to_lowercase();

    if error_lower.contains("no identity matched") || error_lower.contains("wrong key") {
        return EngineFailureReason::WrongKey;
    }

    if error_lower.contains("no decryption key")
        || error_lower.contains("key not found")
        || error_lower.contains("could not retrieve")
        || error_lower.contains("failed to get the data key")
    {
        return EngineFailureReason::KeyNotFound;
    }

    if error_lower.contains("invalid key")
        || error_lower.contains("malformed key")
        || error_lower.contains("bech32")
    {
        return EngineFailureReason::InvalidKeyFormat;
    }

    if error_lower.contains("mac mismatch") || error_lower.contains("mac not found") {
        return EngineFailureReason::IntegrityFailure;
    }

    if error_lower.contains("unsupported format") || error_lower.contains("unknown file type") {
        return EngineFailureReason::UnsupportedFormat;
    }

    if error_lower.contains("corrupt")
        || error_lower.contains("invalid file")
        || error_lower.contains("error unmarshalling")
    {
        return EngineFailureReason::CorruptedFile;
    }

    EngineFailureReason::Unknown
}
