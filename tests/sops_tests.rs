//! # SOPS Engine Tests
//!
//! Failure classification and detection against realistic sops output, plus a
//! round trip through the real `sops` binary.
//!
//! The round trip needs `sops` on PATH and an age key in `SOPS_AGE_KEY_FILE`;
//! without them it prints a skip notice and returns.

use sops_secret_filter::config::keys::read_public_keys;
use sops_secret_filter::config::KeyLocator;
use sops_secret_filter::pipeline::Direction;
use sops_secret_filter::sops::{
    classify_sops_error, is_ciphertext, EngineError, EngineFailureReason, EngineOperation,
    SopsBinaryEngine, SopsMetadata,
};
use sops_secret_filter::{Filter, FilterConfig};
use std::env;
use std::path::PathBuf;

/// Test helper: age key file for the real sops tests
/// In CI, this should point at a throwaway key
fn get_test_age_key() -> Option<PathBuf> {
    let path = PathBuf::from(env::var("SOPS_AGE_KEY_FILE").ok()?);
    path.is_file().then_some(path)
}

#[test]
fn test_classify_real_sops_messages() {
    let cases = [
        (
            "Failed to get the data key required to decrypt the SOPS file.\n\nGroup 0: FAILED\n  age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p: FAILED\n    - | no identity matched any of the recipients",
            Some(128),
            EngineFailureReason::KeyNotFound,
        ),
        (
            "MAC mismatch. File has 1A2B, computed 3C4D",
            Some(51),
            EngineFailureReason::IntegrityFailure,
        ),
        (
            "Error unmarshalling input yaml: yaml: line 3: could not find expected ':'",
            Some(1),
            EngineFailureReason::CorruptedFile,
        ),
        (
            "could not parse age recipients: failed to parse input as Bech32-encoded age public key",
            Some(1),
            EngineFailureReason::InvalidKeyFormat,
        ),
        (
            "Error getting data key: 0 successful groups required, got 0: no identity matched any of the recipients",
            Some(1),
            EngineFailureReason::WrongKey,
        ),
        ("something unexpected happened", None, EngineFailureReason::Unknown),
    ];

    for (message, code, expected) in cases {
        assert_eq!(classify_sops_error(message, code), expected, "{message}");
    }
}

#[test]
fn test_failure_reason_labels_and_remediation() {
    let reasons = [
        EngineFailureReason::KeyNotFound,
        EngineFailureReason::WrongKey,
        EngineFailureReason::InvalidKeyFormat,
        EngineFailureReason::IntegrityFailure,
        EngineFailureReason::CorruptedFile,
        EngineFailureReason::UnsupportedFormat,
        EngineFailureReason::BinaryNotFound,
        EngineFailureReason::IncompleteResult,
        EngineFailureReason::Unknown,
    ];

    for reason in reasons {
        let label = reason.as_str();
        assert!(!label.is_empty());
        assert_eq!(label, label.to_lowercase(), "label must be snake_case");
        assert!(!reason.remediation().is_empty());
    }

    assert!(EngineFailureReason::KeyNotFound
        .remediation()
        .contains("SOPS_AGE_KEY_FILE"));
    assert!(EngineFailureReason::BinaryNotFound
        .remediation()
        .contains("SOPS_FILTER_SOPS_BINARY"));
}

#[test]
fn test_engine_error_display() {
    let error = EngineError::new(
        EngineOperation::Encrypt,
        EngineFailureReason::BinaryNotFound,
        "sops binary not found in PATH",
    );
    assert_eq!(
        error.to_string(),
        "SOPS encryption failed: BinaryNotFound - sops binary not found in PATH"
    );
    assert_eq!(error.remediation(), EngineFailureReason::BinaryNotFound.remediation());
}

#[test]
fn test_sops_output_detection() {
    let output = r#"stringData:
    password: ENC[AES256_GCM,data:ttg0Ng==,iv:1Zr9pGc5cLVi4e+3OhkQYdc0fZQmGIG0lZCFZqM4RMw=,tag:ceRZKSr0Hh5aTmfz5Bgbsw==,type:str]
sops:
    age:
        - recipient: age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p
          enc: |
            -----BEGIN AGE ENCRYPTED FILE-----
            YWdlLWVuY3J5cHRpb24ub3JnL3YxCi0+IFgyNTUxOSBsZ0Jm
            -----END AGE ENCRYPTED FILE-----
    lastmodified: "2024-01-01T00:00:00Z"
    mac: ENC[AES256_GCM,data:Zm9v,iv:YmFy,tag:YmF6,type:str]
    unencrypted_suffix: _unencrypted
    version: 3.8.1
"#;
    let doc: serde_yaml::Value = serde_yaml::from_str(output).unwrap();
    assert!(is_ciphertext(doc["stringData"]["password"].as_str().unwrap()));

    let metadata = SopsMetadata::extract(output).unwrap();
    assert!(metadata.block().starts_with("sops:\n    age:\n"));
    assert!(metadata.block().ends_with("    version: 3.8.1\n"));
    assert!(!metadata.block().contains("stringData"));
}

#[test]
fn test_round_trip_with_sops_binary() {
    let Some(key_file) = get_test_age_key() else {
        println!("⚠️  Skipping test: SOPS_AGE_KEY_FILE not set or missing");
        return;
    };
    if which::which("sops").is_err() {
        println!("⚠️  Skipping test: sops binary not found in PATH");
        return;
    }

    let recipients = read_public_keys(&key_file).unwrap();
    assert!(!recipients.is_empty(), "key file has no '# public key:' line");

    let repo = tempfile::tempdir().unwrap();
    let config = FilterConfig {
        repo_root: repo.path().to_path_buf(),
        ..FilterConfig::default()
    };
    let engine = SopsBinaryEngine::new(None, KeyLocator::new(Some(key_file), repo.path(), None));
    let filter = Filter::new(&config, engine, recipients);

    let input = r#"apiVersion: v1
kind: Secret
metadata:
  name: basic-secret
  annotations:
    def.ms/sops-encrypt: "true"
type: Opaque
data:
  token: dG9rZW4=
stringData:
  password: supersecretpassword123
  config.yaml: |
    server:
      port: 8080
"#;

    let protected = filter.apply(Direction::Protect, input.as_bytes()).unwrap();
    let protected = String::from_utf8(protected).unwrap();
    assert!(protected.contains("kind: SopsSecret"));
    assert!(!protected.contains("supersecretpassword123"));
    assert!(protected.contains("\nsops:\n"));

    let revealed = filter.apply(Direction::Reveal, protected.as_bytes()).unwrap();
    assert_eq!(String::from_utf8(revealed).unwrap(), input);
}
