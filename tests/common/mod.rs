//! Shared test helpers: an in-process encryption engine and manifest fixtures.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sops_secret_filter::config::{ConfigError, RecipientSource};
use sops_secret_filter::manifest::{FieldSet, SecretField};
use sops_secret_filter::sops::{
    EncryptionEngine, EngineError, EngineFailureReason, EngineOperation, SealedFields,
    SopsMetadata,
};
use sops_secret_filter::{Filter, FilterConfig};
use std::cell::Cell;

pub const FAKE_PREFIX: &str = "ENC[FAKE,data:";
pub const FAKE_SUFFIX: &str = ",type:str]";
pub const RECIPIENT: &str = "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehaviour {
    /// Encrypt and decrypt faithfully
    Faithful,
    /// Fail every call with the given reason
    Fail(EngineFailureReason),
    /// Silently drop the last value
    DropLast,
    /// Return the last value untransformed
    SkipLast,
}

/// Reversible fake: ciphertext is `ENC[FAKE,data:<base64>,type:str]`
///
/// Empty values stay empty in both directions, as with sops.
#[derive(Debug)]
pub struct FakeEngine {
    behaviour: FakeBehaviour,
    calls: Cell<usize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::with_behaviour(FakeBehaviour::Faithful)
    }

    pub fn with_behaviour(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour,
            calls: Cell::new(0),
        }
    }

    /// Number of encrypt + decrypt calls so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn transform(
        &self,
        operation: EngineOperation,
        fields: &FieldSet,
        convert: impl Fn(&str) -> Result<String, EngineError>,
    ) -> Result<FieldSet, EngineError> {
        self.calls.set(self.calls.get() + 1);
        if let FakeBehaviour::Fail(reason) = self.behaviour {
            return Err(EngineError::new(operation, reason, "fake engine failure"));
        }

        let last = fields.len().saturating_sub(1);
        let mut output = FieldSet::new();
        for (index, field) in fields.iter().enumerate() {
            let value = match self.behaviour {
                FakeBehaviour::DropLast if index == last => continue,
                FakeBehaviour::SkipLast if index == last => field.value.clone(),
                _ => convert(&field.value)?,
            };
            output.push(SecretField::new(field.group, field.key.clone(), value));
        }
        Ok(output)
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub fn fake_encrypt(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    format!("{FAKE_PREFIX}{}{FAKE_SUFFIX}", STANDARD.encode(value))
}

pub fn fake_decrypt(value: &str) -> Option<String> {
    if value.is_empty() {
        return Some(String::new());
    }
    let encoded = value.strip_prefix(FAKE_PREFIX)?.strip_suffix(FAKE_SUFFIX)?;
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

impl EncryptionEngine for FakeEngine {
    fn encrypt(&self, fields: &FieldSet, recipients: &[String]) -> Result<SealedFields, EngineError> {
        let sealed = self.transform(EngineOperation::Encrypt, fields, |value| Ok(fake_encrypt(value)))?;
        let mut block = String::from("sops:\n    age:\n");
        for recipient in recipients {
            block.push_str(&format!("        - recipient: {recipient}\n"));
        }
        block.push_str("    mac: ENC[FAKE,data:bWFj,type:str]\n    version: 3.8.1\n");
        Ok(SealedFields {
            fields: sealed,
            metadata: SopsMetadata::new(block),
        })
    }

    fn decrypt(&self, fields: &FieldSet, metadata: &SopsMetadata) -> Result<FieldSet, EngineError> {
        if !metadata.block().starts_with("sops:") {
            return Err(EngineError::new(
                EngineOperation::Decrypt,
                EngineFailureReason::IntegrityFailure,
                "metadata block missing",
            ));
        }
        self.transform(EngineOperation::Decrypt, fields, |value| {
            fake_decrypt(value).ok_or_else(|| {
                EngineError::new(
                    EngineOperation::Decrypt,
                    EngineFailureReason::WrongKey,
                    format!("not a fake ciphertext: {value}"),
                )
            })
        })
    }
}

/// Recipient source that always fails
#[derive(Debug)]
pub struct NoRecipients;

impl RecipientSource for NoRecipients {
    fn recipients(&self) -> Result<Vec<String>, ConfigError> {
        Err(ConfigError::NoRecipients {
            file: "secret.yaml".to_string(),
        })
    }
}

/// Filter with the default marker, the fake engine and one recipient
pub fn fake_filter() -> Filter<FakeEngine, Vec<String>> {
    fake_filter_with(&FilterConfig::default(), FakeEngine::new())
}

pub fn fake_filter_with(
    config: &FilterConfig,
    engine: FakeEngine,
) -> Filter<FakeEngine, Vec<String>> {
    Filter::new(config, engine, vec![RECIPIENT.to_string()])
}

pub fn protect(filter: &Filter<FakeEngine, Vec<String>>, input: &str) -> String {
    String::from_utf8(filter.protect(input.as_bytes()).unwrap()).unwrap()
}

pub fn reveal(filter: &Filter<FakeEngine, Vec<String>>, input: &str) -> String {
    String::from_utf8(filter.reveal(input.as_bytes()).unwrap()).unwrap()
}

pub fn parse(yaml: &str) -> serde_yaml::Value {
    serde_yaml::from_str(yaml).unwrap()
}

pub const BASIC_SECRET: &str = r#"apiVersion: v1
kind: Secret
metadata:
  name: basic-secret
  namespace: default
  annotations:
    def.ms/sops-encrypt: "true"
type: Opaque
stringData:
  password: supersecretpassword123
"#;

pub const PUBLIC_SECRET: &str = r#"apiVersion: v1
kind: Secret
metadata:
  name: public-config
  annotations:
    description: "Public configuration"
type: Opaque
stringData:
  public-config: "This data is not sensitive"
"#;

pub const MIXED_SECRET: &str = r#"# Database credentials for the api service
apiVersion: v1
kind: Secret
metadata:
  name: api-credentials
  namespace: api
  labels:
    app.kubernetes.io/name: api
  annotations:
    def.ms/sops-encrypt: "true"
    owner: platform-team
type: Opaque
data:
  username: YWRtaW4=
  token: dG9rZW4tdmFsdWU=
stringData:
  config.yaml: |
    server:
      port: 8080

    database:
      host: postgres.api.svc
  password: hunter2
immutable: false
"#;
