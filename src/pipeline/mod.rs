//! # Filter Pipeline
//!
//! Drives one document through `PARSE → CLASSIFY → GATE → TRANSFORM`. Any
//! disqualifying condition before `TRANSFORM` passes the original bytes through
//! untouched; failures inside `TRANSFORM` are fatal for the whole stream.

pub mod stream;

pub use stream::{split_documents, Document};

use crate::config::{FilterConfig, KeyLocator, RecipientSource, SopsRecipients};
use crate::constants::KIND_SECRET;
use crate::error::FilterError;
use crate::manifest::layout::Layout;
use crate::manifest::{
    classify, harvest_ciphertext, harvest_plaintext, rewrite_document, AnnotationGate, FieldSet,
    GateDecision, HarvestError, ManifestKind, MetadataEdit, RewriteRequest,
};
use crate::sops::{invoke_decryption, invoke_encryption, EncryptionEngine, SopsBinaryEngine, SopsMetadata};
use serde_yaml::Value;
use std::fmt;
use tracing::{debug, info};

/// UTF-8 byte order mark, allowed at the start of a YAML stream
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Which way the filter runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Clean: `Secret` to encrypted `SopsSecret`
    Protect,
    /// Smudge: `SopsSecret` back to plaintext `Secret`
    Reveal,
}

impl Direction {
    /// Kind this direction transforms
    pub fn source(self) -> ManifestKind {
        match self {
            Direction::Protect => ManifestKind::Secret,
            Direction::Reveal => ManifestKind::SopsSecret,
        }
    }

    /// Kind this direction produces
    pub fn target(self) -> ManifestKind {
        match self {
            Direction::Protect => ManifestKind::SopsSecret,
            Direction::Reveal => ManifestKind::Secret,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Protect => f.write_str("clean"),
            Direction::Reveal => f.write_str("smudge"),
        }
    }
}

/// Why a document was returned unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// The input never mentions a recognized kind
    NoSecretKind,
    /// The input is not UTF-8
    NotUtf8,
    /// The document is not valid YAML
    Unparseable,
    /// Neither `Secret` nor `SopsSecret`
    OtherKind,
    /// Already in the kind this direction produces
    AlreadyTarget,
    /// The marker annotation is missing or has another value
    OutOfScope,
}

impl PassthroughReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassthroughReason::NoSecretKind => "no_secret_kind",
            PassthroughReason::NotUtf8 => "not_utf8",
            PassthroughReason::Unparseable => "unparseable",
            PassthroughReason::OtherKind => "other_kind",
            PassthroughReason::AlreadyTarget => "already_target",
            PassthroughReason::OutOfScope => "out_of_scope",
        }
    }
}

/// Result of filtering one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Transformed(String),
    Passthrough(PassthroughReason),
}

/// The clean/smudge filter
///
/// Generic over the encryption engine and the recipient source so the same
/// pipeline runs against `sops` in production and an in-process engine in tests.
#[derive(Debug)]
pub struct Filter<E, R> {
    gate: AnnotationGate,
    engine: E,
    recipients: R,
}

impl Filter<SopsBinaryEngine, SopsRecipients> {
    /// Filter backed by the `sops` binary, with keys and recipients discovered
    /// for `file_path` (the `%f` git passes)
    pub fn with_sops(config: &FilterConfig, file_path: Option<String>) -> Self {
        let key_locator = KeyLocator::from_env(&config.repo_root);
        let engine = SopsBinaryEngine::new(config.sops_binary.clone(), key_locator.clone());
        let recipients = SopsRecipients::new(&config.repo_root, file_path, key_locator);
        Self::new(config, engine, recipients)
    }
}

impl<E: EncryptionEngine, R: RecipientSource> Filter<E, R> {
    pub fn new(config: &FilterConfig, engine: E, recipients: R) -> Self {
        Self {
            gate: config.gate(),
            engine,
            recipients,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Clean direction over a whole stream
    pub fn protect(&self, input: &[u8]) -> Result<Vec<u8>, FilterError> {
        self.apply(Direction::Protect, input)
    }

    /// Smudge direction over a whole stream
    pub fn reveal(&self, input: &[u8]) -> Result<Vec<u8>, FilterError> {
        self.apply(Direction::Reveal, input)
    }

    /// Filter a full stream; either every document succeeds or nothing is returned
    pub fn apply(&self, direction: Direction, input: &[u8]) -> Result<Vec<u8>, FilterError> {
        let Ok(text) = std::str::from_utf8(input) else {
            debug!("Passthrough ({}): {}", direction, PassthroughReason::NotUtf8.as_str());
            return Ok(input.to_vec());
        };

        // Both recognized kinds contain "Secret"
        if !text.contains(KIND_SECRET) {
            debug!("Passthrough ({}): {}", direction, PassthroughReason::NoSecretKind.as_str());
            return Ok(input.to_vec());
        }

        let mut output = String::with_capacity(text.len());
        let text = match text.strip_prefix(BYTE_ORDER_MARK) {
            Some(rest) => {
                output.push(BYTE_ORDER_MARK);
                rest
            }
            None => text,
        };
        for (index, document) in split_documents(text).into_iter().enumerate() {
            output.push_str(document.separator);

            let outcome = if document.has_inline_content() {
                DocumentOutcome::Passthrough(PassthroughReason::Unparseable)
            } else {
                self.process_document(direction, document.body)?
            };

            match outcome {
                DocumentOutcome::Transformed(rewritten) => output.push_str(&rewritten),
                DocumentOutcome::Passthrough(reason) => {
                    debug!("Passthrough ({}) document {}: {}", direction, index, reason.as_str());
                    output.push_str(document.body);
                }
            }
        }

        Ok(output.into_bytes())
    }

    /// Run a single document through the state machine
    pub fn process_document(
        &self,
        direction: Direction,
        text: &str,
    ) -> Result<DocumentOutcome, FilterError> {
        // The parser reads a leading BOM as an extra document; it is kept in the output
        if let Some(rest) = text.strip_prefix(BYTE_ORDER_MARK) {
            return Ok(match self.process_document(direction, rest)? {
                DocumentOutcome::Transformed(rewritten) => {
                    DocumentOutcome::Transformed(format!("{BYTE_ORDER_MARK}{rewritten}"))
                }
                passthrough => passthrough,
            });
        }

        let document: Value = match serde_yaml::from_str(text) {
            Ok(document) => document,
            Err(e) => {
                self.check_duplicate_keys(direction, text, &e)?;
                debug!("Document does not parse as YAML: {}", e);
                return Ok(DocumentOutcome::Passthrough(PassthroughReason::Unparseable));
            }
        };

        let kind = classify(&document);
        if kind == direction.target() {
            return Ok(DocumentOutcome::Passthrough(PassthroughReason::AlreadyTarget));
        }
        if kind != direction.source() {
            return Ok(DocumentOutcome::Passthrough(PassthroughReason::OtherKind));
        }
        if self.gate.evaluate(&document) == GateDecision::OutOfScope {
            return Ok(DocumentOutcome::Passthrough(PassthroughReason::OutOfScope));
        }

        let rewritten = match direction {
            Direction::Protect => self.protect_document(text, &document)?,
            Direction::Reveal => self.reveal_document(text, &document)?,
        };
        info!(
            "{} {} '{}' to {}",
            if direction == Direction::Protect { "Encrypted" } else { "Decrypted" },
            kind.as_str(),
            document_name(&document),
            direction.target().as_str()
        );
        Ok(DocumentOutcome::Transformed(rewritten))
    }

    fn protect_document(&self, text: &str, document: &Value) -> Result<String, FilterError> {
        let fields = harvest_plaintext(document)?;
        if fields.is_empty() {
            return Ok(rewrite(text, Direction::Protect, &fields, MetadataEdit::Keep)?);
        }

        let recipients = self.recipients.recipients()?;
        let sealed = invoke_encryption(&self.engine, &fields, &recipients)?;
        Ok(rewrite(
            text,
            Direction::Protect,
            &sealed.fields,
            MetadataEdit::Attach(&sealed.metadata),
        )?)
    }

    fn reveal_document(&self, text: &str, document: &Value) -> Result<String, FilterError> {
        let fields = harvest_ciphertext(document)?;
        if fields.is_empty() {
            return Ok(rewrite(text, Direction::Reveal, &fields, MetadataEdit::Remove)?);
        }

        let metadata = SopsMetadata::extract(text).ok_or(HarvestError::MissingSopsMetadata)?;
        let plaintext = invoke_decryption(&self.engine, &fields, &metadata)?;
        Ok(rewrite(text, Direction::Reveal, &plaintext, MetadataEdit::Remove)?)
    }

    /// A gated document rejected by the parser for duplicate keys is fatal, not passthrough
    fn check_duplicate_keys(
        &self,
        direction: Direction,
        text: &str,
        error: &serde_yaml::Error,
    ) -> Result<(), HarvestError> {
        let message = error.to_string();
        if !message.contains("duplicate entry") {
            return Ok(());
        }

        let layout = Layout::scan(text);
        let kind = layout.entry("kind").map(|entry| kind_value(layout.slice(entry)));
        if kind != Some(direction.source().as_str()) {
            return Ok(());
        }

        let marker = &self.gate.marker().key;
        if self.gate.is_required() && !text.contains(marker.as_str()) {
            return Ok(());
        }

        Err(HarvestError::DuplicateKey { detail: message })
    }
}

fn rewrite(
    text: &str,
    direction: Direction,
    fields: &FieldSet,
    metadata: MetadataEdit<'_>,
) -> Result<String, crate::manifest::RewriteError> {
    rewrite_document(
        text,
        &RewriteRequest {
            source: direction.source(),
            target: direction.target(),
            fields,
            metadata,
        },
    )
}

/// Bare value of a `kind: ...` line
fn kind_value(entry: &str) -> &str {
    let value = entry.split_once(':').map_or("", |(_, value)| value);
    let value = value.split(" #").next().unwrap_or_default();
    value.trim().trim_matches(['"', '\''])
}

fn document_name(document: &Value) -> &str {
    document
        .get("metadata")
        .and_then(|metadata| metadata.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}
