//! # Encryption Engine
//!
//! The narrow interface to the external encryption engine, and the invokers that
//! enforce the all-or-nothing contract on whatever the engine returns.

use crate::constants::SOPS_METADATA_KEY;
use crate::manifest::harvest::FieldSet;
use crate::manifest::layout::Layout;
use crate::sops::detection::{is_ciphertext, is_stored_encrypted};
use crate::sops::error::{EngineError, EngineFailureReason, EngineOperation};
use tracing::debug;

/// Engine-owned `sops:` block, kept as the exact text the engine produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SopsMetadata {
    block: String,
}

impl SopsMetadata {
    /// Wrap a complete top-level `sops:` entry
    pub fn new(block: impl Into<String>) -> Self {
        let mut block = block.into();
        if !block.ends_with('\n') {
            block.push('\n');
        }
        Self { block }
    }

    /// Cut the `sops:` entry out of a document
    pub fn extract(document: &str) -> Option<Self> {
        let layout = Layout::scan(document);
        layout
            .entry(SOPS_METADATA_KEY)
            .map(|entry| Self::new(layout.slice(entry)))
    }

    pub fn block(&self) -> &str {
        &self.block
    }
}

/// Ciphertext values together with the metadata needed to decrypt them
#[derive(Debug, Clone)]
pub struct SealedFields {
    pub fields: FieldSet,
    pub metadata: SopsMetadata,
}

/// Field-level encryption engine
///
/// Implementations receive only the harvested sensitive values, never the rest
/// of the manifest.
pub trait EncryptionEngine {
    fn encrypt(&self, fields: &FieldSet, recipients: &[String]) -> Result<SealedFields, EngineError>;

    fn decrypt(&self, fields: &FieldSet, metadata: &SopsMetadata) -> Result<FieldSet, EngineError>;
}

impl<E: EncryptionEngine + ?Sized> EncryptionEngine for &E {
    fn encrypt(&self, fields: &FieldSet, recipients: &[String]) -> Result<SealedFields, EngineError> {
        (**self).encrypt(fields, recipients)
    }

    fn decrypt(&self, fields: &FieldSet, metadata: &SopsMetadata) -> Result<FieldSet, EngineError> {
        (**self).decrypt(fields, metadata)
    }
}

/// Encrypt harvested values; every key must come back encrypted exactly once
pub fn invoke_encryption<E: EncryptionEngine + ?Sized>(
    engine: &E,
    fields: &FieldSet,
    recipients: &[String],
) -> Result<SealedFields, EngineError> {
    let sealed = engine.encrypt(fields, recipients)?;
    verify_pairing(EngineOperation::Encrypt, fields, &sealed.fields)?;

    if let Some(field) = sealed
        .fields
        .iter()
        .find(|field| !is_stored_encrypted(&field.value))
    {
        return Err(EngineError::new(
            EngineOperation::Encrypt,
            EngineFailureReason::IncompleteResult,
            format!("`{}.{}` was returned unencrypted", field.group, field.key),
        ));
    }

    debug!("Encrypted {} fields for {} recipients", fields.len(), recipients.len());
    Ok(sealed)
}

/// Decrypt harvested ciphertext; every key must come back decrypted exactly once
pub fn invoke_decryption<E: EncryptionEngine + ?Sized>(
    engine: &E,
    fields: &FieldSet,
    metadata: &SopsMetadata,
) -> Result<FieldSet, EngineError> {
    let plaintext = engine.decrypt(fields, metadata)?;
    verify_pairing(EngineOperation::Decrypt, fields, &plaintext)?;

    if let Some(field) = plaintext.iter().find(|field| is_ciphertext(&field.value)) {
        return Err(EngineError::new(
            EngineOperation::Decrypt,
            EngineFailureReason::IncompleteResult,
            format!("`{}.{}` is still encrypted", field.group, field.key),
        ));
    }

    debug!("Decrypted {} fields", fields.len());
    Ok(plaintext)
}

/// Same cardinality and same `(group, key)` pairs, in whatever order the engine chose
fn verify_pairing(
    operation: EngineOperation,
    input: &FieldSet,
    output: &FieldSet,
) -> Result<(), EngineError> {
    let incomplete = |message: String| {
        EngineError::new(operation, EngineFailureReason::IncompleteResult, message)
    };

    if input.len() != output.len() {
        return Err(incomplete(format!(
            "engine returned {} values for {} inputs",
            output.len(),
            input.len()
        )));
    }

    for field in input {
        let matches = output
            .iter()
            .filter(|candidate| candidate.group == field.group && candidate.key == field.key)
            .count();
        if matches != 1 {
            return Err(incomplete(format!(
                "`{}.{}` returned {} times",
                field.group, field.key, matches
            )));
        }
    }

    Ok(())
}
