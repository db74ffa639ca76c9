//! # SOPS Engine
//!
//! Field-level encryption and decryption through the sops binary.
//!
//! ## Module Structure
//!
//! - `engine.rs` - Engine interface and the encryption / decryption invokers
//! - `binary.rs` - The `sops` executable driven over pipes
//! - `detection.rs` - Ciphertext and metadata block detection
//! - `error.rs` - Error types and classification

pub mod binary;
pub mod detection;
pub mod engine;
pub mod error;

// Re-export public API
pub use binary::SopsBinaryEngine;
pub use detection::{has_sops_metadata, is_ciphertext, is_stored_encrypted};
pub use engine::{
    invoke_decryption, invoke_encryption, EncryptionEngine, SealedFields, SopsMetadata,
};
pub use error::{classify_sops_error, EngineError, EngineFailureReason, EngineOperation};
