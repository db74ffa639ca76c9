//! # Manifest Handling
//!
//! Classification, gating, field harvesting and format-preserving rewriting of
//! Kubernetes `Secret` / `SopsSecret` manifests.
//!
//! ## Module Structure
//!
//! - `kind.rs` - Manifest classifier
//! - `gate.rs` - Annotation gate
//! - `harvest.rs` - Sensitive field extraction
//! - `layout.rs` - Top-level entry spans of the original text
//! - `render.rs` - YAML rendering of field groups
//! - `rewrite.rs` - Document rewriter

pub mod gate;
pub mod harvest;
pub mod kind;
pub mod layout;
pub mod render;
pub mod rewrite;

// Re-export public API
pub use gate::{AnnotationGate, AnnotationMarker, GateDecision};
pub use harvest::{
    harvest_ciphertext, harvest_fields, harvest_plaintext, FieldGroup, FieldSet, HarvestError,
    SecretField,
};
pub use kind::{classify, ManifestKind};
pub use rewrite::{rewrite_document, MetadataEdit, RewriteError, RewriteRequest};
