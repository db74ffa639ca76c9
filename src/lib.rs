//! # SOPS Secret Filter
//!
//! A git clean/smudge filter that keeps plaintext Kubernetes `Secret` manifests in the
//! working tree and only their encrypted `SopsSecret` counterparts in history.
//!
//! ## Overview
//!
//! 1. **Clean (protect)** - `git add` pipes the file through the filter. Annotated
//!    `Secret` documents have their `data` / `stringData` values encrypted with SOPS
//!    and their `kind` switched to `SopsSecret`.
//! 2. **Smudge (reveal)** - `git checkout` pipes the stored blob back through the
//!    filter, which decrypts the values and restores `kind: Secret`.
//! 3. **Passthrough** - anything that is not a gated `Secret` / `SopsSecret` (other
//!    kinds, unparseable input, missing annotation) is returned byte-for-byte.
//!
//! Only the sensitive field groups are rewritten. Metadata, labels, annotations and
//! every other top-level field keep their original text and order.
//!
//! ## Usage
//!
//! ```bash
//! git config filter.sops-secret.clean "sops-secret-filter clean %f"
//! git config filter.sops-secret.smudge "sops-secret-filter smudge %f"
//! git config filter.sops-secret.required true
//! echo "*.yaml filter=sops-secret" >> .gitattributes
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod runtime;
pub mod sops;

pub use config::FilterConfig;
pub use error::FilterError;
pub use pipeline::{Direction, DocumentOutcome, Filter, PassthroughReason};
