//! # Constants
//!
//! Default values and well-known names shared by the filter.

/// Annotation that opts a Secret into encryption
pub const DEFAULT_ANNOTATION_KEY: &str = "def.ms/sops-encrypt";

/// Required value of the opt-in annotation
pub const DEFAULT_ANNOTATION_VALUE: &str = "true";

/// Plaintext Kubernetes Secret kind
pub const KIND_SECRET: &str = "Secret";

/// Encrypted counterpart handled by the sops-secrets-operator
pub const KIND_SOPS_SECRET: &str = "SopsSecret";

/// Top-level field holding the engine-owned metadata block
pub const SOPS_METADATA_KEY: &str = "sops";

/// Prefix of every value encrypted by SOPS
pub const CIPHERTEXT_PREFIX: &str = "ENC[";

/// Repository-local age key file
pub const DEFAULT_AGE_KEY_PATH: &str = ".age/age.key";

/// User-global age key file, relative to the XDG config directory
pub const USER_AGE_KEY_PATH: &str = "sops/age/keys.txt";

/// SOPS creation rules file at the repository root
pub const SOPS_CONFIG_FILE: &str = ".sops.yaml";

/// Environment variable naming an explicit age key file
pub const ENV_AGE_KEY_FILE: &str = "SOPS_AGE_KEY_FILE";

pub const ENV_ANNOTATION_KEY: &str = "SOPS_FILTER_ANNOTATION_KEY";
pub const ENV_ANNOTATION_VALUE: &str = "SOPS_FILTER_ANNOTATION_VALUE";
pub const ENV_REQUIRE_ANNOTATION: &str = "SOPS_FILTER_REQUIRE_ANNOTATION";
pub const ENV_SOPS_BINARY: &str = "SOPS_FILTER_SOPS_BINARY";

/// Default tracing directive when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "sops_secret_filter=warn";
