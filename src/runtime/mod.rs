//! # Runtime Module
//!
//! Process-level concerns of the filter binary: tracing setup and the policy for
//! reporting fatal errors to git.

pub mod error_policy;
pub mod initialization;

pub use error_policy::*;
pub use initialization::*;
