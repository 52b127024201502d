// error.rs — Error types for the policy subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or parsing security policies.
///
/// Policy *evaluation* never fails: misconfiguration there resolves to the
/// fail-closed default. These errors only surface at load time.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An `applies_to` selector could not be parsed.
    #[error("invalid policy selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A policy file is syntactically or semantically invalid.
    #[error("invalid policy file {path}: {reason}")]
    InvalidPolicyFile { path: PathBuf, reason: String },

    /// Policy YAML could not be parsed.
    #[error("policy YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to read a policy file.
    #[error("failed to read policy file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
