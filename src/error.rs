//! Error types for the outer surfaces of the crate.
//!
//! The validation, remediation, and rule engines are total over their
//! input and never return errors: malformed fields become findings or
//! audit lines. Errors only arise where text crosses into typed values
//! (configuration, rule documents, dataset files) or at I/O boundaries.

use thiserror::Error;

/// Errors raised while loading configuration, rules, or datasets.
#[derive(Error, Debug)]
pub enum AllocationError {
    /// Configuration could not be parsed or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A rule document does not describe a supported rule.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A dataset document does not have the expected shape.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// File access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AllocationError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        AllocationError::Config(msg.into())
    }

    /// Creates an invalid rule error.
    pub fn invalid_rule(msg: impl Into<String>) -> Self {
        AllocationError::InvalidRule(msg.into())
    }

    /// Whether the error was caused by user-supplied input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, AllocationError::Io(_))
    }
}

impl From<toml::de::Error> for AllocationError {
    fn from(err: toml::de::Error) -> Self {
        AllocationError::Config(format!("TOML error: {err}"))
    }
}

/// Result alias for fallible crate operations.
pub type Result<T> = std::result::Result<T, AllocationError>;
