//! Error types for a3s-disclosure

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a disclosure review
///
/// Only `Config` and `RecognizerFailure` ever reach callers of the
/// pipeline. The other variants are produced internally, logged, and
/// resolved toward over-masking.
#[derive(Debug, Error)]
pub enum DisclosureError {
    /// A single recognizer sub-pass rejected its input
    #[error("Recognition error in pass '{pass}': {reason}")]
    Recognition { pass: String, reason: String },

    /// Every enabled recognizer sub-pass failed
    #[error("All recognizer passes failed: {0}")]
    RecognizerFailure(String),

    /// Classifier adapter failure
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Invalid configuration or rule table
    #[error("Configuration error: {0}")]
    Config(String),

    /// An entity reached the redactor without a decided action
    #[error("Policy invariant violated: {0}")]
    PolicyInvariant(String),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Report serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the optional classifier adapter
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    /// The call did not complete within the configured timeout
    #[error("Adapter call timed out after {0:?}")]
    Timeout(Duration),

    /// Network or backend failure
    #[error("Adapter transport failure: {0}")]
    Transport(String),

    /// The adapter answered with content that could not be parsed
    #[error("Malformed adapter response: {0}")]
    Malformed(String),

    /// Adapter use is switched off in configuration
    #[error("Adapter disabled")]
    Disabled,
}

/// Result type alias for disclosure operations
pub type Result<T> = std::result::Result<T, DisclosureError>;
