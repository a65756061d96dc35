// error.rs — Error types for the page pipeline.

use thiserror::Error;

use fg_policy::PolicyError;

/// Errors raised while configuring or starting the page pipeline.
///
/// Once a page runtime is running, nothing here is fatal: policy and link
/// failures degrade to defaults or leave elements untouched.
#[derive(Debug, Error)]
pub enum PageError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// feedgate.toml could not be parsed.
    #[error("invalid config at {path}: {source}")]
    Config {
        path: String,
        source: toml::de::Error,
    },

    /// The site profile is unusable.
    #[error("invalid site host '{host}': {reason}")]
    InvalidSite { host: String, reason: String },

    /// A rail keyword list could not be compiled.
    #[error("invalid rail keyword pattern: {0}")]
    RailPattern(#[from] regex::Error),

    /// A policy-layer error.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}
