// error.rs — Error types for the policy subsystem.

use thiserror::Error;

/// Errors that can occur during policy operations.
///
/// None of these are fatal to a page: callers degrade to defaults (config)
/// or leave the element untouched (links).
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The persistence layer is missing or failed to answer.
    #[error("configuration unavailable: {reason}")]
    ConfigUnavailable { reason: String },

    /// An anchor's href could not be resolved to an absolute URL.
    #[error("malformed link target '{href}': {reason}")]
    MalformedLinkTarget { href: String, reason: String },

    /// A storage document could not be read or written.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        source: std::io::Error,
    },

    /// A storage document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The input does not contain a usable section identifier.
    #[error("'{raw}' is not a valid section name")]
    InvalidSection { raw: String },

    /// A grant was confirmed before an unlock was started for that section.
    #[error("no unlock in progress for section '{section}'")]
    UnlockMissing { section: String },

    /// A grant was confirmed before the unlock delay elapsed.
    #[error("unlock for section '{section}' still pending ({remaining_secs}s remaining)")]
    UnlockPending { section: String, remaining_secs: i64 },
}
