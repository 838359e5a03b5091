//! Error types for artefact names, digests, and manifest entries.
//!
//! Each variant provides a descriptive message identifying the invalid input
//! and the constraint that was violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// An artefact name is empty, absolute, or escapes the destination root.
    #[error("invalid artefact name \"{value}\": {reason}")]
    InvalidName {
        /// The rejected name.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// An artefact name does not end in a recognised archive suffix.
    #[error("unsupported archive type for \"{value}\"; expected one of: {expected}")]
    UnsupportedArchive {
        /// The rejected name.
        value: String,
        /// Comma-separated list of accepted suffixes.
        expected: String,
    },

    /// A remote identifier is empty or contains only whitespace.
    #[error("remote identifier for \"{name}\" must not be empty")]
    EmptyRemoteId {
        /// The artefact the identifier belongs to.
        name: String,
    },

    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// Two manifest entries share the same artefact name.
    #[error("artefact \"{name}\" is declared more than once")]
    DuplicateArtefact {
        /// The repeated name.
        name: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
