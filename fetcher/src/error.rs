//! Process-level errors for the fetcher CLI.
//!
//! Per-artefact failures never surface here; they are folded into the run
//! report. These variants cover the problems that stop a run before (or
//! after) any artefact is processed.

use crate::artefact::manifest_parser::ManifestParseError;
use crate::config::ConfigError;
use thiserror::Error;

/// Errors that abort a fetcher run.
#[derive(Debug, Error)]
pub enum FetcherError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The manifest could not be loaded.
    #[error(transparent)]
    Manifest(#[from] ManifestParseError),

    /// The run report could not be serialized.
    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for fetcher results.
pub type Result<T> = std::result::Result<T, FetcherError>;
