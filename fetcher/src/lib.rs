//! Artefact fetcher library.
//!
//! Materialises the archives declared in a digest manifest: each artefact is
//! retrieved by its remote id, verified against a trusted SHA-256 digest,
//! and only then extracted. Runs are idempotent (existing destinations are
//! skipped) and fault-isolated (one failed artefact never stops the rest).
//! The `artefact-fetcher` binary wraps this library, and the pieces are
//! public so tests and other tools can drive the pipeline with their own
//! retrievers.
//!
//! # Modules
//!
//! - [`artefact`] - Naming, manifest schema, retrieval, and extraction
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered run configuration
//! - [`error`] - Process-level error types
//! - [`fetch`] - The per-artefact pipeline and batch orchestration
//! - [`output`] - Human-readable CLI output
//! - [`report`] - Run reports and JSON rendering

pub mod artefact;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod report;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
