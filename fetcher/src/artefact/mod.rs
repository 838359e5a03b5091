//! Artefact naming, manifest schema, retrieval, verification, and extraction.
//!
//! # Sub-modules
//!
//! - [`error`] — Semantic error types for validation failures.
//! - [`extraction`] — Staged archive extraction with path traversal
//!   protection.
//! - [`manifest`] — Manifest schema types (`Manifest`, `ArtefactSpec`).
//! - [`manifest_parser`] — Manifest TOML deserialization.
//! - [`name`] — Artefact naming policy (`ArtefactName`, `ArchiveFormat`).
//! - [`retrieval`] — Retriever trait with HTTP and mirror implementations.
//! - [`sha256_digest`] — SHA-256 digest newtype and streaming file hashing.

pub mod error;
pub mod extraction;
pub mod manifest;
pub mod manifest_parser;
pub mod name;
pub mod retrieval;
pub mod sha256_digest;
