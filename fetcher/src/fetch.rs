//! Artefact fetch pipeline.
//!
//! Materialises every manifest entry into its destination directory:
//! skip if already present, retrieve, confirm the archive exists, verify its
//! SHA-256 digest, extract, and remove the archive. Each artefact resolves to
//! its own [`FetchOutcome`]; a failure (or even a panic) in one artefact's
//! flow never aborts the others.

use camino::{Utf8Path, Utf8PathBuf};
use log::{error, info, warn};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};

use crate::artefact::extraction::{ArtefactExtractor, ExtractionError};
use crate::artefact::manifest::{ArtefactSpec, Manifest};
use crate::artefact::retrieval::{ArtefactRetriever, RetrievalError};
use crate::artefact::sha256_digest::{Sha256Digest, compute_sha256};
use crate::report::{ArtefactReport, FetchReport};

/// The outcome of fetching one artefact.
///
/// This is deliberately not a `Result`: per-artefact failures are reported,
/// never propagated, so the rest of the batch still runs.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The destination directory already existed; nothing was retrieved.
    Skipped {
        /// The existing destination directory.
        destination: Utf8PathBuf,
    },
    /// The archive was retrieved, verified, extracted, and removed.
    Succeeded {
        /// The destination directory.
        destination: Utf8PathBuf,
        /// Number of files the archive expanded to.
        files: usize,
    },
    /// The artefact could not be materialised this run.
    Failed(FetchError),
}

impl FetchOutcome {
    /// Return true for [`FetchOutcome::Failed`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Why a single artefact failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The directory that receives the archive could not be created.
    #[error("could not create {path}: {source}")]
    Prepare {
        /// The directory path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The retriever failed.
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The retriever reported success but left no file behind.
    #[error("file {path} not found after retrieval")]
    MissingFile {
        /// Where the archive was expected.
        path: Utf8PathBuf,
    },

    /// The archive could not be read for hashing.
    #[error("checksum computation failed for {path}: {source}")]
    Digest {
        /// The archive path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The archive does not match its trusted digest.
    #[error("checksum mismatch: expected {expected}, actual {actual}")]
    DigestMismatch {
        /// The digest recorded in the manifest.
        expected: Sha256Digest,
        /// The digest of the retrieved file.
        actual: Sha256Digest,
    },

    /// The verified archive could not be extracted.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The archive was extracted but could not be removed afterwards.
    #[error("extracted, but could not remove {path}: {source}")]
    Cleanup {
        /// The archive path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The artefact's flow panicked.
    #[error("unexpected panic: {message}")]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },
}

impl FetchError {
    /// Stable, machine-readable label for the failure class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Prepare { .. } => "prepare",
            Self::Retrieval(_) => "retrieval",
            Self::MissingFile { .. } => "missing_file",
            Self::Digest { .. } => "digest",
            Self::DigestMismatch { .. } => "digest_mismatch",
            Self::Extraction(_) => "extraction",
            Self::Cleanup { .. } => "cleanup",
            Self::Panicked { .. } => "panicked",
        }
    }
}

/// What a run would do for one artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// The destination exists; the artefact would be skipped.
    Skip,
    /// The artefact would be retrieved and extracted.
    Fetch,
}

/// Orchestrates the fetch pipeline over a manifest.
///
/// # Examples
///
/// ```no_run
/// use artefact_fetcher::artefact::extraction::StagedExtractor;
/// use artefact_fetcher::artefact::manifest::Manifest;
/// use artefact_fetcher::artefact::retrieval::{DEFAULT_TIMEOUT, DEFAULT_URL_TEMPLATE, HttpRetriever};
/// use artefact_fetcher::fetch::Fetcher;
///
/// let manifest = Manifest::builtin().expect("builtin manifest");
/// let retriever = HttpRetriever::new(DEFAULT_URL_TEMPLATE, DEFAULT_TIMEOUT);
/// let fetcher = Fetcher::new(".", &retriever, &StagedExtractor);
/// let report = fetcher.fetch_all(&manifest);
/// println!("{}", report.summary_line());
/// ```
pub struct Fetcher<'a> {
    root: Utf8PathBuf,
    retriever: &'a dyn ArtefactRetriever,
    extractor: &'a dyn ArtefactExtractor,
    jobs: usize,
}

impl<'a> Fetcher<'a> {
    /// Create a sequential fetcher materialising artefacts under `root`.
    #[must_use]
    pub fn new(
        root: impl Into<Utf8PathBuf>,
        retriever: &'a dyn ArtefactRetriever,
        extractor: &'a dyn ArtefactExtractor,
    ) -> Self {
        Self {
            root: root.into(),
            retriever,
            extractor,
            jobs: 1,
        }
    }

    /// Process up to `jobs` artefacts at once. Zero is treated as one.
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Return the destination root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Report what [`Fetcher::fetch_all`] would do, touching nothing.
    #[must_use]
    pub fn plan(&self, manifest: &Manifest) -> Vec<(ArtefactSpec, PlannedAction)> {
        plan(&self.root, manifest)
    }

    /// Fetch every artefact in `manifest`, returning outcomes in manifest
    /// order.
    ///
    /// Runs on a worker pool when more than one job was requested and no
    /// destination is nested inside another; otherwise sequentially.
    #[must_use]
    pub fn fetch_all(&self, manifest: &Manifest) -> FetchReport {
        let entries = manifest.entries();
        let outcomes = if self.jobs > 1 && entries.len() > 1 {
            if manifest.has_nested_destinations() {
                warn!("artefact destinations overlap; fetching sequentially");
                self.fetch_sequential(entries)
            } else {
                self.fetch_parallel(entries)
            }
        } else {
            self.fetch_sequential(entries)
        };

        FetchReport::new(
            entries
                .iter()
                .zip(outcomes)
                .map(|(spec, outcome)| ArtefactReport::new(spec.name().clone(), outcome))
                .collect(),
        )
    }

    fn fetch_sequential(&self, entries: &[ArtefactSpec]) -> Vec<FetchOutcome> {
        entries.iter().map(|spec| self.fetch_one(spec)).collect()
    }

    fn fetch_parallel(&self, entries: &[ArtefactSpec]) -> Vec<FetchOutcome> {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|index| format!("fetch-{index}"))
            .build()
        {
            Ok(pool) => pool.install(|| entries.par_iter().map(|spec| self.fetch_one(spec)).collect()),
            Err(err) => {
                warn!("could not start {} fetch workers ({err}); fetching sequentially", self.jobs);
                self.fetch_sequential(entries)
            }
        }
    }

    /// Fetch a single artefact.
    ///
    /// Never panics and never returns an error: everything that goes wrong is
    /// logged and folded into [`FetchOutcome::Failed`].
    #[must_use]
    pub fn fetch_one(&self, spec: &ArtefactSpec) -> FetchOutcome {
        let name = spec.name();
        let destination = name.destination(&self.root);
        if destination.is_dir() {
            warn!("{destination} already exists");
            return FetchOutcome::Skipped { destination };
        }

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.materialise(spec, &destination)));
        let result = attempt.unwrap_or_else(|payload| {
            Err(FetchError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        });

        match result {
            Ok(files) => {
                info!("{name}: extracted {files} file(s) into {destination}");
                FetchOutcome::Succeeded { destination, files }
            }
            Err(err) => {
                match err {
                    FetchError::DigestMismatch { .. } | FetchError::Panicked { .. } => {
                        error!("{name}: {err}");
                    }
                    _ => warn!("{name}: {err}"),
                }
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Retrieve, verify, extract, and clean up one artefact.
    fn materialise(&self, spec: &ArtefactSpec, destination: &Utf8Path) -> Result<usize, FetchError> {
        let name = spec.name();
        let archive_path = name.archive_path(&self.root);
        let extraction_dir = name.extraction_dir(&self.root);

        std::fs::create_dir_all(&extraction_dir).map_err(|source| FetchError::Prepare {
            path: extraction_dir.clone(),
            source,
        })?;

        info!("Downloading {name} ...");
        self.retriever
            .retrieve(spec.remote_id(), archive_path.as_std_path())?;

        if !archive_path.is_file() {
            return Err(FetchError::MissingFile { path: archive_path });
        }

        info!("Checking checksum {name} ...");
        verify_digest(&archive_path, spec.expected_digest())?;

        info!("Extracting {name} ...");
        let files = self.extractor.extract(
            archive_path.as_std_path(),
            name.format(),
            extraction_dir.as_std_path(),
        )?;

        std::fs::remove_file(&archive_path).map_err(|source| FetchError::Cleanup {
            path: archive_path.clone(),
            source,
        })?;

        if !destination.is_dir() {
            warn!("{name}: archive did not create {destination}; the next run will fetch it again");
        }
        Ok(files.len())
    }
}

/// Decide, per manifest entry, whether a run under `root` would skip or fetch
/// it.
#[must_use]
pub fn plan(root: &Utf8Path, manifest: &Manifest) -> Vec<(ArtefactSpec, PlannedAction)> {
    manifest
        .entries()
        .iter()
        .map(|spec| {
            let action = if spec.name().destination(root).is_dir() {
                PlannedAction::Skip
            } else {
                PlannedAction::Fetch
            };
            (spec.clone(), action)
        })
        .collect()
}

/// Hash `archive_path` and compare it with the trusted digest.
///
/// # Errors
///
/// Returns [`FetchError::Digest`] if the file cannot be read, or
/// [`FetchError::DigestMismatch`] if the digests differ.
pub fn verify_digest(archive_path: &Utf8Path, expected: &Sha256Digest) -> Result<(), FetchError> {
    let actual = compute_sha256(archive_path.as_std_path()).map_err(|source| FetchError::Digest {
        path: archive_path.to_owned(),
        source,
    })?;
    if &actual != expected {
        return Err(FetchError::DigestMismatch {
            expected: expected.clone(),
            actual,
        });
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_owned()
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
