//! Manifest schema types for trusted artefacts.
//!
//! A manifest is the static declaration of every artefact the fetcher may
//! materialise, pairing each name with the remote id it is retrieved by and
//! the SHA-256 digest it must match before extraction. Entries keep their
//! declaration order so repeated runs process (and log) artefacts
//! identically.

use super::error::{ArtefactError, Result};
use super::name::ArtefactName;
use super::sha256_digest::Sha256Digest;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One manifest entry.
///
/// # Examples
///
/// ```
/// use artefact_fetcher::artefact::manifest::ArtefactSpec;
///
/// let spec = ArtefactSpec::new(
///     "pkg.zip",
///     "remote-1",
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
/// )
/// .expect("valid entry");
/// assert_eq!(spec.name().stem(), "pkg");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtefactSpec {
    name: ArtefactName,
    remote_id: String,
    sha256: Sha256Digest,
}

impl ArtefactSpec {
    /// Build an entry from raw strings, validating each field.
    ///
    /// # Errors
    ///
    /// Returns an [`ArtefactError`] if the name, remote id, or digest is
    /// malformed.
    pub fn new(name: &str, remote_id: &str, sha256: &str) -> Result<Self> {
        let name = ArtefactName::try_from(name)?;
        if remote_id.trim().is_empty() {
            return Err(ArtefactError::EmptyRemoteId {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name,
            remote_id: remote_id.to_owned(),
            sha256: Sha256Digest::try_from(sha256)?,
        })
    }

    /// Return the artefact name.
    #[must_use]
    pub fn name(&self) -> &ArtefactName {
        &self.name
    }

    /// Return the opaque remote identifier.
    #[must_use]
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Return the trusted digest of the archive.
    #[must_use]
    pub fn expected_digest(&self) -> &Sha256Digest {
        &self.sha256
    }

    fn validate(&self) -> Result<()> {
        if self.remote_id.trim().is_empty() {
            return Err(ArtefactError::EmptyRemoteId {
                name: self.name.to_string(),
            });
        }
        Ok(())
    }
}

/// The ordered, duplicate-free list of artefacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    #[serde(rename = "artefact")]
    entries: Vec<ArtefactSpec>,
}

/// Artefacts required by the binary function similarity models: the trained
/// network checkpoint and the pretrained instruction embeddings.
const BUILTIN_ENTRIES: [(&str, &str, &str); 2] = [
    (
        "NeuralNetwork/model_checkpoint.zip",
        "1SPYsR5Is8IJVTPNpStCdX7ibx-G3E2G3",
        "7699e824cacfe2d6590b8b569a6240a0905b46cd1e68d311259cc43e5373dfa1",
    ),
    (
        "Pretraining/instruction_embeddings.zip",
        "1A7STkuH3uQy_8WJlPwU6YM2MQoxf-3HV",
        "528751f367e321a956b5c07c32822cf617e85a547e979e07a47da6a9aef00806",
    ),
];

impl Manifest {
    /// Build a manifest, rejecting repeated names and empty remote ids.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::DuplicateArtefact`] when two entries share a
    /// name.
    pub fn new(entries: Vec<ArtefactSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if !seen.insert(entry.name().as_str()) {
                return Err(ArtefactError::DuplicateArtefact {
                    name: entry.name().to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The compiled-in manifest.
    ///
    /// # Errors
    ///
    /// Returns an error only if the compiled-in table is malformed.
    pub fn builtin() -> Result<Self> {
        let entries = BUILTIN_ENTRIES
            .iter()
            .map(|(name, remote_id, sha256)| ArtefactSpec::new(name, remote_id, sha256))
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }

    /// Return the entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[ArtefactSpec] {
        &self.entries
    }

    /// Return the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true when the manifest declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return true when one artefact's destination lies inside another's.
    ///
    /// Such artefacts share a directory tree and must not be processed
    /// concurrently.
    #[must_use]
    pub fn has_nested_destinations(&self) -> bool {
        let root = Utf8Path::new("");
        let destinations: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.name().destination(root))
            .collect();
        destinations.iter().enumerate().any(|(i, outer)| {
            destinations
                .iter()
                .enumerate()
                .any(|(j, inner)| i != j && inner.starts_with(outer))
        })
    }
}
