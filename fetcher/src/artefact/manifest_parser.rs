//! Manifest deserialization from TOML.
//!
//! Manifests on disk hold one `[[artefact]]` table per entry. All newtype
//! validation runs during deserialization, so malformed names and digests
//! are rejected at parse time, before anything touches the network.

use super::error::ArtefactError;
use super::manifest::{ArtefactSpec, Manifest};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Errors arising from manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML deserialization or field validation failed.
    #[error("manifest parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The entries parsed but do not form a valid manifest.
    #[error("invalid manifest: {0}")]
    Invalid(#[from] ArtefactError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    artefact: Vec<ArtefactSpec>,
}

/// Parse a TOML string into a validated [`Manifest`].
///
/// # Errors
///
/// Returns an error if the TOML is malformed, any field fails validation,
/// or two entries share a name.
///
/// # Examples
///
/// ```
/// use artefact_fetcher::artefact::manifest_parser::parse_manifest;
///
/// let toml = concat!(
///     "[[artefact]]\n",
///     "name = \"NeuralNetwork/model_checkpoint.zip\"\n",
///     "remote_id = \"1SPYsR5Is8IJVTPNpStCdX7ibx-G3E2G3\"\n",
///     "sha256 = \"7699e824cacfe2d6590b8b569a6240a0905b46cd1e68d311259cc43e5373dfa1\"\n",
/// );
/// let manifest = parse_manifest(toml).expect("valid manifest");
/// assert_eq!(manifest.len(), 1);
/// ```
pub fn parse_manifest(toml: &str) -> Result<Manifest, ManifestParseError> {
    let file: ManifestFile = toml::from_str(toml)?;
    Ok(Manifest::new(file.artefact)?)
}

/// Read and parse the manifest at `path`.
///
/// # Errors
///
/// Returns [`ManifestParseError::Read`] if the file cannot be read, or any
/// error [`parse_manifest`] reports.
pub fn load_manifest(path: &Utf8Path) -> Result<Manifest, ManifestParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestParseError::Read {
        path: path.to_owned(),
        source,
    })?;
    parse_manifest(&content)
}
