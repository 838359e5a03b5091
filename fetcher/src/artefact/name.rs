//! Artefact naming policy.
//!
//! An artefact name doubles as the relative path of the transient archive,
//! and its suffix-stripped form names the directory the archive materialises
//! into: `NeuralNetwork/model_checkpoint.zip` downloads to that path and is
//! considered present once `NeuralNetwork/model_checkpoint/` exists.

use super::error::{ArtefactError, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Archive container formats recognised by their file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// A zip archive (`.zip`).
    Zip,
    /// A zstd-compressed tarball (`.tar.zst`, `.tzst`).
    TarZstd,
    /// A gzip-compressed tarball (`.tar.gz`, `.tgz`).
    TarGzip,
}

impl ArchiveFormat {
    /// Every supported format, in detection order.
    pub const ALL: [Self; 3] = [Self::Zip, Self::TarZstd, Self::TarGzip];

    /// Return the filename suffixes that identify this format.
    #[must_use]
    pub const fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Zip => &[".zip"],
            Self::TarZstd => &[".tar.zst", ".tzst"],
            Self::TarGzip => &[".tar.gz", ".tgz"],
        }
    }

    /// Detect the format of `file_name`, returning it together with the
    /// length of the matched suffix. Matching ignores ASCII case.
    ///
    /// # Examples
    ///
    /// ```
    /// use artefact_fetcher::artefact::name::ArchiveFormat;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::detect("model.tar.zst"),
    ///     Some((ArchiveFormat::TarZstd, 8))
    /// );
    /// assert_eq!(ArchiveFormat::detect("model.bin"), None);
    /// ```
    #[must_use]
    pub fn detect(file_name: &str) -> Option<(Self, usize)> {
        let lower = file_name.to_ascii_lowercase();
        Self::ALL.iter().find_map(|format| {
            format
                .suffixes()
                .iter()
                .find(|suffix| lower.ends_with(*suffix))
                .map(|suffix| (*format, suffix.len()))
        })
    }

    fn expected_list() -> String {
        Self::ALL
            .iter()
            .flat_map(|format| format.suffixes().iter().copied())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::TarZstd => write!(f, "tar.zst"),
            Self::TarGzip => write!(f, "tar.gz"),
        }
    }
}

/// A validated artefact name: a relative archive path that stays inside the
/// destination root.
///
/// # Examples
///
/// ```
/// use artefact_fetcher::artefact::name::{ArchiveFormat, ArtefactName};
/// use camino::Utf8Path;
///
/// let name = ArtefactName::try_from("Pretraining/instruction_embeddings.zip")
///     .expect("valid name");
/// assert_eq!(name.format(), ArchiveFormat::Zip);
/// assert_eq!(
///     name.destination(Utf8Path::new("/data")),
///     Utf8Path::new("/data/Pretraining/instruction_embeddings")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtefactName {
    value: String,
    format: ArchiveFormat,
    suffix_len: usize,
}

impl ArtefactName {
    /// Return the normalised name: `.` components and repeated separators
    /// are dropped, so `./models//pkg.zip` reads as `models/pkg.zip`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Return the archive format implied by the name's suffix.
    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Return the name with its archive suffix removed.
    #[must_use]
    pub fn stem(&self) -> &str {
        let end = self.value.len() - self.suffix_len;
        self.value.get(..end).unwrap_or(&self.value)
    }

    /// Path of the transient archive under `root`.
    #[must_use]
    pub fn archive_path(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(&self.value)
    }

    /// Directory whose existence marks the artefact as materialised.
    #[must_use]
    pub fn destination(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(self.stem())
    }

    /// Directory the archive contents are expanded into: the parent of the
    /// transient archive.
    #[must_use]
    pub fn extraction_dir(&self, root: &Utf8Path) -> Utf8PathBuf {
        let archive = self.archive_path(root);
        archive
            .parent()
            .map_or_else(|| root.to_owned(), Utf8Path::to_owned)
    }
}

impl TryFrom<&str> for ArtefactName {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_relative(value)?;
        let normalised = normalise(value);
        if normalised.is_empty() {
            return Err(invalid(value, "name must not be empty"));
        }
        let file_name = Utf8Path::new(&normalised).file_name().unwrap_or_default();
        let (format, suffix_len) =
            ArchiveFormat::detect(file_name).ok_or_else(|| ArtefactError::UnsupportedArchive {
                value: value.to_owned(),
                expected: ArchiveFormat::expected_list(),
            })?;
        if file_name.len() == suffix_len {
            return Err(invalid(value, "archive file name has no stem"));
        }
        Ok(Self {
            value: normalised,
            format,
            suffix_len,
        })
    }
}

impl TryFrom<String> for ArtefactName {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl From<ArtefactName> for String {
    fn from(value: ArtefactName) -> Self {
        value.value
    }
}

impl fmt::Display for ArtefactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Reject names that are empty, absolute, or climb out of the root.
fn validate_relative(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(value, "name must not be empty"));
    }
    if value.starts_with('/') || value.starts_with('\\') {
        return Err(invalid(value, "name must be a relative path"));
    }
    if value.ends_with('/') || value.ends_with('\\') {
        return Err(invalid(value, "name must end in an archive file name"));
    }
    for component in Path::new(value).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(invalid(value, "name must not contain `..` components"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(value, "name must be a relative path"));
            }
        }
    }
    Ok(())
}

/// Rebuild a validated name from its normal components only.
fn normalise(value: &str) -> String {
    Utf8Path::new(value)
        .components()
        .filter_map(|component| match component {
            Utf8Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn invalid(value: &str, reason: &str) -> ArtefactError {
    ArtefactError::InvalidName {
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}
