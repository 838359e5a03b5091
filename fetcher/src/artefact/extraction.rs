//! Archive extraction for verified artefacts.
//!
//! Archives are expanded into a hidden staging directory inside the target
//! and promoted entry by entry only once the whole archive has unpacked, so
//! a malformed or hostile archive never leaves partial output behind. Every
//! entry path is checked before anything is written to guard against
//! zip-slip traversal.

use super::name::ArchiveFormat;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Trait for extracting artefact archives, enabling test mocking.
///
/// # Examples
///
/// ```no_run
/// use artefact_fetcher::artefact::extraction::{ArtefactExtractor, StagedExtractor};
/// use artefact_fetcher::artefact::name::ArchiveFormat;
/// use std::path::Path;
///
/// let files = StagedExtractor
///     .extract(Path::new("models/pkg.zip"), ArchiveFormat::Zip, Path::new("models"))
///     .expect("extract");
/// println!("unpacked {} files", files.len());
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactExtractor: Send + Sync {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the archive-relative paths of the files that were extracted.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`]
    /// if no files are found, [`ExtractionError::Conflict`] if an entry
    /// clashes with an existing path of another kind, and
    /// [`ExtractionError::Io`] or [`ExtractionError::Zip`] when the archive
    /// cannot be read.
    fn extract(
        &self,
        archive_path: &Path,
        format: ArchiveFormat,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed.
    #[error("malformed zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// A tar entry is neither a regular file nor a directory.
    #[error("unsupported archive entry (links and devices are refused): {path}")]
    UnsupportedEntry {
        /// The offending path from the archive entry.
        path: String,
    },

    /// An entry would replace an existing path of a different kind.
    #[error("archive entry clashes with existing path {path}")]
    Conflict {
        /// The existing path.
        path: PathBuf,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,
}

/// Default extractor: unpacks into a staging directory, then promotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagedExtractor;

impl ArtefactExtractor for StagedExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        format: ArchiveFormat,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError> {
        fs::create_dir_all(dest_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(dest_dir)?;

        let extracted = unpack(archive_path, format, staging.path())?;
        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }

        promote(staging.path(), dest_dir)?;
        Ok(extracted)
    }
}

/// Unpack `archive_path` into `dir` according to `format`.
fn unpack(
    archive_path: &Path,
    format: ArchiveFormat,
    dir: &Path,
) -> Result<Vec<String>, ExtractionError> {
    let file = File::open(archive_path)?;
    match format {
        ArchiveFormat::Zip => unpack_zip(file, dir),
        ArchiveFormat::TarZstd => unpack_tar(zstd::Decoder::new(file)?, dir),
        ArchiveFormat::TarGzip => unpack_tar(flate2::read::GzDecoder::new(file), dir),
    }
}

fn unpack_zip(file: File, dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let entry_path = entry
            .enclosed_name()
            .ok_or_else(|| ExtractionError::PathTraversal {
                path: entry.name().to_owned(),
            })?;
        validate_entry_path(&entry_path)?;

        let dest_path = dir.join(&entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut output = File::create(&dest_path)?;
        std::io::copy(&mut entry, &mut output)?;
        debug!("unpacked {}", entry_path.display());
        extracted.push(display_relative(&entry_path));
    }

    Ok(extracted)
}

fn unpack_tar(reader: impl Read, dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let dest_path = dir.join(&entry_path);
        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                fs::create_dir_all(&dest_path)?;
                continue;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {}
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader => continue,
            _ => {
                return Err(ExtractionError::UnsupportedEntry {
                    path: entry_path.display().to_string(),
                });
            }
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        entry.unpack(&dest_path)?;
        debug!("unpacked {}", entry_path.display());
        extracted.push(display_relative(&entry_path));
    }

    Ok(extracted)
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() || path.has_root() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// A single rename performed during promotion.
struct Move {
    from: PathBuf,
    to: PathBuf,
    replaces: bool,
}

/// Move the contents of `staging` into `dest_dir`.
///
/// Existing directories are merged into and existing regular files are
/// replaced. A file meeting a directory (or a symlink) is a conflict. Every
/// conflict is found before anything moves. If a rename fails part way,
/// newly created entries are removed again.
fn promote(staging: &Path, dest_dir: &Path) -> Result<(), ExtractionError> {
    let mut moves = Vec::new();
    plan_moves(staging, dest_dir, &mut moves)?;

    let mut created: Vec<PathBuf> = Vec::new();
    for Move { from, to, replaces } in moves {
        if let Err(err) = fs::rename(&from, &to) {
            roll_back(&created);
            return Err(ExtractionError::Io(err));
        }
        if replaces {
            debug!("replaced {}", to.display());
        } else {
            created.push(to);
        }
    }
    Ok(())
}

fn plan_moves(
    from_dir: &Path,
    to_dir: &Path,
    moves: &mut Vec<Move>,
) -> Result<(), ExtractionError> {
    for entry in fs::read_dir(from_dir)? {
        let entry = entry?;
        let from = entry.path();
        let to = to_dir.join(entry.file_name());
        let staged_is_dir = entry.file_type()?.is_dir();

        let existing = match to.symlink_metadata() {
            Ok(metadata) => metadata.file_type(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                moves.push(Move {
                    from,
                    to,
                    replaces: false,
                });
                continue;
            }
            Err(err) => return Err(ExtractionError::Io(err)),
        };

        if staged_is_dir && existing.is_dir() {
            plan_moves(&from, &to, moves)?;
        } else if !staged_is_dir && existing.is_file() {
            moves.push(Move {
                from,
                to,
                replaces: true,
            });
        } else {
            return Err(ExtractionError::Conflict { path: to });
        }
    }
    Ok(())
}

fn roll_back(promoted: &[PathBuf]) {
    for path in promoted.iter().rev() {
        let removed = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(err) = removed {
            warn!("could not roll back {}: {err}", path.display());
        }
    }
}

fn display_relative(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tar_gzip_archive_bytes, tar_zstd_archive_bytes, zip_archive_bytes};
    use rstest::rstest;

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).expect("write archive");
        path
    }

    fn visible_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn extracts_zip_archive_with_nested_directories() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let bytes = zip_archive_bytes(&[
            ("pkg/", b""),
            ("pkg/model/weights.bin", b"weights"),
            ("pkg/README", b"hello"),
        ]);
        let archive = write_archive(temp_dir.path(), "pkg.zip", &bytes);

        let mut files = StagedExtractor
            .extract(&archive, ArchiveFormat::Zip, temp_dir.path())
            .expect("extract");
        files.sort();

        assert_eq!(files, vec!["pkg/README", "pkg/model/weights.bin"]);
        assert_eq!(
            fs::read(temp_dir.path().join("pkg/model/weights.bin")).expect("read"),
            b"weights"
        );
        assert_eq!(visible_entries(temp_dir.path()), vec!["pkg", "pkg.zip"]);
    }

    #[rstest]
    #[case::zstd(ArchiveFormat::TarZstd, "pkg.tar.zst")]
    #[case::gzip(ArchiveFormat::TarGzip, "pkg.tar.gz")]
    fn extracts_tarballs(#[case] format: ArchiveFormat, #[case] name: &str) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let entries: &[(&str, &[u8])] = &[("pkg/table.csv", b"a,b\n1,2\n")];
        let bytes = match format {
            ArchiveFormat::TarZstd => tar_zstd_archive_bytes(entries),
            _ => tar_gzip_archive_bytes(entries),
        };
        let archive = write_archive(temp_dir.path(), name, &bytes);

        let files = StagedExtractor
            .extract(&archive, format, temp_dir.path())
            .expect("extract");

        assert_eq!(files, vec!["pkg/table.csv"]);
        assert!(temp_dir.path().join("pkg/table.csv").is_file());
    }

    #[test]
    fn zip_slip_entries_are_rejected_and_nothing_is_promoted() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).expect("create root");
        let bytes = zip_archive_bytes(&[("pkg/ok.txt", b"fine"), ("../evil.txt", b"pwned")]);
        let archive = write_archive(&root, "pkg.zip", &bytes);

        let result = StagedExtractor.extract(&archive, ArchiveFormat::Zip, &root);

        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal, got {result:?}"
        );
        assert!(!temp_dir.path().join("evil.txt").exists());
        assert!(!root.join("pkg").exists());
        assert_eq!(visible_entries(&root), vec!["pkg.zip"]);
    }

    #[test]
    fn malformed_zip_leaves_no_output() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive = write_archive(temp_dir.path(), "pkg.zip", b"definitely not a zip");

        let result = StagedExtractor.extract(&archive, ArchiveFormat::Zip, temp_dir.path());

        assert!(matches!(result, Err(ExtractionError::Zip(_))));
        assert_eq!(visible_entries(temp_dir.path()), vec!["pkg.zip"]);
    }

    #[test]
    fn empty_archive_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let bytes = zip_archive_bytes(&[("pkg/", b"")]);
        let archive = write_archive(temp_dir.path(), "pkg.zip", &bytes);

        let result = StagedExtractor.extract(&archive, ArchiveFormat::Zip, temp_dir.path());

        assert!(matches!(result, Err(ExtractionError::EmptyArchive)));
        assert!(!temp_dir.path().join("pkg").exists());
    }

    #[test]
    fn re_extraction_replaces_files_and_merges_directories() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(temp_dir.path().join("pkg")).expect("seed dir");
        fs::write(temp_dir.path().join("pkg/local.txt"), b"kept").expect("seed file");
        fs::write(temp_dir.path().join("notes.txt"), b"old").expect("seed file");
        let bytes = zip_archive_bytes(&[("pkg/a.txt", b"a"), ("notes.txt", b"new")]);
        let archive = write_archive(temp_dir.path(), "pkg.zip", &bytes);

        StagedExtractor
            .extract(&archive, ArchiveFormat::Zip, temp_dir.path())
            .expect("extract");

        assert_eq!(fs::read(temp_dir.path().join("notes.txt")).expect("read"), b"new");
        assert_eq!(fs::read(temp_dir.path().join("pkg/a.txt")).expect("read"), b"a");
        assert_eq!(
            fs::read(temp_dir.path().join("pkg/local.txt")).expect("read"),
            b"kept"
        );
        assert_eq!(
            visible_entries(temp_dir.path()),
            vec!["notes.txt", "pkg", "pkg.zip"]
        );
    }

    #[test]
    fn extracting_twice_leaves_the_same_tree() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let bytes = zip_archive_bytes(&[("loose.txt", b"x"), ("pkg/a.txt", b"a")]);
        let archive = write_archive(temp_dir.path(), "pkg.zip", &bytes);

        for _ in 0..2 {
            StagedExtractor
                .extract(&archive, ArchiveFormat::Zip, temp_dir.path())
                .expect("extract");
        }

        assert_eq!(
            visible_entries(temp_dir.path()),
            vec!["loose.txt", "pkg", "pkg.zip"]
        );
        assert_eq!(visible_entries(&temp_dir.path().join("pkg")), vec!["a.txt"]);
    }

    #[test]
    fn file_clashing_with_existing_directory_is_a_conflict() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(temp_dir.path().join("notes.txt")).expect("seed conflict");
        let bytes = zip_archive_bytes(&[("pkg/a.txt", b"a"), ("notes.txt", b"theirs")]);
        let archive = write_archive(temp_dir.path(), "pkg.zip", &bytes);

        let result = StagedExtractor.extract(&archive, ArchiveFormat::Zip, temp_dir.path());

        assert!(
            matches!(result, Err(ExtractionError::Conflict { .. })),
            "expected Conflict, got {result:?}"
        );
        assert!(temp_dir.path().join("notes.txt").is_dir());
        assert!(!temp_dir.path().join("pkg").exists());
        assert_eq!(visible_entries(temp_dir.path()), vec!["notes.txt", "pkg.zip"]);
    }

    /// Build a tar holding `pkg/ok.txt` followed by one raw entry whose name
    /// bytes are written directly, bypassing the builder's path checks.
    fn tar_with_raw_entry(path: &str, entry_type: tar::EntryType) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        let mut ok = tar::Header::new_gnu();
        ok.set_entry_type(tar::EntryType::Regular);
        ok.set_size(4);
        ok.set_mode(0o644);
        ok.set_cksum();
        builder
            .append_data(&mut ok, "pkg/ok.txt", &b"fine"[..])
            .expect("append ok entry");

        let data: &[u8] = if entry_type == tar::EntryType::Regular {
            b"pwned"
        } else {
            b""
        };
        let mut raw = tar::Header::new_gnu();
        let name = &mut raw.as_old_mut().name;
        name[..path.len()].copy_from_slice(path.as_bytes());
        raw.set_entry_type(entry_type);
        if matches!(entry_type, tar::EntryType::Symlink | tar::EntryType::Link) {
            raw.set_link_name("ok.txt").expect("link name");
        }
        raw.set_size(data.len() as u64);
        raw.set_mode(0o644);
        raw.set_cksum();
        builder.append(&raw, data).expect("append raw entry");

        builder.into_inner().expect("finish tar")
    }

    fn encode(format: ArchiveFormat, tar: &[u8]) -> Vec<u8> {
        match format {
            ArchiveFormat::TarGzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                std::io::Write::write_all(&mut encoder, tar).expect("gzip encode");
                encoder.finish().expect("finish gzip")
            }
            _ => zstd::stream::encode_all(tar, 0).expect("zstd encode"),
        }
    }

    #[rstest]
    #[case::symlink_zstd(ArchiveFormat::TarZstd, "pkg/link", tar::EntryType::Symlink)]
    #[case::hard_link_gzip(ArchiveFormat::TarGzip, "pkg/hard", tar::EntryType::Link)]
    #[case::fifo_zstd(ArchiveFormat::TarZstd, "pkg/pipe", tar::EntryType::Fifo)]
    fn tar_links_and_devices_are_refused(
        #[case] format: ArchiveFormat,
        #[case] path: &str,
        #[case] entry_type: tar::EntryType,
    ) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let bytes = encode(format, &tar_with_raw_entry(path, entry_type));
        let archive = write_archive(temp_dir.path(), "pkg.tar", &bytes);

        let result = StagedExtractor.extract(&archive, format, temp_dir.path());

        let Err(ExtractionError::UnsupportedEntry { path: reported }) = result else {
            panic!("expected UnsupportedEntry, got {result:?}");
        };
        assert_eq!(reported, path);
        assert!(!temp_dir.path().join("pkg").exists());
        assert_eq!(visible_entries(temp_dir.path()), vec!["pkg.tar"]);
    }

    #[rstest]
    #[case::zstd(ArchiveFormat::TarZstd)]
    #[case::gzip(ArchiveFormat::TarGzip)]
    fn tar_entries_escaping_the_target_are_refused(#[case] format: ArchiveFormat) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).expect("create root");
        let bytes = encode(
            format,
            &tar_with_raw_entry("../evil.txt", tar::EntryType::Regular),
        );
        let archive = write_archive(&root, "pkg.tar", &bytes);

        let result = StagedExtractor.extract(&archive, format, &root);

        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal, got {result:?}"
        );
        assert!(!temp_dir.path().join("evil.txt").exists());
        assert!(!root.join("pkg").exists());
        assert_eq!(visible_entries(&root), vec!["pkg.tar"]);
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("foo/../../escape.txt")]
    #[case::inner_parent("foo/../bar.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let result = validate_entry_path(Path::new(bad_path));
        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_entry_path(Path::new("model/weights.bin")).is_ok());
        assert!(validate_entry_path(Path::new("./model/weights.bin")).is_ok());
    }
}
