//! Shared test utilities for the fetcher crate.

use crate::artefact::retrieval::{ArtefactRetriever, RetrievalError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

/// Compute the lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Build an in-memory zip archive.
///
/// Entry names ending in `/` become directory entries. Names are stored
/// verbatim, so hostile entries such as `../evil.txt` can be produced.
///
/// # Panics
///
/// Panics if the zip writer fails.
pub fn zip_archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, options)
                .expect("add zip directory");
        } else {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(data).expect("write zip entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

fn tar_archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *data)
            .expect("append tar entry");
    }
    builder.into_inner().expect("finish tar")
}

/// Build an in-memory `.tar.zst` archive of regular files.
///
/// # Panics
///
/// Panics if tar or zstd encoding fails.
pub fn tar_zstd_archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let tar = tar_archive_bytes(entries);
    zstd::stream::encode_all(tar.as_slice(), 0).expect("zstd encode")
}

/// Build an in-memory `.tar.gz` archive of regular files.
///
/// # Panics
///
/// Panics if tar or gzip encoding fails.
pub fn tar_gzip_archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let tar = tar_archive_bytes(entries);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar).expect("gzip encode");
    encoder.finish().expect("finish gzip")
}

/// What [`StubRetriever`] does when asked for a remote id.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Write these bytes to the destination.
    Bytes(Vec<u8>),
    /// Fail with an HTTP-style error carrying this reason.
    Fail(String),
    /// Report success without writing anything.
    Nothing,
    /// Panic with this message.
    Panic(String),
}

/// An [`ArtefactRetriever`] that replays scripted responses keyed by remote
/// id and records every call it receives.
///
/// Unknown ids fail with [`RetrievalError::NotFound`].
#[derive(Debug, Default)]
pub struct StubRetriever {
    responses: HashMap<String, StubResponse>,
    calls: Mutex<Vec<String>>,
}

impl StubRetriever {
    /// Create a retriever with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for `remote_id`.
    #[must_use]
    pub fn with_response(mut self, remote_id: &str, response: StubResponse) -> Self {
        self.responses.insert(remote_id.to_owned(), response);
        self
    }

    /// Script `remote_id` to deliver `bytes`.
    #[must_use]
    pub fn serving(self, remote_id: &str, bytes: &[u8]) -> Self {
        self.with_response(remote_id, StubResponse::Bytes(bytes.to_vec()))
    }

    /// Return the remote ids requested so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log").clone()
    }

    /// Return how many retrievals were requested.
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl ArtefactRetriever for StubRetriever {
    fn retrieve(&self, remote_id: &str, dest: &Path) -> Result<(), RetrievalError> {
        self.calls
            .lock()
            .expect("call log")
            .push(remote_id.to_owned());

        let url = format!("stub://{remote_id}");
        match self.responses.get(remote_id) {
            Some(StubResponse::Bytes(bytes)) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            Some(StubResponse::Fail(reason)) => Err(RetrievalError::Http {
                url,
                reason: reason.clone(),
            }),
            Some(StubResponse::Nothing) => Ok(()),
            Some(StubResponse::Panic(message)) => panic!("{message}"),
            None => Err(RetrievalError::NotFound { url }),
        }
    }
}
