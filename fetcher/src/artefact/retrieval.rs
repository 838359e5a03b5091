//! Remote artefact retrieval.
//!
//! Provides a trait-based abstraction for fetching an archive identified by
//! an opaque remote id, so the fetch pipeline can be exercised without
//! network access. Two implementations ship: an HTTP retriever driven by a
//! URL template and a mirror retriever that copies from a local directory.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Placeholder substituted with the remote id in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Direct-download endpoint for files shared from Google Drive. The
/// `confirm=t` parameter skips the interstitial served for large files.
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://drive.usercontent.google.com/download?export=download&confirm=t&id={id}";

/// Global timeout applied to a single retrieval.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Trait for retrieving artefact archives.
///
/// Implementations must either leave a complete file at `dest` or return an
/// error; callers still verify that the file exists afterwards.
///
/// # Examples
///
/// ```
/// use artefact_fetcher::artefact::retrieval::{DEFAULT_TIMEOUT, DEFAULT_URL_TEMPLATE, HttpRetriever};
///
/// let retriever = HttpRetriever::new(DEFAULT_URL_TEMPLATE, DEFAULT_TIMEOUT);
/// assert!(retriever.url_for("abc").ends_with("id=abc"));
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactRetriever: Send + Sync {
    /// Retrieve the blob identified by `remote_id` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote is unreachable, refuses the request,
    /// serves something other than the archive, or the file cannot be
    /// written.
    fn retrieve(&self, remote_id: &str, dest: &Path) -> Result<(), RetrievalError>;
}

/// Errors arising from artefact retrieval.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// HTTP request failed, including timeouts.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested artefact was not found (HTTP 404).
    #[error("artefact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The server answered with a web page instead of the archive, which is
    /// how quota and sharing errors surface.
    #[error("{url} returned {content_type} instead of an archive (quota exceeded or access denied?)")]
    UnexpectedContent {
        /// The URL that was requested.
        url: String,
        /// The content type the server declared.
        content_type: String,
    },

    /// The remote id cannot be used with this retriever.
    #[error("invalid remote id \"{remote_id}\": {reason}")]
    InvalidRemoteId {
        /// The rejected id.
        remote_id: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The mirror directory holds no file for the remote id.
    #[error("mirror has no file at {path}")]
    MirrorMissing {
        /// The path that was looked up.
        path: Utf8PathBuf,
    },

    /// I/O error writing the retrieved file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based retriever using `ureq`.
#[derive(Clone)]
pub struct HttpRetriever {
    agent: ureq::Agent,
    url_template: String,
}

impl HttpRetriever {
    /// Create a retriever for `url_template` with a global request timeout.
    #[must_use]
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            url_template: url_template.into(),
        }
    }

    /// Construct the download URL for `remote_id`.
    #[must_use]
    pub fn url_for(&self, remote_id: &str) -> String {
        self.url_template.replace(ID_PLACEHOLDER, remote_id)
    }
}

impl ArtefactRetriever for HttpRetriever {
    fn retrieve(&self, remote_id: &str, dest: &Path) -> Result<(), RetrievalError> {
        validate_url_safe(remote_id)?;
        let url = self.url_for(remote_id);
        debug!("GET {url}");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| map_ureq_error(&url, &e))?;
        reject_html(&url, response.headers().get("content-type"))?;
        let mut body = response.into_body();
        let mut reader = body.as_reader();
        write_atomically(dest, &mut reader)
    }
}

/// Retriever that copies `<mirror>/<remote_id>` into place.
#[derive(Debug, Clone)]
pub struct MirrorRetriever {
    root: Utf8PathBuf,
}

impl MirrorRetriever {
    /// Create a retriever reading from the mirror directory `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return the mirror directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl ArtefactRetriever for MirrorRetriever {
    fn retrieve(&self, remote_id: &str, dest: &Path) -> Result<(), RetrievalError> {
        validate_plain_file_name(remote_id)?;
        let source = self.root.join(remote_id);
        if !source.is_file() {
            return Err(RetrievalError::MirrorMissing { path: source });
        }
        debug!("copying {source}");
        let mut file = std::fs::File::open(source.as_std_path())?;
        write_atomically(dest, &mut file)
    }
}

/// Stream `reader` into a temporary file beside `dest`, then rename it into
/// place. An interrupted transfer leaves nothing at `dest`.
fn write_atomically(dest: &Path, reader: &mut dyn Read) -> Result<(), RetrievalError> {
    let parent = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(parent)?;
    std::io::copy(reader, &mut staged)?;
    staged.persist(dest).map_err(|e| RetrievalError::Io(e.error))?;
    Ok(())
}

/// Map a ureq error to a [`RetrievalError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> RetrievalError {
    match err {
        ureq::Error::StatusCode(404) => RetrievalError::NotFound {
            url: url.to_owned(),
        },
        other => RetrievalError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

fn reject_html(
    url: &str,
    content_type: Option<&ureq::http::HeaderValue>,
) -> Result<(), RetrievalError> {
    let Some(value) = content_type.and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    if value.trim_start().to_ascii_lowercase().starts_with("text/html") {
        return Err(RetrievalError::UnexpectedContent {
            url: url.to_owned(),
            content_type: value.to_owned(),
        });
    }
    Ok(())
}

fn validate_url_safe(remote_id: &str) -> Result<(), RetrievalError> {
    if remote_id.is_empty() {
        return Err(invalid_id(remote_id, "must not be empty"));
    }
    if let Some(bad) = remote_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid_id(remote_id, &format!("character '{bad}' is not URL-safe")));
    }
    Ok(())
}

fn validate_plain_file_name(remote_id: &str) -> Result<(), RetrievalError> {
    if remote_id.is_empty() || remote_id == "." || remote_id == ".." {
        return Err(invalid_id(remote_id, "must name a file"));
    }
    if remote_id.contains(['/', '\\']) {
        return Err(invalid_id(remote_id, "must not contain path separators"));
    }
    Ok(())
}

fn invalid_id(remote_id: &str, reason: &str) -> RetrievalError {
    RetrievalError::InvalidRemoteId {
        remote_id: remote_id.to_owned(),
        reason: reason.to_owned(),
    }
}
