//! Run configuration.
//!
//! Settings come from up to four layers, lowest precedence first: built-in
//! defaults, a TOML file, `ARTEFACT_FETCHER_*` environment variables, and
//! command-line flags. This module owns the first three; the CLI applies the
//! last one on top of the loaded [`FetcherConfig`].

use crate::artefact::retrieval::{DEFAULT_TIMEOUT, DEFAULT_URL_TEMPLATE, ID_PLACEHOLDER};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Configuration file picked up from the working directory when no explicit
/// path is given.
pub const DEFAULT_CONFIG_FILE: &str = "artefact-fetcher.toml";

const ENV_ROOT: &str = "ARTEFACT_FETCHER_ROOT";
const ENV_URL_TEMPLATE: &str = "ARTEFACT_FETCHER_URL_TEMPLATE";
const ENV_TIMEOUT_SECS: &str = "ARTEFACT_FETCHER_TIMEOUT_SECS";
const ENV_JOBS: &str = "ARTEFACT_FETCHER_JOBS";
const ENV_MIRROR: &str = "ARTEFACT_FETCHER_MIRROR";

/// Errors arising while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// The file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment variable holds an unusable value.
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A setting failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// The offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings for one fetch run.
///
/// # Examples
///
/// ```
/// use artefact_fetcher::config::FetcherConfig;
///
/// let config = FetcherConfig::from_toml("jobs = 4\n").expect("valid config");
/// assert_eq!(config.jobs, 4);
/// assert_eq!(config.timeout_secs, 300);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetcherConfig {
    /// Directory that artefact names are resolved against.
    pub root: Utf8PathBuf,
    /// Download URL with an `{id}` placeholder for the remote id.
    pub url_template: String,
    /// Per-retrieval timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum number of artefacts processed at once.
    pub jobs: usize,
    /// Exit non-zero when any artefact fails.
    pub strict: bool,
    /// Local directory to copy archives from instead of downloading.
    pub mirror: Option<Utf8PathBuf>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            url_template: DEFAULT_URL_TEMPLATE.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            jobs: 1,
            strict: false,
            mirror: None,
        }
    }
}

impl FetcherConfig {
    /// Parse configuration from TOML. Omitted keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load the file layer.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] in
    /// the working directory is used when present, and defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path,
            None if Utf8Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Utf8Path::new(DEFAULT_CONFIG_FILE)
            }
            None => return Ok(Self::default()),
        };
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a numeric variable does not
    /// parse.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// Blank values are ignored so that an exported-but-empty variable does
    /// not clobber the file layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a numeric variable does not
    /// parse.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(root) = lookup(ENV_ROOT) {
            self.root = Utf8PathBuf::from(root);
        }
        if let Some(template) = lookup(ENV_URL_TEMPLATE) {
            self.url_template = template;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_env(ENV_TIMEOUT_SECS, value)?;
        }
        if let Some(value) = lookup(ENV_JOBS) {
            self.jobs = parse_env(ENV_JOBS, value)?;
        }
        if let Some(mirror) = lookup(ENV_MIRROR) {
            self.mirror = Some(Utf8PathBuf::from(mirror));
        }
        Ok(())
    }

    /// Check that the settings can drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url_template.contains(ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid {
                field: "url_template",
                reason: format!("must contain {ID_PLACEHOLDER}"),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.jobs == 0 {
            return Err(ConfigError::Invalid {
                field: "jobs",
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }

    /// Return the retrieval timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_env<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|err| ConfigError::InvalidEnv {
        var,
        reason: err.to_string(),
        value,
    })
}
