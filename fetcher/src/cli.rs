//! CLI argument definitions for the artefact fetcher.
//!
//! Flags form the highest-precedence configuration layer: anything given
//! here overrides the config file and `ARTEFACT_FETCHER_*` variables.

use crate::config::FetcherConfig;
use camino::Utf8PathBuf;
use clap::Parser;
use log::LevelFilter;

/// Download, verify, and unpack the artefacts declared in a digest manifest.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "artefact-fetcher")]
#[command(version, about)]
#[command(long_about = concat!(
    "Download, verify, and unpack the artefacts declared in a digest manifest.\n\n",
    "Each artefact is retrieved by its remote id, checked against its trusted ",
    "SHA-256 digest, and extracted next to the archive. Artefacts whose ",
    "destination directory already exists are skipped, so repeated runs only ",
    "fetch what is missing. One failed artefact never stops the others.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Fetch the built-in model artefacts into the current directory:\n",
    "    $ artefact-fetcher\n\n",
    "  Fetch from a manifest, four at a time, failing the run on any error:\n",
    "    $ artefact-fetcher --manifest artefacts.toml -j 4 --strict\n\n",
    "  Copy archives from a local mirror instead of downloading:\n",
    "    $ artefact-fetcher --mirror /srv/artefact-mirror\n\n",
    "  Show what would be fetched:\n",
    "    $ artefact-fetcher --dry-run",
))]
pub struct Cli {
    /// TOML manifest of artefacts [default: built-in model artefacts].
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Configuration file [default: ./artefact-fetcher.toml when present].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Directory artefact names are resolved against.
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<Utf8PathBuf>,

    /// Copy archives from this directory instead of downloading them.
    #[arg(long, value_name = "DIR", conflicts_with = "url_template")]
    pub mirror: Option<Utf8PathBuf>,

    /// Download URL with an {id} placeholder for the remote id.
    #[arg(long, value_name = "TEMPLATE")]
    pub url_template: Option<String>,

    /// Per-download timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of artefacts to fetch in parallel.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Exit with status 1 if any artefact fails.
    #[arg(long)]
    pub strict: bool,

    /// Show what would be fetched and exit without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log warnings and errors, and omit the summary line.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use artefact_fetcher::cli::Cli;
    /// use artefact_fetcher::config::FetcherConfig;
    ///
    /// let cli = Cli { jobs: Some(4), strict: true, ..Cli::default() };
    /// let mut config = FetcherConfig::default();
    /// cli.apply_to(&mut config);
    /// assert_eq!(config.jobs, 4);
    /// assert!(config.strict);
    /// ```
    pub fn apply_to(&self, config: &mut FetcherConfig) {
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(mirror) = &self.mirror {
            config.mirror = Some(mirror.clone());
        }
        if let Some(template) = &self.url_template {
            config.url_template = template.clone();
            config.mirror = None;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.strict {
            config.strict = true;
        }
    }

    /// Map `-q` and `-v` to a log level. `RUST_LOG` may still override it.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Warn;
        }
        match self.verbosity {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
