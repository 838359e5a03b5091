//! Human-readable output for the fetcher CLI.

use crate::artefact::manifest::ArtefactSpec;
use crate::config::FetcherConfig;
use crate::fetch::{FetchOutcome, PlannedAction};
use crate::report::FetchReport;

/// Configuration and plan shown by `--dry-run`.
///
/// # Example
///
/// ```
/// use artefact_fetcher::artefact::manifest::ArtefactSpec;
/// use artefact_fetcher::config::FetcherConfig;
/// use artefact_fetcher::fetch::PlannedAction;
/// use artefact_fetcher::output::DryRunInfo;
///
/// let spec = ArtefactSpec::new(
///     "pkg.zip",
///     "remote-1",
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
/// )
/// .expect("valid entry");
/// let plan = vec![(spec, PlannedAction::Fetch)];
/// let info = DryRunInfo {
///     config: &FetcherConfig::default(),
///     manifest_source: "built-in",
///     plan: &plan,
/// };
///
/// let output = info.display_text();
/// assert!(output.contains("Dry run"));
/// assert!(output.contains("fetch  pkg.zip"));
/// ```
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Effective configuration.
    pub config: &'a FetcherConfig,
    /// Where the manifest came from.
    pub manifest_source: &'a str,
    /// What would happen to each artefact.
    pub plan: &'a [(ArtefactSpec, PlannedAction)],
}

impl DryRunInfo<'_> {
    /// Format the dry-run report.
    #[must_use]
    pub fn display_text(&self) -> String {
        let source = match &self.config.mirror {
            Some(mirror) => format!("mirror {mirror}"),
            None => self.config.url_template.clone(),
        };
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Manifest: {}", self.manifest_source),
            format!("Root: {}", self.config.root),
            format!("Source: {source}"),
            format!("Timeout: {}s", self.config.timeout_secs),
            format!("Parallel jobs: {}", self.config.jobs),
            format!("Strict: {}", self.config.strict),
            String::new(),
            "Artefacts:".to_owned(),
        ];
        lines.extend(self.plan.iter().map(|(spec, action)| {
            let verb = match action {
                PlannedAction::Skip => "skip ",
                PlannedAction::Fetch => "fetch",
            };
            format!("  {verb}  {} ({})", spec.name(), spec.remote_id())
        }));
        lines.join("\n")
    }
}

/// One line per failed artefact, in manifest order.
#[must_use]
pub fn failure_lines(report: &FetchReport) -> Vec<String> {
    report
        .artefacts()
        .iter()
        .filter_map(|entry| match entry.outcome() {
            FetchOutcome::Failed(err) => Some(format!("  {}: {err}", entry.name())),
            _ => None,
        })
        .collect()
}
