//! Run reports.
//!
//! A [`FetchReport`] is the append-only result log of one run: one
//! [`ArtefactReport`] per manifest entry, in manifest order. It renders either
//! as a one-line human summary or as a JSON document for automation.

use crate::artefact::name::ArtefactName;
use crate::fetch::FetchOutcome;
use serde::Serialize;

/// The outcome of one artefact within a run.
#[derive(Debug)]
pub struct ArtefactReport {
    name: ArtefactName,
    outcome: FetchOutcome,
}

impl ArtefactReport {
    /// Pair an artefact name with its outcome.
    #[must_use]
    pub fn new(name: ArtefactName, outcome: FetchOutcome) -> Self {
        Self { name, outcome }
    }

    /// Return the artefact name.
    #[must_use]
    pub fn name(&self) -> &ArtefactName {
        &self.name
    }

    /// Return the outcome.
    #[must_use]
    pub fn outcome(&self) -> &FetchOutcome {
        &self.outcome
    }
}

/// All outcomes of one run, in manifest order.
#[derive(Debug, Default)]
pub struct FetchReport {
    artefacts: Vec<ArtefactReport>,
}

impl FetchReport {
    /// Wrap per-artefact outcomes.
    #[must_use]
    pub fn new(artefacts: Vec<ArtefactReport>) -> Self {
        Self { artefacts }
    }

    /// Return every artefact outcome in manifest order.
    #[must_use]
    pub fn artefacts(&self) -> &[ArtefactReport] {
        &self.artefacts
    }

    /// Number of artefacts extracted this run.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, FetchOutcome::Succeeded { .. }))
    }

    /// Number of artefacts already present.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FetchOutcome::Skipped { .. }))
    }

    /// Number of artefacts that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(FetchOutcome::is_failure)
    }

    /// Return true if any artefact failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.artefacts
            .iter()
            .filter(|entry| predicate(&entry.outcome))
            .count()
    }

    /// One-line summary for the end of a run.
    ///
    /// # Examples
    ///
    /// ```
    /// use artefact_fetcher::report::FetchReport;
    ///
    /// let report = FetchReport::default();
    /// assert_eq!(report.summary_line(), "0 fetched, 0 already present, 0 failed");
    /// ```
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{} fetched, {} already present, {} failed",
            self.succeeded(),
            self.skipped(),
            self.failed()
        )
    }

    /// Render the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let document = ReportDocument {
            summary: Summary {
                succeeded: self.succeeded(),
                skipped: self.skipped(),
                failed: self.failed(),
            },
            artefacts: self.artefacts.iter().map(ArtefactRecord::from).collect(),
        };
        serde_json::to_string_pretty(&document)
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    summary: Summary,
    artefacts: Vec<ArtefactRecord<'a>>,
}

#[derive(Serialize)]
struct Summary {
    succeeded: usize,
    skipped: usize,
    failed: usize,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ArtefactStatus<'a> {
    Skipped { destination: &'a str },
    Succeeded { destination: &'a str, files: usize },
    Failed { kind: &'static str, message: String },
}

#[derive(Serialize)]
struct ArtefactRecord<'a> {
    name: &'a str,
    #[serde(flatten)]
    status: ArtefactStatus<'a>,
}

impl<'a> From<&'a ArtefactReport> for ArtefactRecord<'a> {
    fn from(entry: &'a ArtefactReport) -> Self {
        let status = match &entry.outcome {
            FetchOutcome::Skipped { destination } => ArtefactStatus::Skipped {
                destination: destination.as_str(),
            },
            FetchOutcome::Succeeded { destination, files } => ArtefactStatus::Succeeded {
                destination: destination.as_str(),
                files: *files,
            },
            FetchOutcome::Failed(err) => ArtefactStatus::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        Self {
            name: entry.name.as_str(),
            status,
        }
    }
}
