//! Artefact fetcher CLI entrypoint.
//!
//! Loads configuration and the manifest, fetches every artefact, and reports
//! the outcome. Exit status is 0 when the run completes, 1 when `--strict` is
//! set and any artefact failed, and 2 when the run could not start.

use artefact_fetcher::artefact::extraction::StagedExtractor;
use artefact_fetcher::artefact::manifest::Manifest;
use artefact_fetcher::artefact::manifest_parser::{ManifestParseError, load_manifest};
use artefact_fetcher::artefact::retrieval::{ArtefactRetriever, HttpRetriever, MirrorRetriever};
use artefact_fetcher::cli::Cli;
use artefact_fetcher::config::FetcherConfig;
use artefact_fetcher::error::Result;
use artefact_fetcher::fetch::{Fetcher, plan};
use artefact_fetcher::output::{DryRunInfo, failure_lines};
use artefact_fetcher::report::FetchReport;
use clap::Parser;
use std::io::Write;

/// How a run that started ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Complete,
    StrictFailure,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<RunStatus> {
    let config = resolve_config(cli)?;
    let (manifest, manifest_source) = resolve_manifest(cli)?;

    if cli.dry_run {
        return run_dry(&config, &manifest, &manifest_source, stderr);
    }

    let extractor = StagedExtractor;
    let report = match &config.mirror {
        Some(mirror) => {
            let retriever = MirrorRetriever::new(mirror.clone());
            fetch_all(&config, &manifest, &retriever, &extractor)
        }
        None => {
            let retriever = HttpRetriever::new(config.url_template.clone(), config.timeout());
            fetch_all(&config, &manifest, &retriever, &extractor)
        }
    };

    if cli.json {
        writeln!(stdout, "{}", report.to_json()?)?;
    }
    if !cli.quiet {
        report_summary(&report, stderr);
    }

    if config.strict && report.has_failures() {
        Ok(RunStatus::StrictFailure)
    } else {
        Ok(RunStatus::Complete)
    }
}

/// Layers defaults, config file, environment, and flags, then validates.
fn resolve_config(cli: &Cli) -> Result<FetcherConfig> {
    let mut config = FetcherConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    cli.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

fn resolve_manifest(cli: &Cli) -> Result<(Manifest, String)> {
    match &cli.manifest {
        Some(path) => Ok((load_manifest(path)?, path.to_string())),
        None => Ok((
            Manifest::builtin().map_err(ManifestParseError::from)?,
            "built-in".to_owned(),
        )),
    }
}

fn fetch_all(
    config: &FetcherConfig,
    manifest: &Manifest,
    retriever: &dyn ArtefactRetriever,
    extractor: &StagedExtractor,
) -> FetchReport {
    Fetcher::new(config.root.clone(), retriever, extractor)
        .with_jobs(config.jobs)
        .fetch_all(manifest)
}

/// Shows configuration and the per-artefact plan without side effects.
fn run_dry(
    config: &FetcherConfig,
    manifest: &Manifest,
    manifest_source: &str,
    stderr: &mut dyn Write,
) -> Result<RunStatus> {
    let actions = plan(&config.root, manifest);
    let info = DryRunInfo {
        config,
        manifest_source,
        plan: &actions,
    };
    write_stderr_line(stderr, info.display_text());
    Ok(RunStatus::Complete)
}

fn report_summary(report: &FetchReport, stderr: &mut dyn Write) {
    let failures = failure_lines(report);
    if !failures.is_empty() {
        write_stderr_line(stderr, "Failed artefacts:");
        for line in failures {
            write_stderr_line(stderr, line);
        }
    }
    write_stderr_line(stderr, report.summary_line());
}

fn exit_code_for_run_result(result: Result<RunStatus>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(RunStatus::Complete) => 0,
        Ok(RunStatus::StrictFailure) => 1,
        Err(err) => {
            write_stderr_line(stderr, err);
            2
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
