//! Behaviour-driven tests for the fetch pipeline.
//!
//! Scenarios drive the real staged extractor against archives served by a
//! scripted retriever, using the rstest-bdd v0.5.0 mutable world pattern.

use artefact_fetcher::artefact::extraction::StagedExtractor;
use artefact_fetcher::artefact::manifest::{ArtefactSpec, Manifest};
use artefact_fetcher::fetch::{FetchOutcome, Fetcher};
use artefact_fetcher::report::FetchReport;
use artefact_fetcher::test_utils::{StubResponse, StubRetriever, sha256_hex, zip_archive_bytes};
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct FetchWorld {
    _temp_dir: tempfile::TempDir,
    root: Utf8PathBuf,
    /// (name, remote id) pairs in declaration order.
    entries: Vec<(String, String)>,
    retriever: StubRetriever,
    report: Option<FetchReport>,
}

#[fixture]
fn world() -> FetchWorld {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 path");
    FetchWorld {
        _temp_dir: temp_dir,
        root,
        entries: Vec::new(),
        retriever: StubRetriever::new(),
        report: None,
    }
}

/// Each remote id serves a zip whose single directory is named after the id's
/// artefact, so archives never collide under a shared root.
fn archive_for(world: &FetchWorld, remote_id: &str) -> Vec<u8> {
    let name = world
        .entries
        .iter()
        .find(|(_, id)| id == remote_id)
        .map(|(name, _)| name.clone())
        .expect("remote id declared in manifest");
    let stem = name.trim_end_matches(".zip");
    zip_archive_bytes(&[(&format!("{stem}/hello.txt"), b"hello")])
}

fn manifest(world: &FetchWorld) -> Manifest {
    let specs = world
        .entries
        .iter()
        .map(|(name, remote_id)| {
            let digest = sha256_hex(&archive_for(world, remote_id));
            ArtefactSpec::new(name, remote_id, &digest).expect("valid spec")
        })
        .collect();
    Manifest::new(specs).expect("valid manifest")
}

fn script(world: &mut FetchWorld, remote_id: &str, response: StubResponse) {
    let retriever = std::mem::take(&mut world.retriever);
    world.retriever = retriever.with_response(remote_id, response);
}

fn run(world: &mut FetchWorld, jobs: usize) {
    let manifest = manifest(world);
    let fetcher = Fetcher::new(world.root.clone(), &world.retriever, &StagedExtractor).with_jobs(jobs);
    world.report = Some(fetcher.fetch_all(&manifest));
}

fn outcome<'a>(world: &'a FetchWorld, name: &str) -> &'a FetchOutcome {
    world
        .report
        .as_ref()
        .expect("fetcher has run")
        .artefacts()
        .iter()
        .find(|entry| entry.name().as_str() == name)
        .map(|entry| entry.outcome())
        .expect("artefact in report")
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a manifest entry \"{name}\" with remote id \"{remote_id}\"")]
fn given_manifest_entry(world: &mut FetchWorld, name: String, remote_id: String) {
    world.entries.push((name, remote_id));
}

#[given("the remote serves the matching archive for \"{remote_id}\"")]
fn given_matching_archive(world: &mut FetchWorld, remote_id: String) {
    let archive = archive_for(world, &remote_id);
    script(world, &remote_id, StubResponse::Bytes(archive));
}

#[given("the remote serves tampered bytes for \"{remote_id}\"")]
fn given_tampered_archive(world: &mut FetchWorld, remote_id: String) {
    script(world, &remote_id, StubResponse::Bytes(b"world".to_vec()));
}

#[given("the remote fails for \"{remote_id}\"")]
fn given_failing_remote(world: &mut FetchWorld, remote_id: String) {
    script(
        world,
        &remote_id,
        StubResponse::Fail("connection refused".to_owned()),
    );
}

#[given("the remote reports success without writing for \"{remote_id}\"")]
fn given_silent_remote(world: &mut FetchWorld, remote_id: String) {
    script(world, &remote_id, StubResponse::Nothing);
}

#[given("the remote panics for \"{remote_id}\"")]
fn given_panicking_remote(world: &mut FetchWorld, remote_id: String) {
    script(
        world,
        &remote_id,
        StubResponse::Panic("retriever exploded".to_owned()),
    );
}

#[when("the fetcher runs")]
fn when_fetcher_runs(world: &mut FetchWorld) {
    run(world, 1);
}

#[when("the fetcher runs again")]
fn when_fetcher_runs_again(world: &mut FetchWorld) {
    run(world, 1);
}

#[when("the fetcher runs with {jobs:usize} jobs")]
fn when_fetcher_runs_in_parallel(world: &mut FetchWorld, jobs: usize) {
    run(world, jobs);
}

#[then("\"{name}\" succeeds")]
fn then_succeeds(world: &mut FetchWorld, name: String) {
    let outcome = outcome(world, &name);
    assert!(
        matches!(outcome, FetchOutcome::Succeeded { .. }),
        "expected {name} to succeed, got {outcome:?}"
    );
}

#[then("\"{name}\" is skipped")]
fn then_skipped(world: &mut FetchWorld, name: String) {
    let outcome = outcome(world, &name);
    assert!(
        matches!(outcome, FetchOutcome::Skipped { .. }),
        "expected {name} to be skipped, got {outcome:?}"
    );
}

#[then("\"{name}\" fails with \"{kind}\"")]
fn then_fails_with(world: &mut FetchWorld, name: String, kind: String) {
    match outcome(world, &name) {
        FetchOutcome::Failed(err) => assert_eq!(err.kind(), kind, "{err}"),
        other => panic!("expected {name} to fail, got {other:?}"),
    }
}

#[then("the file \"{path}\" exists under the root")]
fn then_file_exists(world: &mut FetchWorld, path: String) {
    assert!(world.root.join(&path).is_file(), "{path} missing");
}

#[then("the directory \"{path}\" does not exist under the root")]
fn then_directory_absent(world: &mut FetchWorld, path: String) {
    assert!(!world.root.join(&path).exists(), "{path} was created");
}

#[then("the archive \"{name}\" has been removed")]
fn then_archive_removed(world: &mut FetchWorld, name: String) {
    assert!(!world.root.join(&name).exists(), "{name} still on disk");
}

#[then("the archive \"{name}\" is kept for inspection")]
fn then_archive_kept(world: &mut FetchWorld, name: String) {
    assert!(world.root.join(&name).is_file(), "{name} was removed");
}

#[then("the remote received {count:usize} request")]
fn then_request_count(world: &mut FetchWorld, count: usize) {
    assert_eq!(world.retriever.call_count(), count);
}

#[then("the report lists {count:usize} artefacts in manifest order")]
fn then_report_order(world: &mut FetchWorld, count: usize) {
    let report = world.report.as_ref().expect("fetcher has run");
    let reported: Vec<_> = report
        .artefacts()
        .iter()
        .map(|entry| entry.name().as_str().to_owned())
        .collect();
    let declared: Vec<_> = world.entries.iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(reported.len(), count);
    assert_eq!(reported, declared);
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/fetch.feature",
    name = "Golden artefact is fetched and extracted"
)]
fn scenario_golden(world: FetchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/fetch.feature",
    name = "Tampered archive is never extracted"
)]
fn scenario_tamper(world: FetchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/fetch.feature",
    name = "Second run performs no retrievals"
)]
fn scenario_idempotent(world: FetchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/fetch.feature",
    name = "One failure does not stop the batch"
)]
fn scenario_isolation(world: FetchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/fetch.feature",
    name = "Retriever that writes nothing is reported as a missing file"
)]
fn scenario_missing_file(world: FetchWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/fetch.feature",
    name = "Panicking retrieval is contained"
)]
fn scenario_panic(world: FetchWorld) {
    let _ = world;
}
