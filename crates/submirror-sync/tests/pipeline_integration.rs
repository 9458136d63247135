//! End-to-end pipeline tests against local git repositories.
//!
//! The integral remote is a bare repository seeded with one commit; the
//! subrepo propagation is replaced by `MemoryPusher` so no `git subrepo`
//! installation is needed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use submirror_core::{PushEvent, TriggerDecision, TriggerPolicy, DEFAULT_MARKER};
use submirror_sync::fakes::MemoryPusher;
use submirror_sync::{MirrorPipeline, SyncConfig, SyncOutcome, SyncSpec};

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Seed a bare "integral" remote with a single commit "initial".
/// Returns the bare repo path and the seeded head hash.
fn seed_integral(root: &Path) -> (PathBuf, String) {
    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    run_git(&seed, &["init", "-b", "main"]);
    run_git(&seed, &["config", "user.name", "test-user"]);
    run_git(&seed, &["config", "user.email", "test@example.com"]);
    std::fs::write(seed.join("kernel.rs"), "fn main() {}\n").unwrap();
    run_git(&seed, &["add", "-A"]);
    run_git(&seed, &["commit", "-m", "initial"]);
    let head = run_git(&seed, &["rev-parse", "HEAD"]);

    run_git(root, &["clone", "--bare", "seed", "integral.git"]);
    (root.join("integral.git"), head)
}

fn write_update_script(root: &Path) -> PathBuf {
    let script = root.join("update.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\necho \"$PARENT_COMMIT_ID\" > sync-state.txt\n",
    )
    .unwrap();
    script
}

fn config(root: &Path, update_script: PathBuf) -> SyncConfig {
    SyncConfig {
        workdir: root.join("work"),
        update_script,
        timeout_secs: 60,
        git_env: Vec::new(),
    }
}

fn bare_head_subject(bare: &Path) -> String {
    run_git(bare, &["log", "-1", "--pretty=%s"])
}

/// Test: qualifying push mirrors end to end and records the follow-up commit.
#[tokio::test]
async fn test_full_sync_records_follow_up_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, seeded_head) = seed_integral(tmp.path());
    let script = write_update_script(tmp.path());

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let event = PushEvent::new("main", "fix bug");
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);
    let cfg = config(tmp.path(), script);
    let pusher = Arc::new(MemoryPusher::new());

    let outcome = MirrorPipeline::run(&policy, &event, &spec, &cfg, pusher.clone())
        .await
        .expect("pipeline");

    let report = match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Skipped(d) => panic!("unexpected skip: {d:?}"),
    };

    assert!(report.success, "run should succeed: {:?}", report.steps);
    assert_eq!(report.passed_count(), 7, "all seven steps pass");
    assert_eq!(report.failed_count(), 0);

    // Captured metadata equals the seeded head at clone time.
    assert_eq!(report.parent_commit_id, seeded_head);
    assert_eq!(report.integral_commit_message, "initial");

    // Propagation ran exactly once, in the clone.
    let clone_dir = cfg.workdir.join("integral");
    assert_eq!(pusher.calls(), vec![clone_dir.clone()]);

    // The update script ran after the reset, with the recorded commit
    // exported in its environment.
    let state = std::fs::read_to_string(clone_dir.join("sync-state.txt")).unwrap();
    assert_eq!(state.trim(), seeded_head);

    // The follow-up commit was pushed back to the integral remote.
    assert_eq!(
        bare_head_subject(&bare),
        "git subrepo update commit for initial"
    );

    // Its author is the identity captured from the integral head.
    let author = run_git(&bare, &["log", "-1", "--pretty=%an <%ae>"]);
    assert_eq!(author, "test-user <test@example.com>");
}

/// Test: a push whose head message carries the marker performs no steps.
#[tokio::test]
async fn test_marked_push_performs_no_steps() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, _seeded_head) = seed_integral(tmp.path());
    let script = write_update_script(tmp.path());

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let event = PushEvent::new("main", "git subrepo pull: synced");
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);
    let cfg = config(tmp.path(), script);
    let pusher = Arc::new(MemoryPusher::new());

    let outcome = MirrorPipeline::run(&policy, &event, &spec, &cfg, pusher.clone())
        .await
        .expect("pipeline");

    assert!(matches!(
        outcome,
        SyncOutcome::Skipped(TriggerDecision::SkipMarker)
    ));
    assert!(pusher.calls().is_empty());
    assert!(!cfg.workdir.exists(), "nothing cloned on skip");
    assert_eq!(bare_head_subject(&bare), "initial", "remote untouched");
}

/// Test: the run the follow-up commit itself triggers is suppressed.
#[tokio::test]
async fn test_follow_up_push_does_not_mirror_again() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, _) = seed_integral(tmp.path());
    let script = write_update_script(tmp.path());

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);
    let cfg = config(tmp.path(), script);

    // First run succeeds and records the follow-up commit.
    let first = MirrorPipeline::run(
        &policy,
        &PushEvent::new("main", "fix bug"),
        &spec,
        &cfg,
        Arc::new(MemoryPusher::new()),
    )
    .await
    .expect("pipeline");
    assert!(matches!(first, SyncOutcome::Completed(ref r) if r.success));

    // The follow-up commit's own push event must skip.
    let follow_up_message = bare_head_subject(&bare);
    let pusher = Arc::new(MemoryPusher::new());
    let second = MirrorPipeline::run(
        &policy,
        &PushEvent::new("main", follow_up_message),
        &spec,
        &cfg,
        pusher.clone(),
    )
    .await
    .expect("pipeline");

    assert!(matches!(
        second,
        SyncOutcome::Skipped(TriggerDecision::SkipMarker)
    ));
    assert!(pusher.calls().is_empty());
}

/// Test: a failing subrepo push aborts the run before reset and record.
#[tokio::test]
async fn test_failed_propagation_aborts_before_record() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, _) = seed_integral(tmp.path());
    let script = write_update_script(tmp.path());

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let event = PushEvent::new("main", "fix bug");
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);
    let cfg = config(tmp.path(), script);
    let pusher = Arc::new(MemoryPusher::failing());

    let outcome = MirrorPipeline::run(&policy, &event, &spec, &cfg, pusher.clone())
        .await
        .expect("pipeline");

    let report = match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Skipped(d) => panic!("unexpected skip: {d:?}"),
    };

    assert!(!report.success);
    let last = report.steps.last().unwrap();
    assert_eq!(last.step_name, "subrepo_push");
    assert!(!last.success);
    // clone + capture + identity + subrepo_push, nothing after.
    assert_eq!(report.steps.len(), 4);

    // No follow-up commit reached the remote.
    assert_eq!(bare_head_subject(&bare), "initial");
}

/// Test: a non-zero update script fails the run and nothing is recorded.
#[tokio::test]
async fn test_failing_update_script_fails_run() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, _) = seed_integral(tmp.path());
    let script = tmp.path().join("update.sh");
    std::fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let event = PushEvent::new("main", "fix bug");
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);
    let cfg = config(tmp.path(), script);

    let outcome = MirrorPipeline::run(&policy, &event, &spec, &cfg, Arc::new(MemoryPusher::new()))
        .await
        .expect("pipeline");

    let report = match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Skipped(d) => panic!("unexpected skip: {d:?}"),
    };

    assert!(!report.success);
    let last = report.steps.last().unwrap();
    assert_eq!(last.step_name, "update_script");
    assert!(last.detail.contains("exited with 3"), "{}", last.detail);
    assert_eq!(bare_head_subject(&bare), "initial");
}

/// Test: an update script exceeding the timeout fails the run as a timeout.
#[tokio::test]
async fn test_slow_update_script_times_out() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, _) = seed_integral(tmp.path());
    let script = tmp.path().join("update.sh");
    std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let event = PushEvent::new("main", "fix bug");
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);
    let mut cfg = config(tmp.path(), script);
    cfg.timeout_secs = 1;

    let outcome = MirrorPipeline::run(&policy, &event, &spec, &cfg, Arc::new(MemoryPusher::new()))
        .await
        .expect("pipeline");

    let report = match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Skipped(d) => panic!("unexpected skip: {d:?}"),
    };

    assert!(!report.success);
    let last = report.steps.last().unwrap();
    assert_eq!(last.step_name, "update_script");
    assert!(
        last.detail.contains("timed out after 1 seconds"),
        "{}",
        last.detail
    );
    assert_eq!(bare_head_subject(&bare), "initial", "nothing recorded");
}

/// Test: rerunning with identical inputs resets to the same commit.
#[tokio::test]
async fn test_rerun_resets_to_same_parent_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let (bare, seeded_head) = seed_integral(tmp.path());
    let script = write_update_script(tmp.path());

    let policy = TriggerPolicy::new("main", DEFAULT_MARKER);
    let event = PushEvent::new("main", "fix bug");
    let spec = SyncSpec::new("main", bare.to_string_lossy(), DEFAULT_MARKER);

    // A failing pusher leaves the remote untouched, so a rerun observes
    // the same head.
    let first_cfg = config(&tmp.path().join("run1"), script.clone());
    let first = MirrorPipeline::run(
        &policy,
        &event,
        &spec,
        &first_cfg,
        Arc::new(MemoryPusher::failing()),
    )
    .await
    .expect("pipeline");
    let first_report = match first {
        SyncOutcome::Completed(r) => r,
        SyncOutcome::Skipped(d) => panic!("unexpected skip: {d:?}"),
    };

    let second_cfg = config(&tmp.path().join("run2"), script);
    let second = MirrorPipeline::run(
        &policy,
        &event,
        &spec,
        &second_cfg,
        Arc::new(MemoryPusher::failing()),
    )
    .await
    .expect("pipeline");
    let second_report = match second {
        SyncOutcome::Completed(r) => r,
        SyncOutcome::Skipped(d) => panic!("unexpected skip: {d:?}"),
    };

    assert_eq!(first_report.parent_commit_id, seeded_head);
    assert_eq!(second_report.parent_commit_id, seeded_head);
    assert_eq!(first_report.spec_digest, second_report.spec_digest);
}
