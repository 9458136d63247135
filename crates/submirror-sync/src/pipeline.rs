//! Mirror pipeline orchestration and run recording.
//!
//! One run is strictly sequential: guard, clone, capture, identity,
//! subrepo push, reset, update script, record. The first failing step
//! aborts the run; its error lands in the step's `detail` and the report
//! is marked failed. There is no retry, matching the CI job contract
//! that any non-zero exit fails the whole job.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use uuid::Uuid;

use crate::spec::SyncSpec;
use crate::step::{StepResult, SyncStep};
use crate::subrepo::SubrepoPusher;
use submirror_core::obs::{
    emit_step_finished, emit_sync_finished, emit_sync_skipped, emit_sync_started, RunSpan,
};
use submirror_core::{GitRepo, MirrorError, PushEvent, Result, TriggerDecision, TriggerPolicy};

/// Prefix of the follow-up commit message. It contains the trigger marker,
/// which is what breaks the mirroring loop on the next push.
pub const SYNC_COMMIT_PREFIX: &str = "git subrepo update commit for";

/// Message of the follow-up commit recorded after a synchronization.
pub fn sync_commit_message(integral_subject: &str) -> String {
    format!("{SYNC_COMMIT_PREFIX} {integral_subject}")
}

/// Working-directory and execution settings for one run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory the integral clone is created under.
    pub workdir: PathBuf,

    /// Update script executed inside the clone after the reset.
    pub update_script: PathBuf,

    /// Per-command timeout in seconds. 0 disables the timeout.
    pub timeout_secs: u64,

    /// Extra environment for git commands (e.g. `GIT_SSH_COMMAND`).
    pub git_env: Vec<(String, String)>,
}

/// Outcome of submitting a push event to the pipeline.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The event did not qualify; no step executed.
    Skipped(TriggerDecision),

    /// The pipeline ran; the report says whether it succeeded.
    Completed(SyncReport),
}

/// Record of a completed (or aborted) synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Run ID.
    pub run_id: String,

    /// Digest of the sync specification.
    pub spec_digest: String,

    /// Whether every step passed.
    pub success: bool,

    /// Results of the executed steps, in order.
    pub steps: Vec<StepResult>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Head hash of the integral clone, recorded at clone time.
    pub parent_commit_id: String,

    /// First message line of that head commit.
    pub integral_commit_message: String,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Number of steps that passed.
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.success).count()
    }

    /// Number of steps that failed.
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.success).count()
    }
}

/// Mirror pipeline orchestrator.
pub struct MirrorPipeline;

impl MirrorPipeline {
    /// Submit a push event: evaluate the guard and, if it qualifies, run
    /// the full synchronization sequence.
    pub async fn run(
        policy: &TriggerPolicy,
        event: &PushEvent,
        spec: &SyncSpec,
        config: &SyncConfig,
        pusher: Arc<dyn SubrepoPusher>,
    ) -> anyhow::Result<SyncOutcome> {
        let decision = policy.decide(event);
        if !decision.should_run() {
            let reason = match decision {
                TriggerDecision::SkipMarker => "head commit carries the sync marker",
                TriggerDecision::SkipBranch => "push landed on a different branch",
                TriggerDecision::Run => unreachable!(),
            };
            emit_sync_skipped(&event.branch, reason);
            return Ok(SyncOutcome::Skipped(decision));
        }

        let run_id = Uuid::new_v4().to_string();
        let _span = RunSpan::enter(&run_id);
        emit_sync_started(&run_id, &spec.branch, &spec.integral_url);

        let mut state = RunState::new(run_id, spec.digest());

        // clone
        let t = Instant::now();
        let clone_dest = config.workdir.join("integral");
        let repo = match clone_integral(spec, config, &clone_dest).await {
            Ok(repo) => {
                state.record(StepResult::ok(
                    SyncStep::Clone,
                    t,
                    format!("cloned into {}", clone_dest.display()),
                ));
                repo
            }
            Err(e) => return Ok(state.abort(SyncStep::Clone, t, &e)),
        };

        // capture: the hash recorded here is the reset point for the rest
        // of the run; the subrepo push rewrites history in the clone, so
        // it must not be re-read later.
        let t = Instant::now();
        let head = match repo.head_metadata().await {
            Ok(head) => {
                state.parent_commit_id = head.commit_id.clone();
                state.integral_commit_message = head.subject.clone();
                state.record(StepResult::ok(
                    SyncStep::Capture,
                    t,
                    format!("head {} \"{}\"", short(&head.commit_id), head.subject),
                ));
                head
            }
            Err(e) => return Ok(state.abort(SyncStep::Capture, t, &e)),
        };

        // identity
        let t = Instant::now();
        match repo
            .configure_identity(&head.author_name, &head.author_email)
            .await
        {
            Ok(()) => state.record(StepResult::ok(
                SyncStep::Identity,
                t,
                format!("{} <{}>", head.author_name, head.author_email),
            )),
            Err(e) => return Ok(state.abort(SyncStep::Identity, t, &e)),
        }

        // subrepo push
        let t = Instant::now();
        match pusher.push_all(repo.path()).await {
            Ok(()) => state.record(StepResult::ok(
                SyncStep::SubrepoPush,
                t,
                "pushed all subrepos",
            )),
            Err(e) => return Ok(state.abort(SyncStep::SubrepoPush, t, &e)),
        }

        // reset
        let t = Instant::now();
        match repo.reset_hard(&state.parent_commit_id).await {
            Ok(()) => {
                let detail = format!("reset to {}", short(&state.parent_commit_id));
                state.record(StepResult::ok(SyncStep::Reset, t, detail));
            }
            Err(e) => return Ok(state.abort(SyncStep::Reset, t, &e)),
        }

        // update script
        let t = Instant::now();
        match run_update_script(
            &config.update_script,
            repo.path(),
            &state.parent_commit_id,
            &state.integral_commit_message,
            config.timeout_secs,
        )
        .await
        {
            Ok(()) => state.record(StepResult::ok(
                SyncStep::UpdateScript,
                t,
                format!("ran {}", config.update_script.display()),
            )),
            Err(e) => return Ok(state.abort(SyncStep::UpdateScript, t, &e)),
        }

        // record
        let t = Instant::now();
        let message = sync_commit_message(&state.integral_commit_message);
        match record_follow_up(&repo, &message).await {
            Ok(()) => state.record(StepResult::ok(SyncStep::Record, t, message)),
            Err(e) => return Ok(state.abort(SyncStep::Record, t, &e)),
        }

        Ok(SyncOutcome::Completed(state.finish(true)))
    }
}

/// Mutable state threaded through one run.
struct RunState {
    run_id: String,
    spec_digest: String,
    started: Instant,
    steps: Vec<StepResult>,
    parent_commit_id: String,
    integral_commit_message: String,
}

impl RunState {
    fn new(run_id: String, spec_digest: String) -> Self {
        Self {
            run_id,
            spec_digest,
            started: Instant::now(),
            steps: Vec::new(),
            parent_commit_id: String::new(),
            integral_commit_message: String::new(),
        }
    }

    fn record(&mut self, result: StepResult) {
        emit_step_finished(
            &self.run_id,
            &result.step_name,
            result.duration_ms,
            result.success,
        );
        self.steps.push(result);
    }

    fn abort(
        mut self,
        step: SyncStep,
        started: Instant,
        error: &dyn std::fmt::Display,
    ) -> SyncOutcome {
        self.record(StepResult::failed(step, started, error));
        SyncOutcome::Completed(self.finish(false))
    }

    fn finish(self, success: bool) -> SyncReport {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        emit_sync_finished(&self.run_id, duration_ms, success);
        SyncReport {
            run_id: self.run_id,
            spec_digest: self.spec_digest,
            success,
            steps: self.steps,
            duration_ms,
            parent_commit_id: self.parent_commit_id,
            integral_commit_message: self.integral_commit_message,
            finished_at: Utc::now(),
        }
    }
}

async fn clone_integral(spec: &SyncSpec, config: &SyncConfig, dest: &Path) -> Result<GitRepo> {
    std::fs::create_dir_all(&config.workdir)?;
    GitRepo::clone_from(&spec.integral_url, dest, config.timeout_secs, &config.git_env).await
}

/// Execute the update script inside the clone with the recorded commit
/// exported in its environment.
async fn run_update_script(
    script: &Path,
    repo: &Path,
    parent_commit_id: &str,
    integral_commit_message: &str,
    timeout_secs: u64,
) -> Result<()> {
    // The script runs with the clone as cwd, so resolve its path first.
    let script = std::fs::canonicalize(script).map_err(|e| {
        MirrorError::Script(format!("update script {}: {e}", script.display()))
    })?;

    let child = Command::new("sh")
        .arg(&script)
        .current_dir(repo)
        .env("PARENT_COMMIT_ID", parent_commit_id)
        .env("INTEGRAL_COMMIT_MESSAGE", integral_commit_message)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| MirrorError::Script(format!("failed to run update script: {e}")))?;

    let output = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| MirrorError::Timeout {
                operation: "update script".to_string(),
                secs: timeout_secs,
            })??
    } else {
        child.wait_with_output().await?
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MirrorError::Script(format!(
            "update script exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    Ok(())
}

async fn record_follow_up(repo: &GitRepo, message: &str) -> Result<()> {
    repo.add_all().await?;
    repo.commit(message).await?;
    repo.push().await?;
    Ok(())
}

fn short(commit_id: &str) -> &str {
    &commit_id[..12.min(commit_id.len())]
}
