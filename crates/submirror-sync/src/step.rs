//! Pipeline step identifiers and per-step results.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The fixed steps of a synchronization run, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    /// Clone the integral repository into the working directory.
    Clone,

    /// Record the clone's head hash and first message line.
    Capture,

    /// Configure the committer identity from the captured author.
    Identity,

    /// Push all subrepos out to their discrete repositories.
    SubrepoPush,

    /// Hard-reset the clone to the recorded parent commit.
    Reset,

    /// Run the external update script inside the clone.
    UpdateScript,

    /// Stage, commit, and push the follow-up commit.
    Record,
}

impl SyncStep {
    /// Stable step name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            SyncStep::Clone => "clone",
            SyncStep::Capture => "capture",
            SyncStep::Identity => "identity",
            SyncStep::SubrepoPush => "subrepo_push",
            SyncStep::Reset => "reset",
            SyncStep::UpdateScript => "update_script",
            SyncStep::Record => "record",
        }
    }
}

/// Result of one pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name.
    pub step_name: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the step succeeded.
    pub success: bool,

    /// Short human-readable detail, or the error message on failure.
    pub detail: String,
}

impl StepResult {
    /// Record a successful step timed from `started`.
    pub fn ok(step: SyncStep, started: Instant, detail: impl Into<String>) -> Self {
        Self {
            step_name: step.name().to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            success: true,
            detail: detail.into(),
        }
    }

    /// Record a failed step timed from `started`.
    pub fn failed(step: SyncStep, started: Instant, error: &dyn std::fmt::Display) -> Self {
        Self {
            step_name: step.name().to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            success: false,
            detail: error.to_string(),
        }
    }
}
