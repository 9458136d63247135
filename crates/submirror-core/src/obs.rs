//! Structured observability hooks for the sync run lifecycle.
//!
//! Emission functions for the key lifecycle events: run started, run
//! skipped, step finished, run finished. All are emitted at `info!`
//! level and carry an `event = "..."` field for log aggregation.

use tracing::info;

/// RAII guard that enters a run-scoped tracing span.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("submirror.sync", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: sync run started for a branch.
pub fn emit_sync_started(run_id: &str, branch: &str, integral_url: &str) {
    info!(
        event = "sync.started",
        run_id = %run_id,
        branch = %branch,
        integral_url = %integral_url,
    );
}

/// Emit event: push event did not qualify, no steps executed.
pub fn emit_sync_skipped(branch: &str, reason: &str) {
    info!(event = "sync.skipped", branch = %branch, reason = %reason);
}

/// Emit event: a pipeline step completed.
pub fn emit_step_finished(run_id: &str, step: &str, duration_ms: u64, success: bool) {
    info!(
        event = "sync.step_finished",
        run_id = %run_id,
        step = %step,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: sync run finished.
pub fn emit_sync_finished(run_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "sync.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
    );
}
