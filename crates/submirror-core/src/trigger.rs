//! Push-event guard: decides whether a push should be mirrored.
//!
//! Every synchronization run ends with a follow-up commit whose message
//! embeds [`DEFAULT_MARKER`]. The push of that commit re-triggers the CI
//! job, so the guard must reject marked head commits before any other
//! check to break the mirroring loop.

use serde::{Deserialize, Serialize};

/// Marker substring embedded in every synchronization commit message.
///
/// Upstream `git subrepo pull:` / `git subrepo push:` messages contain it
/// as well, so pulls landed by the tool itself are also suppressed.
pub const DEFAULT_MARKER: &str = "git subrepo";

/// A push event as reported by the CI platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushEvent {
    /// Branch the push landed on.
    pub branch: String,

    /// Full message of the head commit of the push.
    pub head_message: String,
}

impl PushEvent {
    pub fn new(branch: impl Into<String>, head_message: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            head_message: head_message.into(),
        }
    }
}

/// Conditions under which a push event qualifies for mirroring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerPolicy {
    /// Branch that qualifies for mirroring.
    pub branch: String,

    /// Substring that marks a head commit as machine-generated.
    pub marker: String,
}

/// Outcome of evaluating a push event against a [`TriggerPolicy`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    /// The event qualifies; run the pipeline.
    Run,

    /// Head commit message contains the marker; skip to avoid a loop.
    SkipMarker,

    /// The push landed on a different branch.
    SkipBranch,
}

impl TriggerDecision {
    /// Whether the pipeline should execute for this decision.
    pub fn should_run(&self) -> bool {
        matches!(self, TriggerDecision::Run)
    }
}

impl TriggerPolicy {
    pub fn new(branch: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            marker: marker.into(),
        }
    }

    /// Evaluate a push event.
    ///
    /// The marker check comes first: a marked commit must never mirror,
    /// whatever branch it landed on. Substring match, case sensitive.
    pub fn decide(&self, event: &PushEvent) -> TriggerDecision {
        if event.head_message.contains(&self.marker) {
            return TriggerDecision::SkipMarker;
        }
        if event.branch != self.branch {
            return TriggerDecision::SkipBranch;
        }
        TriggerDecision::Run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TriggerPolicy {
        TriggerPolicy::new("master", DEFAULT_MARKER)
    }

    #[test]
    fn test_qualifying_push_runs() {
        let event = PushEvent::new("master", "fix bug");
        assert_eq!(policy().decide(&event), TriggerDecision::Run);
        assert!(policy().decide(&event).should_run());
    }

    #[test]
    fn test_marked_head_commit_skips() {
        let event = PushEvent::new("master", "git subrepo pull: synced");
        assert_eq!(policy().decide(&event), TriggerDecision::SkipMarker);
    }

    #[test]
    fn test_follow_up_commit_skips() {
        // The message format our own record step produces.
        let event = PushEvent::new("master", "git subrepo update commit for initial");
        assert_eq!(policy().decide(&event), TriggerDecision::SkipMarker);
    }

    #[test]
    fn test_marker_wins_over_branch_mismatch() {
        let event = PushEvent::new("feature/x", "git subrepo push: split");
        assert_eq!(policy().decide(&event), TriggerDecision::SkipMarker);
    }

    #[test]
    fn test_other_branch_skips() {
        let event = PushEvent::new("feature/x", "fix bug");
        assert_eq!(policy().decide(&event), TriggerDecision::SkipBranch);
    }

    #[test]
    fn test_empty_message_on_configured_branch_runs() {
        let event = PushEvent::new("master", "");
        assert_eq!(policy().decide(&event), TriggerDecision::Run);
    }

    #[test]
    fn test_marker_match_is_case_sensitive() {
        let event = PushEvent::new("master", "Git Subrepo pull: synced");
        assert_eq!(policy().decide(&event), TriggerDecision::Run);
    }

    #[test]
    fn test_serde_decision() {
        let json = serde_json::to_string(&TriggerDecision::SkipMarker).expect("serialize");
        assert_eq!(json, "\"skip_marker\"");
    }
}
