//! Submirror Sync - the mirror pipeline
//!
//! Orchestrates one synchronization run:
//! - Guards on the push event (marker and branch)
//! - Clones the integral repository and captures its head
//! - Pushes all subrepos out to their discrete repositories
//! - Resets, runs the update script, and records a follow-up commit

pub mod fakes;
pub mod pipeline;
pub mod spec;
pub mod step;
pub mod subrepo;

// Re-export key types
pub use pipeline::{sync_commit_message, MirrorPipeline, SyncConfig, SyncOutcome, SyncReport};
pub use spec::SyncSpec;
pub use step::{StepResult, SyncStep};
pub use subrepo::{GitSubrepoCli, SubrepoPusher};
