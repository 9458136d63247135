//! Submirror Core Library
//!
//! Domain types for the subrepo mirroring pipeline: push-event trigger
//! policy, the git command surface, SSH credential installation, and
//! observability helpers shared by the submirror binaries.

pub mod credentials;
pub mod error;
pub mod git;
pub mod obs;
pub mod telemetry;
pub mod trigger;

pub use credentials::{git_ssh_command, SshKey};
pub use error::{MirrorError, Result};
pub use git::{GitRepo, HeadMetadata};
pub use telemetry::init_tracing;
pub use trigger::{PushEvent, TriggerDecision, TriggerPolicy, DEFAULT_MARKER};
