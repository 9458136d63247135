//! Domain-level error taxonomy for submirror.

/// Errors produced by the mirror pipeline and its git command surface.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("git error: {0}")]
    Git(String),

    #[error("subrepo error: {0}")]
    Subrepo(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("update script error: {0}")]
    Script(String),

    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for submirror domain operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
