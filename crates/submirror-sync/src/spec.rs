//! Sync run identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a mirror configuration.
///
/// Two runs with the same branch, integral URL, and marker share a spec
/// digest, which links reruns of the same configuration in the logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSpec {
    /// Branch whose pushes are mirrored.
    pub branch: String,

    /// URL of the integral repository to clone.
    pub integral_url: String,

    /// Loop-prevention marker substring.
    pub marker: String,
}

impl SyncSpec {
    pub fn new(
        branch: impl Into<String>,
        integral_url: impl Into<String>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            branch: branch.into(),
            integral_url: integral_url.into(),
            marker: marker.into(),
        }
    }

    /// Deterministic SHA-256 digest over the identity fields.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.branch.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.integral_url.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.marker.as_bytes());
        hex::encode(hasher.finalize())
    }
}
