//! Propagation seam: pushing subrepos out of the integral clone.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use submirror_core::{MirrorError, Result};

/// Pushes every subrepo of a repository to its discrete remote.
#[async_trait]
pub trait SubrepoPusher: Send + Sync {
    async fn push_all(&self, repo: &Path) -> Result<()>;
}

/// Production pusher shelling out to the `git subrepo` extension.
pub struct GitSubrepoCli {
    timeout_secs: u64,
}

impl GitSubrepoCli {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl SubrepoPusher for GitSubrepoCli {
    async fn push_all(&self, repo: &Path) -> Result<()> {
        let child = Command::new("git")
            .args(["subrepo", "push", "--all"])
            .current_dir(repo)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MirrorError::Subrepo(format!("failed to run git subrepo: {e}")))?;

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| MirrorError::Timeout {
                operation: "git subrepo push --all".to_string(),
                secs: self.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MirrorError::Subrepo(format!(
                "git subrepo push --all failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}
