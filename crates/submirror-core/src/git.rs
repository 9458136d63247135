//! Typed wrappers over the git CLI used by the mirror pipeline.
//!
//! Every operation shells out to `git` with a per-command timeout and maps
//! a non-zero exit to [`MirrorError::Git`] carrying the captured stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{MirrorError, Result};

/// Default per-command timeout. 0 disables the timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Head commit metadata captured from a clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadMetadata {
    /// Full commit hash.
    pub commit_id: String,

    /// First line of the commit message.
    pub subject: String,

    /// Author name of the commit.
    pub author_name: String,

    /// Author email of the commit.
    pub author_email: String,
}

/// Handle for running git commands inside one repository.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
    timeout_secs: u64,
    env: Vec<(String, String)>,
}

impl GitRepo {
    /// Open an existing repository directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            env: Vec::new(),
        }
    }

    /// Clone `url` into `dest` and return a handle on the clone.
    ///
    /// `env` is applied to the clone and to every later command on the
    /// returned handle (`GIT_SSH_COMMAND` for authenticated remotes).
    pub async fn clone_from(
        url: &str,
        dest: &Path,
        timeout_secs: u64,
        env: &[(String, String)],
    ) -> Result<Self> {
        let dest_str = dest.to_string_lossy().to_string();
        run_git(None, env, timeout_secs, &["clone", url, &dest_str]).await?;
        Ok(Self {
            dir: dest.to_path_buf(),
            timeout_secs,
            env: env.to_vec(),
        })
    }

    /// Override the per-command timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Repository directory this handle operates on.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Capture hash, subject, and author of the latest commit.
    pub async fn head_metadata(&self) -> Result<HeadMetadata> {
        let out = self
            .run(&["log", "-1", "--pretty=format:%H%x00%s%x00%an%x00%ae"])
            .await?;
        let mut parts = out.split('\0');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(hash), Some(subject), Some(name), Some(email)) if !hash.is_empty() => {
                Ok(HeadMetadata {
                    commit_id: hash.to_string(),
                    subject: subject.to_string(),
                    author_name: name.to_string(),
                    author_email: email.to_string(),
                })
            }
            _ => Err(MirrorError::Git(format!(
                "unexpected git log output: {out:?}"
            ))),
        }
    }

    /// Full hash of the current HEAD.
    pub async fn head_commit_id(&self) -> Result<String> {
        let sha = self.run(&["rev-parse", "HEAD"]).await?;
        if sha.is_empty() {
            return Err(MirrorError::Git(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    /// Set the committer identity used by later `commit` calls.
    pub async fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.run(&["config", "user.name", name]).await?;
        self.run(&["config", "user.email", email]).await?;
        Ok(())
    }

    /// Hard-reset the work tree to exactly `commit_id`.
    pub async fn reset_hard(&self, commit_id: &str) -> Result<()> {
        self.run(&["reset", "--hard", commit_id]).await?;
        Ok(())
    }

    /// Stage every change in the work tree.
    pub async fn add_all(&self) -> Result<()> {
        self.run(&["add", "-A"]).await?;
        Ok(())
    }

    /// Commit staged changes. Fails if there is nothing to commit.
    pub async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await?;
        Ok(())
    }

    /// Push the current branch to its upstream.
    pub async fn push(&self) -> Result<()> {
        self.run(&["push"]).await?;
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        run_git(Some(&self.dir), &self.env, self.timeout_secs, args).await
    }
}

/// Spawn `git` with the given args, wait under the timeout, and return
/// trimmed stdout.
async fn run_git(
    dir: Option<&Path>,
    env: &[(String, String)],
    timeout_secs: u64,
    args: &[&str],
) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let child = cmd
        .spawn()
        .map_err(|e| MirrorError::Git(format!("failed to run git: {e}")))?;

    let operation = format!("git {}", args.first().copied().unwrap_or_default());
    let output = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| MirrorError::Timeout {
                operation: operation.clone(),
                secs: timeout_secs,
            })??
    } else {
        child.wait_with_output().await?
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MirrorError::Git(format!(
            "{operation} failed: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
