//! In-memory fakes for pipeline seams (testing only)
//!
//! Provides `MemoryPusher`, a `SubrepoPusher` that records its calls
//! instead of invoking the `git subrepo` extension.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::subrepo::SubrepoPusher;
use submirror_core::{MirrorError, Result};

/// Recording pusher: remembers every repo it was asked to push and can be
/// configured to fail.
#[derive(Debug, Default)]
pub struct MemoryPusher {
    calls: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl MemoryPusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pusher whose `push_all` always fails.
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Repos `push_all` was invoked on, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubrepoPusher for MemoryPusher {
    async fn push_all(&self, repo: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(repo.to_path_buf());
        if self.fail {
            return Err(MirrorError::Subrepo(
                "memory pusher configured to fail".to_string(),
            ));
        }
        Ok(())
    }
}
