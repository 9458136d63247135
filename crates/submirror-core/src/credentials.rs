//! SSH credential installation for authenticated mirror pushes.
//!
//! The CI platform supplies the private key through its secret store as an
//! environment variable. The key is written to disk with the permissions
//! OpenSSH insists on, and later git commands pick it up through
//! `GIT_SSH_COMMAND`.

use std::path::{Path, PathBuf};

use crate::error::{MirrorError, Result};

/// Filename the key is installed under.
const KEY_FILENAME: &str = "id_mirror";

/// A private key held in memory until installed.
pub struct SshKey {
    material: String,
}

impl SshKey {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
        }
    }

    /// Read key material from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        let material = std::env::var(var).map_err(|_| {
            MirrorError::Credentials(format!("environment variable {var} is not set"))
        })?;
        if material.trim().is_empty() {
            return Err(MirrorError::Credentials(format!(
                "environment variable {var} is empty"
            )));
        }
        Ok(Self { material })
    }

    /// Write the key under `dir` and return its path.
    ///
    /// The directory is created with mode 0700 and the key file with 0600;
    /// OpenSSH rejects keys readable by group or others. A trailing newline
    /// is appended if the secret store stripped it.
    pub fn install(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let key_path = dir.join(KEY_FILENAME);

        let mut material = self.material.clone();
        if !material.ends_with('\n') {
            material.push('\n');
        }
        std::fs::write(&key_path, material)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
            std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(key_path)
    }
}

/// `GIT_SSH_COMMAND` value selecting the installed key.
///
/// Host key checking is disabled: the job runs on a throwaway CI runner
/// with no seeded known_hosts.
pub fn git_ssh_command(key_path: &Path) -> String {
    format!(
        "ssh -i {} -o StrictHostKeyChecking=no -o IdentitiesOnly=yes",
        key_path.display()
    )
}
