// ABOUTME: Deploy lock to prevent concurrent rollouts to the same environment.
// ABOUTME: Uses atomic file creation with lock info stored under the state directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::types::EnvironmentName;

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub environment: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(environment: &EnvironmentName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            environment: environment.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    pub fn lock_path(dir: &Path, environment: &EnvironmentName) -> PathBuf {
        dir.join(format!("{environment}.lock"))
    }

    /// Current holder of an environment's lock, if any.
    pub fn read(dir: &Path, environment: &EnvironmentName) -> Option<LockInfo> {
        let contents = fs::read(Self::lock_path(dir, environment)).ok()?;
        serde_json::from_slice(&contents).ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("deploy in progress by {} (pid {}) since {}", .0.holder, .0.pid, .0.started_at)]
    Held(LockInfo),

    #[error("lock acquired by another process during break")]
    Contended,

    #[error("lock file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A held deploy lock. Released explicitly, or on drop.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    environment: EnvironmentName,
    released: bool,
}

impl DeployLock {
    /// Acquire the deploy lock for `environment`.
    ///
    /// Auto-breaks stale locks (>1 hour) and unreadable lock files with a
    /// warning; `force` breaks any lock.
    pub fn acquire(
        dir: &Path,
        environment: &EnvironmentName,
        force: bool,
    ) -> Result<Self, LockError> {
        fs::create_dir_all(dir).map_err(|source| LockError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = LockInfo::lock_path(dir, environment);
        let info = LockInfo::new(environment);
        let contents = serde_json::to_vec(&info).map_err(|e| LockError::Io {
            path: path.clone(),
            source: e.into(),
        })?;

        match create_exclusive(&path, &contents) {
            Ok(()) => return Ok(Self::held(path, environment)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(LockError::Io { path, source }),
        }

        if let Some(existing) = Self::blocking_holder(&path, force) {
            return Err(LockError::Held(existing));
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        let _ = fs::remove_file(&path);

        match create_exclusive(&path, &contents) {
            Ok(()) => Ok(Self::held(path, environment)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LockError::Contended),
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    fn held(path: PathBuf, environment: &EnvironmentName) -> Self {
        Self {
            path,
            environment: environment.clone(),
            released: false,
        }
    }

    /// The holder that keeps us from breaking the lock, if any.
    fn blocking_holder(path: &Path, force: bool) -> Option<LockInfo> {
        let existing = match fs::read(path).map(|bytes| serde_json::from_slice::<LockInfo>(&bytes)) {
            Ok(Ok(existing)) => existing,
            Ok(Err(_)) => {
                tracing::warn!("Lock info corrupted, breaking lock");
                return None;
            }
            Err(_) => {
                tracing::warn!("Lock info unreadable, breaking lock");
                return None;
            }
        };

        if force {
            tracing::warn!(
                "Breaking lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            );
            None
        } else if existing.is_stale() {
            tracing::warn!(
                "Auto-breaking stale lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            );
            None
        } else {
            Some(existing)
        }
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn create_exclusive(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
