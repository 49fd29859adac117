// ABOUTME: Git-backed source repository using the git CLI.
// ABOUTME: Snapshots via `git archive`, unpacked in-process with the tar crate.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{SourceError, SourceRepository};
use crate::types::Revision;

#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<Vec<u8>, SourceError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl SourceRepository for GitRepository {
    async fn resolve(&self, reference: &str) -> Result<Revision, SourceError> {
        if reference.starts_with('-') {
            return Err(SourceError::UnknownReference(reference.to_string()));
        }
        let spec = format!("{}^{{commit}}", reference);
        let stdout = match self.git(&["rev-parse", "--verify", "--quiet", &spec]).await {
            Ok(stdout) => stdout,
            Err(SourceError::CommandFailed { .. }) => {
                return Err(SourceError::UnknownReference(reference.to_string()));
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&stdout);
        Revision::new(text.trim()).map_err(|e| SourceError::InvalidRevision(e.to_string()))
    }

    async fn snapshot(&self, revision: &Revision, dest: &Path) -> Result<(), SourceError> {
        let archive = self
            .git(&["archive", "--format=tar", revision.as_str()])
            .await
            .map_err(|e| match e {
                SourceError::CommandFailed { .. } => {
                    SourceError::UnknownReference(revision.to_string())
                }
                other => other,
            })?;

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || {
            tar::Archive::new(archive.as_slice())
                .unpack(&dest)
                .map_err(|e| SourceError::Unpack(e.to_string()))
        })
        .await
        .map_err(|e| SourceError::Unpack(e.to_string()))?
    }
}
