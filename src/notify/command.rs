// ABOUTME: Alert sink that runs an executable per event.
// ABOUTME: Event fields are passed as SHIPYARD_* environment variables, the JSON event on stdin.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{AlertSink, Event, NotifyError};

#[derive(Debug, Clone)]
pub struct CommandSink {
    path: PathBuf,
}

impl CommandSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl AlertSink for CommandSink {
    fn name(&self) -> &str {
        "command"
    }

    async fn deliver(&self, event: &Event) -> Result<(), NotifyError> {
        let spawn_error = |source| NotifyError::Spawn {
            path: self.path.clone(),
            source,
        };

        tracing::debug!("Running notification command: {}", self.path.display());
        let mut child = Command::new(&self.path)
            .envs(event.to_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(event).unwrap_or_default();
            // A command that ignores stdin may close it early.
            let _ = stdin.write_all(&payload).await;
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;
        if output.status.success() {
            return Ok(());
        }
        Err(NotifyError::CommandFailed {
            path: self.path.clone(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
