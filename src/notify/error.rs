// ABOUTME: Error types for alert sink delivery.
// ABOUTME: Never fatal; the notifier turns them into warnings.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid webhook URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("webhook responded with status {0}")]
    Status(u16),

    #[error("failed to run {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exited with {exit_code:?}: {stderr}")]
    CommandFailed {
        path: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },
}
