// ABOUTME: Execution host error types with SNAFU pattern.
// ABOUTME: Separates spawn, unpack, and command failures for programmatic handling.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HostError {
    #[snafu(display("environment {environment} is not configured on this host"))]
    UnknownEnvironment { environment: String },

    #[snafu(display("failed to unpack release into {}: {source}", path.display()))]
    Unpack {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to spawn `{command}`: {source}"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("`{command}` exited with {}: {stderr}", describe_exit(*exit_code)))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    NotConfigured,
    Release,
    Command,
}

impl HostError {
    pub fn kind(&self) -> HostErrorKind {
        match self {
            HostError::UnknownEnvironment { .. } => HostErrorKind::NotConfigured,
            HostError::Unpack { .. } => HostErrorKind::Release,
            HostError::Spawn { .. } | HostError::CommandFailed { .. } => HostErrorKind::Command,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}
