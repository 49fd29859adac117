// ABOUTME: Error types for artifact builds.
// ABOUTME: A failed step carries its index, exit code, and the log so far.

use std::path::PathBuf;

use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A recipe step exited non-zero, could not be spawned, or timed out.
    #[error("build step {step} (`{name}`) failed{}", exit_code_suffix(.exit_code))]
    StepFailed {
        step: usize,
        name: String,
        exit_code: Option<i32>,
        log: String,
    },

    #[error("cannot resolve revision: {0}")]
    Resolve(#[source] SourceError),

    #[error("failed to snapshot source: {0}")]
    Source(#[from] SourceError),

    #[error("build output directory not found: {0}")]
    MissingOutput(PathBuf),

    #[error("build environment: {0}")]
    Environment(String),

    #[error("failed to bundle build output: {0}")]
    Bundle(String),

    #[error("build I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// The build log captured up to the failure, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            BuildError::StepFailed { log, .. } => Some(log),
            _ => None,
        }
    }
}

fn exit_code_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " without an exit code".to_string(),
    }
}
