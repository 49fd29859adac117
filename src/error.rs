// ABOUTME: Application-wide error types for shipyard.
// ABOUTME: Uses thiserror for ergonomic error handling and maps errors to exit codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::audit::AuditError;
use crate::host::HostError;
use crate::notify::NotifyError;
use crate::registry::RegistryError;
use crate::rollout::LockError;
use crate::source::SourceError;
use crate::store::StoreError;
use crate::trigger::TriggerError;

/// Exit code for an environment whose deploy lock is held elsewhere.
pub const EXIT_BUSY: i32 = 3;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("environment is busy: {0}")]
    Lock(#[from] LockError),

    #[error("source repository error: {0}")]
    Source(#[from] SourceError),

    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("environment registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("execution host error: {0}")]
    Host(#[from] HostError),

    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("notification setup error: {0}")]
    Notify(#[from] NotifyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code when this error ends a command.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Lock(LockError::Held(_) | LockError::Contended) => EXIT_BUSY,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
