// ABOUTME: Error types for rollout state transitions.
// ABOUTME: Build, deploy, health, store, and registry failures plus operator cancellation.

use crate::build::BuildError;
use crate::host::HostError;
use crate::registry::RegistryError;
use crate::store::StoreError;

/// Errors that end a rollout transition.
#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("deploy failed: {0}")]
    Deploy(#[from] HostError),

    /// A probe ran and reported the environment unhealthy.
    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("health check did not pass within {0} seconds")]
    HealthCheckTimeout(u64),

    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("environment registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("cancelled by operator")]
    Cancelled,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutErrorKind {
    Build,
    Deploy,
    HealthCheck,
    Store,
    Registry,
    Cancelled,
}

impl RolloutError {
    pub fn kind(&self) -> RolloutErrorKind {
        match self {
            RolloutError::Build(_) => RolloutErrorKind::Build,
            RolloutError::Deploy(_) => RolloutErrorKind::Deploy,
            RolloutError::HealthCheckFailed(_) | RolloutError::HealthCheckTimeout(_) => {
                RolloutErrorKind::HealthCheck
            }
            RolloutError::Store(_) => RolloutErrorKind::Store,
            RolloutError::Registry(_) => RolloutErrorKind::Registry,
            RolloutError::Cancelled => RolloutErrorKind::Cancelled,
        }
    }
}
