// ABOUTME: Execution host collaborator: runs artifacts and probes their health.
// ABOUTME: The controller treats it as an opaque capability.

mod command;
mod error;

pub use command::CommandHost;
pub use error::{HostError, HostErrorKind};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Artifact;
use crate::types::EnvironmentName;

/// Outcome of a single post-deploy probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    pub detail: String,
}

impl HealthCheckResult {
    pub fn passed(detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Where artifacts actually run.
#[async_trait]
pub trait ExecutionHost: Send + Sync {
    /// Start `artifact` in the environment, replacing whatever runs there.
    /// Returns once the host reports the artifact running.
    async fn run(
        &self,
        environment: &EnvironmentName,
        artifact: &Artifact,
        bundle: &Bytes,
    ) -> Result<(), HostError>;

    /// Probe the environment once.
    async fn health_check(&self, environment: &EnvironmentName)
    -> Result<HealthCheckResult, HostError>;

    /// Stop the environment. Used when rolling back a first deployment.
    async fn stop(&self, _environment: &EnvironmentName) -> Result<(), HostError> {
        Ok(())
    }
}
