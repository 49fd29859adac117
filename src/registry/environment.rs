// ABOUTME: Environment record and health status.
// ABOUTME: A named deployment target with one active artifact at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ArtifactHash, EnvironmentName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
    /// A rollback failed; the environment needs an operator.
    Degraded,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: EnvironmentName,
    pub current_artifact: Option<ArtifactHash>,
    pub desired_artifact: Option<ArtifactHash>,
    pub health: HealthStatus,
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl Environment {
    pub fn new(name: EnvironmentName) -> Self {
        Self {
            name,
            current_artifact: None,
            desired_artifact: None,
            health: HealthStatus::Unknown,
            last_transition_at: None,
        }
    }
}
