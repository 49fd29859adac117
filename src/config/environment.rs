// ABOUTME: Per-environment deployment target configuration.
// ABOUTME: Deploy/stop commands, probe, tracked branch, and extra variables.

use serde::Deserialize;
use std::collections::HashMap;

use super::{EnvValue, HealthcheckConfig};
use crate::types::EnvironmentName;

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub name: EnvironmentName,

    /// Branch whose head is rolled out automatically by `watch`.
    #[serde(default)]
    pub branch: Option<String>,

    /// Shell command that starts the unpacked release.
    pub deploy: String,

    /// Shell command that stops the environment (used when rolling back a
    /// first deployment).
    #[serde(default)]
    pub stop: Option<String>,

    #[serde(default)]
    pub healthcheck: Option<HealthcheckConfig>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}

impl EnvironmentConfig {
    pub fn template(name: EnvironmentName) -> Self {
        Self {
            name,
            branch: Some("main".to_string()),
            deploy: "./deploy.sh".to_string(),
            stop: None,
            healthcheck: None,
            env: HashMap::new(),
        }
    }
}
