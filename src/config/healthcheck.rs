// ABOUTME: Post-deploy health check configuration.
// ABOUTME: Probe command plus the pass/backoff/deadline policy, with defaults.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    /// Shell command; exit 0 means the environment is serving correctly.
    pub cmd: String,

    /// Consecutive passing probes needed to declare success.
    #[serde(default = "default_required_passes")]
    pub required_passes: u32,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Upper bound for the backoff applied after probe errors.
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,

    /// Per-probe timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Overall budget for reaching `required_passes`.
    #[serde(default = "default_deadline", with = "humantime_serde")]
    pub deadline: Duration,

    #[serde(default, with = "humantime_serde")]
    pub start_period: Duration,
}

impl HealthcheckConfig {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            required_passes: default_required_passes(),
            interval: default_interval(),
            max_interval: default_max_interval(),
            timeout: default_timeout(),
            deadline: default_deadline(),
            start_period: Duration::ZERO,
        }
    }
}

fn default_required_passes() -> u32 {
    3
}

fn default_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_deadline() -> Duration {
    Duration::from_secs(30)
}
