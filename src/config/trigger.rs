// ABOUTME: Trigger listener configuration.
// ABOUTME: Poll interval for branch heads and the optional webhook listener.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            webhook: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub listen: SocketAddr,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}
