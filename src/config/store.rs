// ABOUTME: Artifact store retention settings.
// ABOUTME: Controls what garbage collection keeps beyond live references.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Artifacts younger than this are never collected.
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,

    /// Artifacts of the most recent N attempts per environment are kept as
    /// rollback targets.
    #[serde(default = "default_keep_last")]
    pub keep_last: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            keep_last: default_keep_last(),
        }
    }
}

fn default_retention() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_keep_last() -> usize {
    3
}
