// ABOUTME: Alert sink configuration for pipeline notifications.
// ABOUTME: Tagged by `type`: log, webhook, or command.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Log,
    Webhook { url: String },
    Command { path: PathBuf },
}
