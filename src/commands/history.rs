// ABOUTME: History command implementation.
// ABOUTME: Lists an environment's rollout attempts from the audit log, newest first.

use shipyard::audit::AuditLog;
use shipyard::config::Config;
use shipyard::error::Result;
use shipyard::output::Output;

use super::{configured_environment, describe_attempt};

pub async fn history(config: &Config, environment: &str, limit: usize, output: &Output) -> Result<()> {
    let name = configured_environment(config, environment)?;
    let audit = AuditLog::new(config.audit_path());

    let attempts = audit.history(&name, limit).await?;
    if attempts.is_empty() {
        output.progress(&format!("No rollout attempts recorded for {name}"));
        return Ok(());
    }
    for attempt in &attempts {
        output.record(&describe_attempt(attempt), attempt);
    }
    Ok(())
}
