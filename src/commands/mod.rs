// ABOUTME: Command module aggregator for the shipyard CLI.
// ABOUTME: Re-exports one handler per subcommand.

mod artifacts;
mod context;
mod deploy;
mod gc;
mod history;
mod status;
mod watch;

pub use artifacts::artifacts;
pub use deploy::deploy;
pub use gc::gc;
pub use history::history;
pub use status::status;
pub use watch::watch;

use shipyard::error::{Error, Result};
use shipyard::rollout::RolloutAttempt;
use shipyard::types::EnvironmentName;

/// Parse an environment argument and check it is configured.
fn configured_environment(config: &shipyard::config::Config, name: &str) -> Result<EnvironmentName> {
    let name = EnvironmentName::new(name).map_err(|_| Error::UnknownEnvironment(name.to_string()))?;
    config.environment(&name)?;
    Ok(name)
}

/// One-line human summary of a finished attempt.
fn describe_attempt(attempt: &RolloutAttempt) -> String {
    let outcome = attempt
        .outcome
        .map(|o| o.to_string())
        .unwrap_or_else(|| attempt.state.to_string());
    let target = attempt
        .to_artifact
        .as_ref()
        .map(|h| h.short().to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{} {} {} {} -> {} [{}]",
        attempt.started_at.format("%Y-%m-%d %H:%M:%S"),
        attempt.id.short(),
        attempt.environment,
        attempt.revision,
        target,
        outcome
    );
    if let Some(reason) = &attempt.reason {
        line.push_str(": ");
        line.push_str(reason);
    }
    line
}
