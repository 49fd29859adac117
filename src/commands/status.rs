// ABOUTME: Status command implementation.
// ABOUTME: Shows the registry record for an environment and who holds its deploy lock.

use serde::Serialize;
use shipyard::config::Config;
use shipyard::error::Result;
use shipyard::output::Output;
use shipyard::registry::{Environment, Registry};
use shipyard::rollout::LockInfo;

use super::configured_environment;

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    environment: Environment,
    lock: Option<LockInfo>,
}

pub fn status(config: &Config, environment: &str, output: &Output) -> Result<()> {
    let name = configured_environment(config, environment)?;
    let registry = Registry::open(config.registry_path())?;

    let report = StatusReport {
        environment: registry
            .get(&name)
            .unwrap_or_else(|| Environment::new(name.clone())),
        lock: LockInfo::read(&config.locks_dir(), &name),
    };

    let env = &report.environment;
    let short = |hash: &Option<shipyard::types::ArtifactHash>| {
        hash.as_ref()
            .map(|h| h.short().to_string())
            .unwrap_or_else(|| "none".to_string())
    };
    let mut text = format!(
        "Environment: {}\nCurrent:     {}\nDesired:     {}\nHealth:      {}",
        env.name,
        short(&env.current_artifact),
        short(&env.desired_artifact),
        env.health
    );
    if let Some(at) = env.last_transition_at {
        text.push_str(&format!("\nChanged:     {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    match &report.lock {
        Some(lock) => text.push_str(&format!(
            "\nLock:        held by {} (pid {}) since {}",
            lock.holder, lock.pid, lock.started_at
        )),
        None => text.push_str("\nLock:        free"),
    }

    output.record(&text, &report);
    Ok(())
}
