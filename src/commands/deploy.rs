// ABOUTME: Deploy command implementation.
// ABOUTME: Takes the environment's deploy lock and runs one rollout attempt; Ctrl-C rolls back.

use super::context::Pipeline;
use super::{configured_environment, describe_attempt};
use shipyard::config::Config;
use shipyard::diagnostics::{Diagnostics, Warning};
use shipyard::error::Result;
use shipyard::output::Output;
use shipyard::rollout::{AttemptOutcome, DeployLock, cancel_pair};
use shipyard::source::SourceError;
use shipyard::types::Revision;

/// Build `revision` and roll it out to `environment`. Returns the exit code.
pub async fn deploy(
    config: &Config,
    environment: &str,
    revision: &str,
    force: bool,
    mut output: Output,
) -> Result<i32> {
    let environment = configured_environment(config, environment)?;
    let mut diag = Diagnostics::default();

    output.start_timer();
    let lock = DeployLock::acquire(&config.locks_dir(), &environment, force)?;
    let pipeline = Pipeline::open(config, &mut diag)?;

    // Resolution happens inside the attempt so an unknown reference is audited.
    let revision = Revision::new(revision)
        .map_err(|_| SourceError::UnknownReference(revision.to_string()))?;
    output.progress(&format!("Deploying {revision} to {environment}"));

    let (cancel, signal) = cancel_pair();
    let attempt = {
        let run = pipeline.controller.run(&environment, &revision, &signal);
        tokio::pin!(run);
        loop {
            tokio::select! {
                result = &mut run => break result?,
                _ = tokio::signal::ctrl_c() => {
                    output.progress("Interrupted, rolling back...");
                    cancel.cancel();
                }
            }
        }
    };

    diag.extend(pipeline.controller.notifier().flush().await);
    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(e.to_string()));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    match attempt.outcome {
        Some(AttemptOutcome::Succeeded) => {
            let artifact = attempt
                .to_artifact
                .as_ref()
                .map(|h| h.short().to_string())
                .unwrap_or_default();
            output.success(&format!(
                "Deployed {} to {environment} (artifact {artifact})",
                attempt.revision
            ));
        }
        _ => {
            output.error(&describe_attempt(&attempt));
            if let Some(log) = &attempt.build_log {
                output.log_block("Build output:", log);
            }
        }
    }
    output.record(&format!("attempt {}", attempt.id), &attempt);

    Ok(attempt.exit_code())
}
