// ABOUTME: Post-deploy health verification policy and probe loop.
// ABOUTME: Consecutive passes within a deadline; probe errors back off and retry.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::HealthcheckConfig;
use crate::host::{ExecutionHost, HealthCheckResult};
use crate::types::EnvironmentName;

use super::error::RolloutError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPolicy {
    pub required_passes: u32,
    pub interval: Duration,
    pub max_interval: Duration,
    pub probe_timeout: Duration,
    pub deadline: Duration,
    pub start_period: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        HealthPolicy::from(&HealthcheckConfig::new(""))
    }
}

impl From<&HealthcheckConfig> for HealthPolicy {
    fn from(config: &HealthcheckConfig) -> Self {
        Self {
            required_passes: config.required_passes.max(1),
            interval: config.interval,
            max_interval: config.max_interval.max(config.interval),
            probe_timeout: config.timeout,
            deadline: config.deadline,
            start_period: config.start_period,
        }
    }
}

/// Probe until `required_passes` consecutive passes, a failing probe, or the
/// deadline. Every probe, including transient errors, is appended to `results`.
///
/// A probe that runs and reports `passed = false` fails verification at once.
/// A probe that errors or times out resets the pass count and is retried
/// after a backoff that doubles up to `max_interval`.
pub(crate) async fn verify(
    host: &dyn ExecutionHost,
    environment: &EnvironmentName,
    policy: &HealthPolicy,
    results: &mut Vec<HealthCheckResult>,
) -> Result<(), RolloutError> {
    let deadline = Instant::now() + policy.deadline;
    let timed_out = || RolloutError::HealthCheckTimeout(policy.deadline.as_secs());

    if !policy.start_period.is_zero() {
        tokio::time::sleep_until(deadline.min(Instant::now() + policy.start_period)).await;
    }

    let mut passes = 0;
    let mut backoff = policy.interval;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out());
        }

        let probe = tokio::time::timeout(
            policy.probe_timeout.min(remaining),
            host.health_check(environment),
        )
        .await;

        let wait = match probe {
            Ok(Ok(result)) if result.passed => {
                tracing::debug!(%environment, detail = %result.detail, "health probe passed");
                results.push(result);
                passes += 1;
                if passes >= policy.required_passes {
                    return Ok(());
                }
                backoff = policy.interval;
                policy.interval
            }
            Ok(Ok(result)) => {
                tracing::warn!(%environment, detail = %result.detail, "health probe failed");
                let detail = result.detail.clone();
                results.push(result);
                return Err(RolloutError::HealthCheckFailed(detail));
            }
            Ok(Err(e)) => {
                tracing::debug!(%environment, error = %e, "health probe errored, retrying");
                results.push(HealthCheckResult::failed(format!("probe error: {e}")));
                passes = 0;
                next_backoff(&mut backoff, policy)
            }
            Err(_) => {
                tracing::debug!(%environment, "health probe timed out, retrying");
                results.push(HealthCheckResult::failed("probe timed out"));
                passes = 0;
                next_backoff(&mut backoff, policy)
            }
        };

        let wake = Instant::now() + wait;
        if wake >= deadline {
            tokio::time::sleep_until(deadline).await;
            return Err(timed_out());
        }
        tokio::time::sleep_until(wake).await;
    }
}

fn next_backoff(backoff: &mut Duration, policy: &HealthPolicy) -> Duration {
    let wait = *backoff;
    *backoff = (*backoff * 2).min(policy.max_interval);
    wait
}
