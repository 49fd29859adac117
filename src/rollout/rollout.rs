// ABOUTME: Generic rollout struct parameterized by state marker.
// ABOUTME: Wraps the attempt record that is appended to the audit log when finished.

use chrono::Utc;

use crate::registry::HealthStatus;
use crate::types::{ArtifactHash, EnvironmentName, Revision};

use super::attempt::{AttemptOutcome, RolloutAttempt, RolloutState};
use super::state::{Finished, Queued};

/// A rollout in progress, parameterized by its current state.
///
/// Transitions consume the rollout and return the next state, or hand the
/// rollout back together with the error so the caller can still roll back.
#[derive(Debug)]
pub struct Rollout<S> {
    pub(crate) attempt: RolloutAttempt,
    pub(crate) prior_health: HealthStatus,
    pub(crate) state: S,
}

impl Rollout<Queued> {
    /// Start an attempt. `from_artifact` is the environment's current
    /// artifact, the rollback target.
    pub fn new(
        environment: EnvironmentName,
        revision: Revision,
        from_artifact: Option<ArtifactHash>,
    ) -> Self {
        Rollout {
            attempt: RolloutAttempt::new(environment, revision, from_artifact),
            prior_health: HealthStatus::Unknown,
            state: Queued,
        }
    }

    /// Remember the environment's health so a successful rollback restores it.
    pub fn with_prior_health(mut self, health: HealthStatus) -> Self {
        self.prior_health = health;
        self
    }
}

impl<S> Rollout<S> {
    pub fn environment(&self) -> &EnvironmentName {
        &self.attempt.environment
    }

    pub fn revision(&self) -> &Revision {
        &self.attempt.revision
    }

    pub fn attempt(&self) -> &RolloutAttempt {
        &self.attempt
    }

    /// Observable state machine position.
    pub fn state(&self) -> RolloutState {
        self.attempt.state
    }

    pub(crate) fn transition<T>(self, state: T) -> Rollout<T> {
        Rollout {
            attempt: self.attempt,
            prior_health: self.prior_health,
            state,
        }
    }

    pub(crate) fn finish(mut self, outcome: AttemptOutcome, reason: Option<String>) -> Rollout<Finished> {
        self.attempt.outcome = Some(outcome);
        self.attempt.reason = reason;
        self.attempt.ended_at = Some(Utc::now());
        self.transition(Finished)
    }
}

impl Rollout<Finished> {
    pub fn outcome(&self) -> AttemptOutcome {
        self.attempt.outcome.unwrap_or(AttemptOutcome::Failed)
    }

    pub fn into_attempt(self) -> RolloutAttempt {
        self.attempt
    }
}
