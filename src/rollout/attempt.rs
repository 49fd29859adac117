// ABOUTME: Rollout attempt record as kept in the audit log.
// ABOUTME: Observable rollout states and terminal outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::host::HealthCheckResult;
use crate::types::{ArtifactHash, AttemptId, EnvironmentName, Revision};

/// Observable state of the rollout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutState {
    Idle,
    Building,
    Deploying,
    HealthChecking,
    Succeeded,
    RollingBack,
}

impl fmt::Display for RolloutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RolloutState::Idle => "idle",
            RolloutState::Building => "building",
            RolloutState::Deploying => "deploying",
            RolloutState::HealthChecking => "health_checking",
            RolloutState::Succeeded => "succeeded",
            RolloutState::RollingBack => "rolling_back",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    RolledBack,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// One execution of the rollout state machine for one environment.
///
/// `state` is the last state the attempt reached, so a failed attempt
/// still shows whether it got past the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutAttempt {
    pub id: AttemptId,
    pub environment: EnvironmentName,
    pub revision: Revision,
    pub from_artifact: Option<ArtifactHash>,
    pub to_artifact: Option<ArtifactHash>,
    pub state: RolloutState,
    pub outcome: Option<AttemptOutcome>,
    pub reason: Option<String>,
    /// Output of a build that failed, so the record shows why.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_log: Option<String>,
    #[serde(default)]
    pub health_checks: Vec<HealthCheckResult>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RolloutAttempt {
    pub fn new(
        environment: EnvironmentName,
        revision: Revision,
        from_artifact: Option<ArtifactHash>,
    ) -> Self {
        Self {
            id: AttemptId::generate(),
            environment,
            revision,
            from_artifact,
            to_artifact: None,
            state: RolloutState::Idle,
            outcome: None,
            reason: None,
            build_log: None,
            health_checks: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Whether the attempt ever touched the environment.
    pub fn reached_environment(&self) -> bool {
        !matches!(self.state, RolloutState::Idle | RolloutState::Building)
    }

    /// CLI exit code for this attempt: 0 success, 1 failed before the
    /// environment was touched, 2 failed or rolled back afterwards.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Some(AttemptOutcome::Succeeded) => 0,
            Some(AttemptOutcome::Failed) if !self.reached_environment() => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(state: RolloutState, outcome: AttemptOutcome) -> RolloutAttempt {
        let mut attempt = RolloutAttempt::new(
            EnvironmentName::new("prod").unwrap(),
            Revision::new("abc").unwrap(),
            None,
        );
        attempt.state = state;
        attempt.outcome = Some(outcome);
        attempt
    }

    #[test]
    fn exit_codes_follow_how_far_the_attempt_got() {
        assert_eq!(attempt(RolloutState::Succeeded, AttemptOutcome::Succeeded).exit_code(), 0);
        assert_eq!(attempt(RolloutState::Building, AttemptOutcome::Failed).exit_code(), 1);
        assert_eq!(attempt(RolloutState::RollingBack, AttemptOutcome::RolledBack).exit_code(), 2);
        assert_eq!(attempt(RolloutState::RollingBack, AttemptOutcome::Failed).exit_code(), 2);
    }

    #[test]
    fn serializes_states_in_snake_case() {
        let json = serde_json::to_string(&RolloutState::HealthChecking).unwrap();
        assert_eq!(json, "\"health_checking\"");
        let json = serde_json::to_string(&AttemptOutcome::RolledBack).unwrap();
        assert_eq!(json, "\"rolled_back\"");
    }
}
