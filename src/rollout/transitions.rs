// ABOUTME: State transition methods for rollout orchestration.
// ABOUTME: Each method consumes self and returns the next state, or itself plus the error.

use bytes::Bytes;

use crate::build::{ArtifactBuilder, BuildError};
use crate::config::Recipe;
use crate::host::ExecutionHost;
use crate::registry::{HealthStatus, Registry};
use crate::store::{Artifact, ArtifactStore, StoreError};
use crate::types::{ArtifactHash, EnvironmentName};

use super::Rollout;
use super::attempt::{AttemptOutcome, RolloutState};
use super::cancel::CancelSignal;
use super::error::{RolloutError, RolloutErrorKind};
use super::health::{self, HealthPolicy};
use super::state::{Built, Deployed, Finished, Queued, Verified};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Rollout<T>, (Rollout<S>, RolloutError)>;

// =============================================================================
// Queued -> Built
// =============================================================================

impl Rollout<Queued> {
    /// Resolve the requested reference, build it, and put the artifact in the store.
    ///
    /// Never touches the environment; a failure here leaves it exactly as it was.
    #[must_use = "rollout state must be used"]
    pub async fn build(
        mut self,
        builder: &ArtifactBuilder,
        store: &dyn ArtifactStore,
        recipe: &Recipe,
        cancel: &CancelSignal,
    ) -> TransitionResult<Built, Queued> {
        self.attempt.state = RolloutState::Building;
        let reference = self.attempt.revision.clone();

        // Dropping the build future kills the running step and removes the scratch dir.
        let outcome = {
            let build = async {
                let revision = builder.resolve(&reference).await?;
                let built = builder.build(&revision, recipe).await?;
                Ok::<_, BuildError>((revision, built))
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RolloutError::Cancelled),
                result = build => result.map_err(RolloutError::from),
            }
        };
        let (revision, built) = match outcome {
            Ok(done) => done,
            Err(e) => {
                if let RolloutError::Build(build) = &e {
                    self.attempt.build_log = build.log().map(str::to_string);
                }
                return Err((self, e));
            }
        };
        if revision != reference {
            tracing::debug!(%reference, %revision, "resolved revision");
            self.attempt.revision = revision.clone();
        }

        let hash = match store.put(built.bytes.clone()).await {
            Ok(hash) => hash,
            Err(e) => return Err((self, e.into())),
        };
        if let Err(e) = store.record(&built.artifact).await {
            return Err((self, e.into()));
        }

        tracing::info!(
            environment = %self.attempt.environment,
            %revision,
            artifact = %hash.short(),
            size = built.artifact.size,
            "artifact built"
        );
        self.attempt.to_artifact = Some(hash);
        Ok(self.transition(Built {
            artifact: built.artifact,
            bundle: built.bytes,
        }))
    }

    /// End the attempt without touching the environment.
    pub fn fail(mut self, error: RolloutError) -> Rollout<Finished> {
        tracing::warn!(environment = %self.attempt.environment, error = %error, "rollout failed before deploy");
        if self.attempt.state == RolloutState::Idle {
            self.attempt.state = RolloutState::Building;
        }
        self.finish(AttemptOutcome::Failed, Some(error.to_string()))
    }

    /// Cancelled before anything was deployed: nothing to undo.
    pub fn abandon(mut self) -> Rollout<Finished> {
        tracing::info!(environment = %self.attempt.environment, "rollout cancelled during build");
        self.attempt.state = RolloutState::RollingBack;
        self.finish(
            AttemptOutcome::RolledBack,
            Some(RolloutError::Cancelled.to_string()),
        )
    }
}

// =============================================================================
// Built -> Deployed
// =============================================================================

impl Rollout<Built> {
    /// Record the artifact as desired and have the host run it.
    #[must_use = "rollout state must be used"]
    pub async fn deploy(
        mut self,
        registry: &Registry,
        host: &dyn ExecutionHost,
        cancel: &CancelSignal,
    ) -> TransitionResult<Deployed, Built> {
        self.attempt.state = RolloutState::Deploying;
        let environment = self.attempt.environment.clone();
        let artifact = self.state.artifact.clone();
        let bundle = self.state.bundle.clone();

        if let Err(e) = registry.set_desired(&environment, &artifact.hash) {
            return Err((self, e.into()));
        }

        let ran = {
            let run = host.run(&environment, &artifact, &bundle);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RolloutError::Cancelled),
                result = run => result.map_err(RolloutError::from),
            }
        };
        if let Err(e) = ran {
            return Err((self, e));
        }

        tracing::info!(%environment, artifact = %artifact.hash.short(), "artifact running");
        Ok(self.transition(Deployed { artifact }))
    }

    pub async fn rollback(
        self,
        registry: &Registry,
        host: &dyn ExecutionHost,
        store: &dyn ArtifactStore,
        cause: RolloutError,
    ) -> Rollout<Finished> {
        self.unwind(registry, host, store, cause).await
    }
}

// =============================================================================
// Deployed -> Verified
// =============================================================================

impl Rollout<Deployed> {
    /// Probe the environment until the policy is satisfied.
    ///
    /// With no policy there is nothing to verify and the rollout moves on.
    #[must_use = "rollout state must be used"]
    pub async fn health_check(
        mut self,
        host: &dyn ExecutionHost,
        policy: Option<&HealthPolicy>,
        cancel: &CancelSignal,
    ) -> TransitionResult<Verified, Deployed> {
        self.attempt.state = RolloutState::HealthChecking;
        let environment = self.attempt.environment.clone();

        let Some(policy) = policy else {
            tracing::debug!(%environment, "no healthcheck configured, skipping verification");
            let artifact = self.state.artifact.clone();
            return Ok(self.transition(Verified { artifact }));
        };

        let mut results = Vec::new();
        let verdict = {
            let probe = health::verify(host, &environment, policy, &mut results);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RolloutError::Cancelled),
                result = probe => result,
            }
        };
        self.attempt.health_checks = results;

        match verdict {
            Ok(()) => {
                let artifact = self.state.artifact.clone();
                Ok(self.transition(Verified { artifact }))
            }
            Err(e) => Err((self, e)),
        }
    }

    pub async fn rollback(
        self,
        registry: &Registry,
        host: &dyn ExecutionHost,
        store: &dyn ArtifactStore,
        cause: RolloutError,
    ) -> Rollout<Finished> {
        // The rejected artifact is still running until unwind replaces it.
        if cause.kind() == RolloutErrorKind::HealthCheck {
            let environment = self.attempt.environment.clone();
            if let Err(e) = registry.record_health(&environment, HealthStatus::Unhealthy) {
                tracing::warn!(%environment, error = %e, "failed to record unhealthy environment");
            }
        }
        self.unwind(registry, host, store, cause).await
    }
}

// =============================================================================
// Verified -> Finished
// =============================================================================

impl Rollout<Verified> {
    /// Make the verified artifact the environment's current one.
    ///
    /// Refuses an artifact the store no longer holds.
    #[must_use = "rollout state must be used"]
    pub async fn commit(
        mut self,
        store: &dyn ArtifactStore,
        registry: &Registry,
    ) -> TransitionResult<Finished, Verified> {
        let environment = self.attempt.environment.clone();
        let hash = self.state.artifact.hash.clone();

        match store.contains(&hash).await {
            Ok(true) => {}
            Ok(false) => return Err((self, StoreError::NotFound(hash).into())),
            Err(e) => return Err((self, e.into())),
        }
        if let Err(e) = registry.commit(&environment, &hash, HealthStatus::Healthy) {
            return Err((self, e.into()));
        }

        tracing::info!(%environment, artifact = %hash.short(), "rollout succeeded");
        self.attempt.state = RolloutState::Succeeded;
        Ok(self.finish(AttemptOutcome::Succeeded, None))
    }

    pub async fn rollback(
        self,
        registry: &Registry,
        host: &dyn ExecutionHost,
        store: &dyn ArtifactStore,
        cause: RolloutError,
    ) -> Rollout<Finished> {
        self.unwind(registry, host, store, cause).await
    }
}

// =============================================================================
// Rollback
// =============================================================================

impl<S> Rollout<S> {
    /// Restore the environment to the artifact it ran before this attempt,
    /// or stop it when this was the first deployment.
    ///
    /// `current_artifact` is never touched here. If restoring fails the
    /// environment is marked degraded and the attempt counts as failed.
    async fn unwind(
        mut self,
        registry: &Registry,
        host: &dyn ExecutionHost,
        store: &dyn ArtifactStore,
        cause: RolloutError,
    ) -> Rollout<Finished> {
        self.attempt.state = RolloutState::RollingBack;
        let environment = self.attempt.environment.clone();
        let reason = cause.to_string();
        tracing::warn!(%environment, %reason, "rolling back");

        let restored = match self.attempt.from_artifact.clone() {
            Some(previous) => redeploy(store, host, &environment, &previous).await,
            None => host.stop(&environment).await.map_err(RolloutError::from),
        };

        match restored {
            Ok(()) => {
                let health = match self.prior_health {
                    HealthStatus::Degraded => HealthStatus::Unknown,
                    _ if self.attempt.from_artifact.is_none() => HealthStatus::Unknown,
                    other => other,
                };
                if let Err(e) = registry.settle(&environment, health) {
                    tracing::error!(%environment, error = %e, "failed to record rollback in registry");
                }
                self.finish(AttemptOutcome::RolledBack, Some(reason))
            }
            Err(e) => {
                tracing::error!(%environment, error = %e, "rollback failed, environment degraded");
                if let Err(e) = registry.settle(&environment, HealthStatus::Degraded) {
                    tracing::error!(%environment, error = %e, "failed to mark environment degraded");
                }
                self.finish(
                    AttemptOutcome::Failed,
                    Some(format!("{reason}; rollback failed: {e}")),
                )
            }
        }
    }
}

async fn redeploy(
    store: &dyn ArtifactStore,
    host: &dyn ExecutionHost,
    environment: &EnvironmentName,
    previous: &ArtifactHash,
) -> Result<(), RolloutError> {
    let bundle: Bytes = store.get(previous).await?;
    let artifact: Artifact = store
        .artifact(previous)
        .await?
        .ok_or_else(|| StoreError::NotFound(previous.clone()))?;

    tracing::info!(%environment, artifact = %previous.short(), "redeploying previous artifact");
    host.run(environment, &artifact, &bundle).await?;
    Ok(())
}
