// ABOUTME: Drives one rollout attempt through the state machine end to end.
// ABOUTME: Notifies on start and finish and appends every finished attempt to the audit log.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audit::{AuditError, AuditLog};
use crate::build::ArtifactBuilder;
use crate::config::{Config, Recipe};
use crate::host::ExecutionHost;
use crate::notify::{Event, Notifier};
use crate::registry::Registry;
use crate::store::ArtifactStore;
use crate::types::{EnvironmentName, Revision};

use super::attempt::RolloutAttempt;
use super::cancel::CancelSignal;
use super::error::RolloutError;
use super::health::HealthPolicy;
use super::rollout::Rollout;
use super::state::{Finished, Queued};

/// Owns the collaborators a rollout needs.
///
/// Callers serialise attempts per environment (the dispatcher, or the deploy
/// lock for one-off CLI deploys); the controller itself does not.
pub struct Controller {
    builder: ArtifactBuilder,
    store: Arc<dyn ArtifactStore>,
    registry: Arc<Registry>,
    host: Arc<dyn ExecutionHost>,
    audit: Arc<AuditLog>,
    notifier: Notifier,
    recipe: Recipe,
    policies: HashMap<EnvironmentName, HealthPolicy>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("builder", &self.builder)
            .field("policies", &self.policies)
            .finish()
    }
}

impl Controller {
    pub fn new(
        builder: ArtifactBuilder,
        store: Arc<dyn ArtifactStore>,
        registry: Arc<Registry>,
        host: Arc<dyn ExecutionHost>,
        audit: Arc<AuditLog>,
        notifier: Notifier,
        recipe: Recipe,
    ) -> Self {
        Self {
            builder,
            store,
            registry,
            host,
            audit,
            notifier,
            recipe,
            policies: HashMap::new(),
        }
    }

    /// Verify `environment` with `policy` after each deploy. Environments
    /// without a policy are not health checked.
    pub fn with_health_policy(mut self, environment: EnvironmentName, policy: HealthPolicy) -> Self {
        self.policies.insert(environment, policy);
        self
    }

    /// Health policies for every configured environment with a healthcheck.
    pub fn with_policies_from(mut self, config: &Config) -> Self {
        for env in config.environments.iter() {
            if let Some(healthcheck) = &env.healthcheck {
                self.policies
                    .insert(env.name.clone(), HealthPolicy::from(healthcheck));
            }
        }
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Run one attempt to completion.
    ///
    /// Rollout failures are part of the returned record. The only error is
    /// failing to append that record to the audit log.
    pub async fn run(
        &self,
        environment: &EnvironmentName,
        revision: &Revision,
        cancel: &CancelSignal,
    ) -> Result<RolloutAttempt, AuditError> {
        let current = self.registry.get(environment);
        let rollout = Rollout::new(
            environment.clone(),
            revision.clone(),
            current.as_ref().and_then(|env| env.current_artifact.clone()),
        )
        .with_prior_health(current.map(|env| env.health).unwrap_or_default());

        tracing::info!(
            %environment,
            %revision,
            attempt = %rollout.attempt().id.short(),
            "rollout started"
        );
        self.notifier.notify(Event::started(rollout.attempt()));

        let attempt = self.drive(rollout, cancel).await.into_attempt();

        self.audit.append(&attempt).await?;
        self.notifier.notify(Event::finished(&attempt));
        Ok(attempt)
    }

    async fn drive(&self, rollout: Rollout<Queued>, cancel: &CancelSignal) -> Rollout<Finished> {
        let store = self.store.as_ref();
        let host = self.host.as_ref();
        let registry = self.registry.as_ref();

        let built = match rollout.build(&self.builder, store, &self.recipe, cancel).await {
            Ok(built) => built,
            Err((queued, RolloutError::Cancelled)) => return queued.abandon(),
            Err((queued, e)) => return queued.fail(e),
        };

        let deployed = match built.deploy(registry, host, cancel).await {
            Ok(deployed) => deployed,
            Err((built, e)) => return built.rollback(registry, host, store, e).await,
        };

        let policy = self.policies.get(deployed.environment());
        let verified = match deployed.health_check(host, policy, cancel).await {
            Ok(verified) => verified,
            Err((deployed, e)) => return deployed.rollback(registry, host, store, e).await,
        };

        match verified.commit(store, registry).await {
            Ok(finished) => finished,
            Err((verified, e)) => verified.rollback(registry, host, store, e).await,
        }
    }
}
