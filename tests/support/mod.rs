// ABOUTME: Test support utilities.
// ABOUTME: In-process fakes for the source repository and execution host, plus controller wiring.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use shipyard::audit::AuditLog;
use shipyard::build::ArtifactBuilder;
use shipyard::config::Recipe;
use shipyard::host::{ExecutionHost, HealthCheckResult, HostError};
use shipyard::notify::{AlertSink, Event, EventKind, Notifier, NotifyError};
use shipyard::registry::Registry;
use shipyard::rollout::{Controller, HealthPolicy};
use shipyard::source::{SourceError, SourceRepository};
use shipyard::store::{Artifact, MemoryArtifactStore};
use shipyard::types::{EnvironmentName, Revision};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::Semaphore;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("shipyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn env(name: &str) -> EnvironmentName {
    EnvironmentName::new(name).unwrap()
}

pub fn rev(value: &str) -> Revision {
    Revision::new(value).unwrap()
}

/// Source repository backed by in-memory trees, one per revision.
#[derive(Default)]
pub struct DirSource {
    trees: Mutex<HashMap<Revision, Vec<(String, String)>>>,
    heads: Mutex<HashMap<String, Revision>>,
}

impl DirSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a revision whose tree holds a single `app.txt`.
    pub fn commit(&self, revision: &str) -> Revision {
        self.commit_files(revision, [("app.txt", format!("built from {revision}\n"))])
    }

    pub fn commit_files<I, P, C>(&self, revision: &str, files: I) -> Revision
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let revision = rev(revision);
        let files = files
            .into_iter()
            .map(|(path, contents)| (path.into(), contents.into()))
            .collect();
        self.trees.lock().insert(revision.clone(), files);
        revision
    }

    pub fn set_head(&self, branch: &str, revision: &Revision) {
        self.heads.lock().insert(branch.to_string(), revision.clone());
    }
}

#[async_trait]
impl SourceRepository for DirSource {
    async fn resolve(&self, reference: &str) -> Result<Revision, SourceError> {
        if let Some(head) = self.heads.lock().get(reference) {
            return Ok(head.clone());
        }
        let revision = Revision::new(reference).map_err(|e| SourceError::InvalidRevision(e.to_string()))?;
        if self.trees.lock().contains_key(&revision) {
            Ok(revision)
        } else {
            Err(SourceError::UnknownReference(reference.to_string()))
        }
    }

    async fn snapshot(&self, revision: &Revision, dest: &Path) -> Result<(), SourceError> {
        let files = self
            .trees
            .lock()
            .get(revision)
            .cloned()
            .ok_or_else(|| SourceError::UnknownReference(revision.to_string()))?;
        for (path, contents) in files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, contents)?;
        }
        Ok(())
    }
}

/// What the scripted host was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Run(EnvironmentName, Revision),
    Stop(EnvironmentName),
}

/// Execution host whose behaviour is keyed by revision.
///
/// The revision currently running in each environment decides whether its
/// health probes pass.
#[derive(Default)]
pub struct ScriptedHost {
    calls: Mutex<Vec<HostCall>>,
    running: Mutex<HashMap<EnvironmentName, Revision>>,
    unhealthy: Mutex<HashSet<Revision>>,
    failing_runs: Mutex<HashSet<Revision>>,
    failing_stop: Mutex<bool>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A host whose `run` waits for a permit on `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::default()
        })
    }

    pub fn mark_unhealthy(&self, revision: &Revision) {
        self.unhealthy.lock().insert(revision.clone());
    }

    pub fn fail_runs_of(&self, revision: &Revision) {
        self.failing_runs.lock().insert(revision.clone());
    }

    pub fn fail_stops(&self) {
        *self.failing_stop.lock() = true;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn running(&self, environment: &EnvironmentName) -> Option<Revision> {
        self.running.lock().get(environment).cloned()
    }
}

fn refused(command: &str) -> HostError {
    HostError::CommandFailed {
        command: command.to_string(),
        exit_code: Some(1),
        stderr: "refused by test host".to_string(),
    }
}

#[async_trait]
impl ExecutionHost for ScriptedHost {
    async fn run(
        &self,
        environment: &EnvironmentName,
        artifact: &Artifact,
        _bundle: &Bytes,
    ) -> Result<(), HostError> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }
        self.calls
            .lock()
            .push(HostCall::Run(environment.clone(), artifact.revision.clone()));
        if self.failing_runs.lock().contains(&artifact.revision) {
            return Err(refused("run"));
        }
        self.running
            .lock()
            .insert(environment.clone(), artifact.revision.clone());
        Ok(())
    }

    async fn health_check(&self, environment: &EnvironmentName) -> Result<HealthCheckResult, HostError> {
        let running = self.running.lock().get(environment).cloned();
        match running {
            Some(revision) if self.unhealthy.lock().contains(&revision) => {
                Ok(HealthCheckResult::failed(format!("{revision} returned 503")))
            }
            Some(revision) => Ok(HealthCheckResult::passed(format!("{revision} ok"))),
            None => Ok(HealthCheckResult::failed("nothing running")),
        }
    }

    async fn stop(&self, environment: &EnvironmentName) -> Result<(), HostError> {
        self.calls.lock().push(HostCall::Stop(environment.clone()));
        if *self.failing_stop.lock() {
            return Err(refused("stop"));
        }
        self.running.lock().remove(environment);
        Ok(())
    }
}

/// Alert sink that remembers every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, event: &Event) -> Result<(), NotifyError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// A policy that settles in milliseconds.
pub fn fast_policy() -> HealthPolicy {
    HealthPolicy {
        required_passes: 2,
        interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        probe_timeout: Duration::from_millis(200),
        deadline: Duration::from_secs(2),
        start_period: Duration::ZERO,
    }
}

/// A controller wired to in-memory collaborators.
pub struct Harness {
    pub source: Arc<DirSource>,
    pub host: Arc<ScriptedHost>,
    pub store: Arc<MemoryArtifactStore>,
    pub registry: Arc<Registry>,
    pub sink: Arc<RecordingSink>,
    pub controller: Arc<Controller>,
    recipe: Recipe,
    _audit_dir: tempfile::TempDir,
}

pub struct HarnessBuilder {
    host: Arc<ScriptedHost>,
    recipe: Recipe,
    policies: Vec<(EnvironmentName, HealthPolicy)>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            host: ScriptedHost::new(),
            recipe: Recipe::default(),
            policies: Vec::new(),
        }
    }

    /// Every environment in `envs` gets the fast health policy.
    pub fn with_envs(envs: &[&str]) -> Self {
        envs.iter()
            .fold(Self::builder(), |builder, name| builder.policy(name, fast_policy()))
            .build()
    }

    pub fn audit(&self) -> &AuditLog {
        self.controller.audit()
    }

    /// Swap the controller for one that verifies `environment` with `policy`,
    /// keeping the store, registry, host, and audit log.
    pub fn with_policy(mut self, environment: &str, policy: HealthPolicy) -> Self {
        let controller = Controller::new(
            ArtifactBuilder::new(self.source.clone()),
            self.store.clone(),
            self.registry.clone(),
            self.host.clone(),
            self.controller.audit().clone(),
            Notifier::spawn(vec![self.sink.clone() as Arc<dyn AlertSink>]),
            self.recipe.clone(),
        )
        .with_health_policy(env(environment), policy);
        self.controller = Arc::new(controller);
        self
    }
}

impl HarnessBuilder {
    pub fn host(mut self, host: Arc<ScriptedHost>) -> Self {
        self.host = host;
        self
    }

    pub fn recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = recipe;
        self
    }

    pub fn policy(mut self, environment: &str, policy: HealthPolicy) -> Self {
        self.policies.push((env(environment), policy));
        self
    }

    pub fn build(self) -> Harness {
        init_tracing();
        let source = DirSource::new();
        let store = Arc::new(MemoryArtifactStore::new());
        let registry = Arc::new(Registry::in_memory());
        let sink = Arc::new(RecordingSink::default());
        let audit_dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(audit_dir.path().join("audit.jsonl")));

        let controller = self.policies.into_iter().fold(
            Controller::new(
                ArtifactBuilder::new(source.clone()),
                store.clone(),
                registry.clone(),
                self.host.clone(),
                audit,
                Notifier::spawn(vec![sink.clone() as Arc<dyn AlertSink>]),
                self.recipe.clone(),
            ),
            |controller, (environment, policy)| controller.with_health_policy(environment, policy),
        );

        Harness {
            source,
            host: self.host,
            store,
            registry,
            sink,
            controller: Arc::new(controller),
            recipe: self.recipe,
            _audit_dir: audit_dir,
        }
    }
}
