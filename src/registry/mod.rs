// ABOUTME: Environment registry: the only mutable state with external visibility.
// ABOUTME: Persists environment records as JSON; mutators are crate-private.

mod environment;
mod error;

pub use environment::{Environment, HealthStatus};
pub use error::RegistryError;

use chrono::Utc;
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::types::{ArtifactHash, EnvironmentName};

/// Tracks every deployment target and the artifact it runs.
///
/// Readers get snapshots. Writes happen only through the rollout
/// controller, and each write is persisted before the lock is released.
#[derive(Debug)]
pub struct Registry {
    path: Option<PathBuf>,
    environments: RwLock<BTreeMap<EnvironmentName, Environment>>,
}

/// Outcome of reconciling the registry with configured environments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records created for newly configured environments.
    pub created: Vec<EnvironmentName>,
    /// Records with no configured counterpart (kept, not deleted).
    pub unknown: Vec<EnvironmentName>,
}

impl Registry {
    /// A registry that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            environments: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open (or start) a registry persisted at `path`.
    ///
    /// Several processes may share the file: every mutation re-reads it under
    /// an exclusive lock, and reads pick up what other processes committed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let environments = load(&path)?;
        Ok(Self {
            path: Some(path),
            environments: RwLock::new(environments),
        })
    }

    /// Reload the shared file so readers see other processes' commits.
    fn refresh(&self) {
        let Some(path) = &self.path else {
            return;
        };
        match load(path) {
            Ok(environments) => *self.environments.write() = environments,
            Err(e) => tracing::warn!("using cached registry: {}", e),
        }
    }

    pub fn get(&self, name: &EnvironmentName) -> Option<Environment> {
        self.refresh();
        self.environments.read().get(name).cloned()
    }

    pub fn list(&self) -> Vec<Environment> {
        self.refresh();
        self.environments.read().values().cloned().collect()
    }

    /// Union of every environment's current and desired artifacts.
    pub fn referenced_artifacts(&self) -> HashSet<ArtifactHash> {
        self.refresh();
        self.environments
            .read()
            .values()
            .flat_map(|env| {
                env.current_artifact
                    .iter()
                    .chain(env.desired_artifact.iter())
                    .cloned()
            })
            .collect()
    }

    /// Ensure a record exists for every configured environment. Idempotent.
    pub fn reconcile(&self, configured: &[EnvironmentName]) -> Result<ReconcileReport, RegistryError> {
        let _guard = self.lock_file()?;
        let mut environments = self.environments.write();
        if let Some(path) = &self.path {
            *environments = load(path)?;
        }
        let mut report = ReconcileReport::default();

        for name in configured {
            if !environments.contains_key(name) {
                environments.insert(name.clone(), Environment::new(name.clone()));
                report.created.push(name.clone());
            }
        }

        report.unknown = environments
            .keys()
            .filter(|name| !configured.contains(name))
            .cloned()
            .collect();

        if !report.created.is_empty() {
            self.persist(&environments)?;
        }
        Ok(report)
    }

    pub(crate) fn set_desired(
        &self,
        name: &EnvironmentName,
        artifact: &ArtifactHash,
    ) -> Result<Environment, RegistryError> {
        self.update(name, |env| {
            env.desired_artifact = Some(artifact.clone());
        })
    }

    /// Make `artifact` the environment's current artifact and clear the
    /// desired one. The caller has already confirmed the store holds it.
    pub(crate) fn commit(
        &self,
        name: &EnvironmentName,
        artifact: &ArtifactHash,
        health: HealthStatus,
    ) -> Result<Environment, RegistryError> {
        self.update(name, |env| {
            env.current_artifact = Some(artifact.clone());
            env.desired_artifact = None;
            env.health = health;
            env.last_transition_at = Some(Utc::now());
        })
    }

    /// Record the end of a transition that left `current_artifact` as is.
    pub(crate) fn settle(
        &self,
        name: &EnvironmentName,
        health: HealthStatus,
    ) -> Result<Environment, RegistryError> {
        self.update(name, |env| {
            env.desired_artifact = None;
            env.health = health;
            env.last_transition_at = Some(Utc::now());
        })
    }

    /// Record an observed health status without ending a transition.
    pub(crate) fn record_health(
        &self,
        name: &EnvironmentName,
        health: HealthStatus,
    ) -> Result<Environment, RegistryError> {
        self.update(name, |env| env.health = health)
    }

    fn update(
        &self,
        name: &EnvironmentName,
        apply: impl FnOnce(&mut Environment),
    ) -> Result<Environment, RegistryError> {
        let _guard = self.lock_file()?;
        let mut environments = self.environments.write();
        if let Some(path) = &self.path {
            *environments = load(path)?;
        }
        let env = environments
            .entry(name.clone())
            .or_insert_with(|| Environment::new(name.clone()));
        apply(env);
        let updated = env.clone();
        self.persist(&environments)?;
        Ok(updated)
    }

    /// Exclusive lock on the registry file, held until the guard drops.
    fn lock_file(&self) -> Result<Option<File>, RegistryError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let lock_path = path.with_extension("json.lock");
        let io_error = |source| RegistryError::Io {
            path: lock_path.clone(),
            source,
        };

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_error)?;
        FileExt::lock_exclusive(&file).map_err(io_error)?;
        Ok(Some(file))
    }

    fn persist(&self, environments: &BTreeMap<EnvironmentName, Environment>) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let records: Vec<&Environment> = environments.values().collect();
        let json = serde_json::to_vec_pretty(&records).map_err(|source| RegistryError::Corrupt {
            path: path.clone(),
            source,
        })?;
        write_atomic(path, &json).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })
    }
}

fn load(path: &Path) -> Result<BTreeMap<EnvironmentName, Environment>, RegistryError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(RegistryError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let records: Vec<Environment> =
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(records.into_iter().map(|e| (e.name.clone(), e)).collect())
}

/// Write through a uniquely named sibling so concurrent writers never share a temp file.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".environments-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
