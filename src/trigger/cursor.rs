// ABOUTME: Last revision handled per environment, persisted across restarts.
// ABOUTME: Lets the poller resync branch heads that moved while the daemon was down.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::TriggerError;
use crate::types::{EnvironmentName, Revision};

#[derive(Debug, Default)]
pub struct TriggerCursor {
    path: Option<PathBuf>,
    revisions: BTreeMap<EnvironmentName, Revision>,
}

impl TriggerCursor {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cursor, starting empty when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, TriggerError> {
        let path = path.into();
        let revisions = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| TriggerError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(TriggerError::Io { path, source }),
        };
        Ok(Self {
            path: Some(path),
            revisions,
        })
    }

    pub fn get(&self, environment: &EnvironmentName) -> Option<&Revision> {
        self.revisions.get(environment)
    }

    pub fn revisions(&self) -> HashMap<EnvironmentName, Revision> {
        self.revisions
            .iter()
            .map(|(env, rev)| (env.clone(), rev.clone()))
            .collect()
    }

    /// Remember that `revision` was handled for `environment`.
    pub fn record(
        &mut self,
        environment: &EnvironmentName,
        revision: &Revision,
    ) -> Result<(), TriggerError> {
        if self.revisions.get(environment) == Some(revision) {
            return Ok(());
        }
        self.revisions.insert(environment.clone(), revision.clone());
        self.persist()
    }

    fn persist(&self) -> Result<(), TriggerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_error = |source| TriggerError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(&self.revisions).map_err(|source| TriggerError::Corrupt {
            path: path.clone(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_error)?;
        std::fs::rename(&tmp, path).map_err(io_error)
    }
}
