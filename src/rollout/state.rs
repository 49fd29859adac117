// ABOUTME: Rollout state marker types for the type state pattern.
// ABOUTME: Markers after the build carry the artifact so later steps cannot run without it.

use bytes::Bytes;

use crate::store::Artifact;

/// Waiting to build.
/// Available actions: `build()`, `fail()`, `abandon()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Queued;

/// Artifact built and stored.
/// Available actions: `deploy()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Built {
    pub(crate) artifact: Artifact,
    pub(crate) bundle: Bytes,
}

/// Execution host reports the new artifact running.
/// Available actions: `health_check()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Deployed {
    pub(crate) artifact: Artifact,
}

/// Health checks passed.
/// Available actions: `commit()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Verified {
    pub(crate) artifact: Artifact,
}

/// Attempt over; the record is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct Finished;

impl Built {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }
}

impl Deployed {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }
}

impl Verified {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }
}
