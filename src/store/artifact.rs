// ABOUTME: Immutable artifact metadata and freshly built artifacts.
// ABOUTME: Identity is the content hash; everything else is descriptive.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ArtifactHash, Revision};

/// Write-once record describing stored artifact bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub hash: ArtifactHash,
    pub revision: Revision,
    pub created_at: DateTime<Utc>,
    pub build_log: String,
    pub size: u64,
}

/// Output of a successful build, before it is stored.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    pub artifact: Artifact,
    pub bytes: Bytes,
}

impl BuiltArtifact {
    pub fn new(revision: Revision, bytes: Bytes, build_log: String) -> Self {
        let artifact = Artifact {
            hash: ArtifactHash::of(&bytes),
            revision,
            created_at: Utc::now(),
            build_log,
            size: bytes.len() as u64,
        };
        Self { artifact, bytes }
    }

    pub fn hash(&self) -> &ArtifactHash {
        &self.artifact.hash
    }
}
