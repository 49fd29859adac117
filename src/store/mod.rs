// ABOUTME: Content-addressed artifact storage.
// ABOUTME: Exposes the ArtifactStore trait with filesystem and in-memory backends.

mod artifact;
mod error;
mod fs;
mod memory;
pub(crate) mod sealed;

pub use artifact::{Artifact, BuiltArtifact};
pub use error::StoreError;
pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;

use crate::types::{ArtifactHash, Revision};
use sealed::Sealed;

/// Durable, versioned storage keyed by content hash.
///
/// Writes need no cross-environment coordination: every blob is addressed by
/// its own hash, so concurrent puts of identical bytes converge on one entry.
#[async_trait]
pub trait ArtifactStore: Sealed + Send + Sync {
    /// Store bytes, returning their hash. Idempotent.
    async fn put(&self, bytes: Bytes) -> Result<ArtifactHash, StoreError>;

    /// Fetch the bytes for a hash.
    async fn get(&self, hash: &ArtifactHash) -> Result<Bytes, StoreError>;

    /// Whether a blob exists for the hash.
    async fn contains(&self, hash: &ArtifactHash) -> Result<bool, StoreError>;

    /// Write artifact metadata. The first record for a hash wins.
    async fn record(&self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Metadata for a hash, if recorded.
    async fn artifact(&self, hash: &ArtifactHash) -> Result<Option<Artifact>, StoreError>;

    /// All recorded artifacts, oldest first.
    async fn list(&self) -> Result<Vec<Artifact>, StoreError>;

    /// Artifacts built from a revision, oldest first.
    async fn list_by_revision(&self, revision: &Revision) -> Result<Vec<Artifact>, StoreError> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|artifact| &artifact.revision == revision)
            .collect())
    }

    /// Remove every artifact whose hash is not in `referenced`.
    /// Returns the number of blobs freed.
    async fn gc(&self, referenced: &HashSet<ArtifactHash>) -> Result<usize, StoreError>;
}
