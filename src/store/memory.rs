// ABOUTME: In-memory artifact store.
// ABOUTME: Used by tests and dry runs; same semantics as the filesystem store.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::sealed::Sealed;
use super::{Artifact, ArtifactStore, StoreError};
use crate::types::ArtifactHash;

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<ArtifactHash, Bytes>>,
    metadata: RwLock<HashMap<ArtifactHash, Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Sealed for MemoryArtifactStore {}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, bytes: Bytes) -> Result<ArtifactHash, StoreError> {
        let hash = ArtifactHash::of(&bytes);
        self.blobs.write().entry(hash.clone()).or_insert(bytes);
        Ok(hash)
    }

    async fn get(&self, hash: &ArtifactHash) -> Result<Bytes, StoreError> {
        self.blobs
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hash.clone()))
    }

    async fn contains(&self, hash: &ArtifactHash) -> Result<bool, StoreError> {
        Ok(self.blobs.read().contains_key(hash))
    }

    async fn record(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.metadata
            .write()
            .entry(artifact.hash.clone())
            .or_insert_with(|| artifact.clone());
        Ok(())
    }

    async fn artifact(&self, hash: &ArtifactHash) -> Result<Option<Artifact>, StoreError> {
        Ok(self.metadata.read().get(hash).cloned())
    }

    async fn list(&self) -> Result<Vec<Artifact>, StoreError> {
        let mut all: Vec<Artifact> = self.metadata.read().values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn gc(&self, referenced: &HashSet<ArtifactHash>) -> Result<usize, StoreError> {
        let mut blobs = self.blobs.write();
        let before = blobs.len();
        blobs.retain(|hash, _| referenced.contains(hash));
        self.metadata
            .write()
            .retain(|hash, _| referenced.contains(hash));
        Ok(before - blobs.len())
    }
}
