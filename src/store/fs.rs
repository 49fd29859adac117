// ABOUTME: Filesystem-backed artifact store.
// ABOUTME: Blobs live under blobs/<prefix>/<hash>, metadata under meta/<hash>.json.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::sealed::Sealed;
use super::{Artifact, ArtifactStore, StoreError};
use crate::types::ArtifactHash;

/// Artifact store rooted at a directory.
///
/// Every write lands in `tmp/` first and is renamed into place, so a reader
/// never observes a partially written blob.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    fn blob_path(&self, hash: &ArtifactHash) -> PathBuf {
        self.blobs_dir().join(&hash.as_str()[..2]).join(hash.as_str())
    }

    fn meta_path(&self, hash: &ArtifactHash) -> PathBuf {
        self.meta_dir().join(format!("{}.json", hash))
    }

    /// Write `contents` to `dest` via a temp file and rename.
    async fn write_atomic(&self, dest: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp_dir = self.tmp_dir();
        tokio::fs::create_dir_all(&tmp_dir)
            .await
            .map_err(|e| StoreError::io(&tmp_dir, e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = tmp_dir.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(dest, e));
        }
        Ok(())
    }

    async fn exists(path: &Path) -> Result<bool, StoreError> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    /// Every blob hash currently on disk.
    async fn blob_hashes(&self) -> Result<Vec<ArtifactHash>, StoreError> {
        let blobs_dir = self.blobs_dir();
        let mut hashes = Vec::new();

        let mut prefixes = match tokio::fs::read_dir(&blobs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(hashes),
            Err(e) => return Err(StoreError::io(&blobs_dir, e)),
        };

        while let Some(prefix) = prefixes
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&blobs_dir, e))?
        {
            let prefix_path = prefix.path();
            if !prefix_path.is_dir() {
                continue;
            }

            let mut entries = tokio::fs::read_dir(&prefix_path)
                .await
                .map_err(|e| StoreError::io(&prefix_path, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&prefix_path, e))?
            {
                let name = entry.file_name();
                match ArtifactHash::parse(&name.to_string_lossy()) {
                    Ok(hash) => hashes.push(hash),
                    Err(_) => tracing::debug!("skipping stray store file {:?}", entry.path()),
                }
            }
        }

        Ok(hashes)
    }

    async fn remove_if_present(path: &Path) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl Sealed for FsArtifactStore {}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, bytes: Bytes) -> Result<ArtifactHash, StoreError> {
        let hash = ArtifactHash::of(&bytes);
        let path = self.blob_path(&hash);

        if Self::exists(&path).await? {
            tracing::debug!(hash = %hash.short(), "artifact already stored");
            return Ok(hash);
        }

        self.write_atomic(&path, &bytes).await?;
        tracing::debug!(hash = %hash.short(), size = bytes.len(), "stored artifact");
        Ok(hash)
    }

    async fn get(&self, hash: &ArtifactHash) -> Result<Bytes, StoreError> {
        let path = self.blob_path(hash);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(hash.clone()));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let actual = ArtifactHash::of(&bytes);
        if &actual != hash {
            return Err(StoreError::Corrupt {
                expected: hash.clone(),
                actual,
            });
        }

        Ok(Bytes::from(bytes))
    }

    async fn contains(&self, hash: &ArtifactHash) -> Result<bool, StoreError> {
        Self::exists(&self.blob_path(hash)).await
    }

    async fn record(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.meta_path(&artifact.hash);
        if Self::exists(&path).await? {
            return Ok(());
        }

        let json = serde_json::to_vec_pretty(artifact).map_err(|source| StoreError::Metadata {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &json).await
    }

    async fn artifact(&self, hash: &ArtifactHash) -> Result<Option<Artifact>, StoreError> {
        let path = self.meta_path(hash);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Metadata { path, source })
    }

    async fn list(&self) -> Result<Vec<Artifact>, StoreError> {
        let meta_dir = self.meta_dir();
        let mut entries = match tokio::fs::read_dir(&meta_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&meta_dir, e)),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&meta_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            let artifact: Artifact = serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Metadata { path, source })?;
            artifacts.push(artifact);
        }

        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(artifacts)
    }

    async fn gc(&self, referenced: &HashSet<ArtifactHash>) -> Result<usize, StoreError> {
        let mut freed = 0;

        for hash in self.blob_hashes().await? {
            if referenced.contains(&hash) {
                continue;
            }
            if Self::remove_if_present(&self.blob_path(&hash)).await? {
                freed += 1;
            }
            Self::remove_if_present(&self.meta_path(&hash)).await?;
            tracing::debug!(hash = %hash.short(), "collected artifact");
        }

        // Metadata whose blob is already gone.
        for artifact in self.list().await? {
            if !referenced.contains(&artifact.hash) && !self.contains(&artifact.hash).await? {
                Self::remove_if_present(&self.meta_path(&artifact.hash)).await?;
            }
        }

        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_path_is_sharded_by_prefix() {
        let store = FsArtifactStore::new("/var/store");
        let hash = ArtifactHash::of(b"");
        assert_eq!(
            store.blob_path(&hash),
            PathBuf::from(format!("/var/store/blobs/e3/{}", hash))
        );
    }

    #[tokio::test]
    async fn get_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let hash = store.put(Bytes::from_static(b"payload")).await.unwrap();
        std::fs::write(store.blob_path(&hash), b"tampered").unwrap();

        let err = store.get(&hash).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
