// ABOUTME: Error types for artifact store operations.
// ABOUTME: Distinguishes missing artifacts, corruption, and I/O failures.

use std::path::PathBuf;

use crate::types::ArtifactHash;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactHash),

    #[error("artifact {expected} is corrupt (content hashes to {actual})")]
    Corrupt {
        expected: ArtifactHash,
        actual: ArtifactHash,
    },

    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact metadata at {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
