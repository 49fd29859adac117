// ABOUTME: Source repository collaborator: resolves references and snapshots trees.
// ABOUTME: The pipeline only consumes revision identifiers, never branch logic.

mod error;
mod git;

pub use error::SourceError;
pub use git::GitRepository;

use async_trait::async_trait;
use std::path::Path;

use crate::types::Revision;

/// Access to the repository the pipeline builds from.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Resolve a branch, tag, or other reference to a concrete revision.
    async fn resolve(&self, reference: &str) -> Result<Revision, SourceError>;

    /// Materialise the tree at `revision` into the empty directory `dest`.
    async fn snapshot(&self, revision: &Revision, dest: &Path) -> Result<(), SourceError>;
}
