// ABOUTME: Artifacts command implementation.
// ABOUTME: Lists artifact metadata from the store, optionally for one revision.

use shipyard::config::Config;
use shipyard::error::{Error, Result};
use shipyard::output::Output;
use shipyard::store::{ArtifactStore, FsArtifactStore};
use shipyard::types::Revision;

pub async fn artifacts(config: &Config, revision: Option<&str>, output: &Output) -> Result<()> {
    let store = FsArtifactStore::new(config.store_dir());

    let mut artifacts = match revision {
        Some(revision) => {
            let revision = Revision::new(revision).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            store.list_by_revision(&revision).await?
        }
        None => store.list().await?,
    };
    artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if artifacts.is_empty() {
        output.progress("No artifacts stored");
        return Ok(());
    }
    for artifact in &artifacts {
        let text = format!(
            "{} {} {} {} bytes",
            artifact.hash.short(),
            artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
            artifact.revision,
            artifact.size
        );
        // The build log is long; JSON output carries everything but it.
        let record = serde_json::json!({
            "hash": artifact.hash,
            "revision": artifact.revision,
            "created_at": artifact.created_at,
            "size": artifact.size,
        });
        output.record(&text, &record);
    }
    Ok(())
}
