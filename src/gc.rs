// ABOUTME: Garbage collection policy for the artifact store and unpacked releases.
// ABOUTME: Keeps live, recent, and recent-rollback-target artifacts; frees the rest.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;

use crate::audit::AuditLog;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::ArtifactStore;
use crate::types::{ArtifactHash, EnvironmentName};

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GcReport {
    /// Artifacts the policy keeps.
    pub kept: usize,
    /// Artifacts removed, or that would be removed on a dry run.
    pub removed: usize,
    /// Unpacked release directories removed (or that would be).
    pub releases_removed: usize,
    pub dry_run: bool,
}

/// Hashes garbage collection must not remove: every environment's current and
/// desired artifact, artifacts created within the retention window, and the
/// artifacts named by the last `keep_last` attempts of each environment.
pub async fn referenced_artifacts(
    store: &dyn ArtifactStore,
    registry: &Registry,
    audit: &AuditLog,
    policy: &StoreConfig,
) -> Result<HashSet<ArtifactHash>> {
    let mut referenced = registry.referenced_artifacts();

    let cutoff = chrono::Duration::from_std(policy.retention)
        .ok()
        .and_then(|window| Utc::now().checked_sub_signed(window));
    for artifact in store.list().await? {
        if cutoff.is_none_or(|cutoff| artifact.created_at >= cutoff) {
            referenced.insert(artifact.hash);
        }
    }

    let mut seen: HashMap<EnvironmentName, usize> = HashMap::new();
    for attempt in audit.records().await?.into_iter().rev() {
        let count = seen.entry(attempt.environment.clone()).or_default();
        if *count >= policy.keep_last {
            continue;
        }
        *count += 1;
        referenced.extend(attempt.from_artifact);
        referenced.extend(attempt.to_artifact);
    }

    Ok(referenced)
}

/// Free unreferenced artifacts, and the release directories unpacked from
/// them under `releases` (laid out as `<releases>/<environment>/<hash>`).
pub async fn collect_garbage(
    store: &dyn ArtifactStore,
    registry: &Registry,
    audit: &AuditLog,
    policy: &StoreConfig,
    releases: Option<&Path>,
    dry_run: bool,
) -> Result<GcReport> {
    let referenced = referenced_artifacts(store, registry, audit, policy).await?;
    let releases_removed = match releases {
        Some(dir) => prune_releases(dir, &referenced, dry_run).await?,
        None => 0,
    };

    if dry_run {
        let artifacts = store.list().await?;
        let removed = artifacts
            .iter()
            .filter(|artifact| !referenced.contains(&artifact.hash))
            .count();
        return Ok(GcReport {
            kept: artifacts.len() - removed,
            removed,
            releases_removed,
            dry_run,
        });
    }

    let removed = store.gc(&referenced).await?;
    let kept = store.list().await?.len();
    tracing::info!(removed, kept, releases_removed, "garbage collection finished");
    Ok(GcReport {
        kept,
        removed,
        releases_removed,
        dry_run,
    })
}

/// Entries whose name is not an artifact hash (such as half-unpacked
/// `.partial` directories) are left alone.
async fn prune_releases(
    dir: &Path,
    referenced: &HashSet<ArtifactHash>,
    dry_run: bool,
) -> std::io::Result<usize> {
    let mut environments = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(environment) = environments.next_entry().await? {
        if !environment.file_type().await?.is_dir() {
            continue;
        }
        let mut releases = tokio::fs::read_dir(environment.path()).await?;
        while let Some(release) = releases.next_entry().await? {
            let name = release.file_name();
            let Some(hash) = name.to_str().and_then(|n| ArtifactHash::parse(n).ok()) else {
                continue;
            };
            if referenced.contains(&hash) {
                continue;
            }
            removed += 1;
            if !dry_run {
                tracing::debug!(release = %release.path().display(), "removing release");
                tokio::fs::remove_dir_all(release.path()).await?;
            }
        }
    }
    Ok(removed)
}
