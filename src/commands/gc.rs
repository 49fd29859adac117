// ABOUTME: Gc command implementation.
// ABOUTME: Frees stored artifacts and unpacked releases outside the retention policy.

use shipyard::audit::AuditLog;
use shipyard::config::Config;
use shipyard::error::Result;
use shipyard::gc::collect_garbage;
use shipyard::output::Output;
use shipyard::registry::Registry;
use shipyard::store::FsArtifactStore;

pub async fn gc(config: &Config, dry_run: bool, output: &Output) -> Result<()> {
    let store = FsArtifactStore::new(config.store_dir());
    let registry = Registry::open(config.registry_path())?;
    let audit = AuditLog::new(config.audit_path());

    let releases = config.releases_dir();
    let report = collect_garbage(
        &store,
        &registry,
        &audit,
        &config.store,
        Some(&releases),
        dry_run,
    )
    .await?;
    let text = if dry_run {
        format!(
            "Would remove {} artifact(s) and {} release(s), keeping {}",
            report.removed, report.releases_removed, report.kept
        )
    } else {
        format!(
            "Removed {} artifact(s) and {} release(s), kept {}",
            report.removed, report.releases_removed, report.kept
        )
    };
    output.record(&text, &report);
    Ok(())
}
