// ABOUTME: Wires configured collaborators into a rollout controller.
// ABOUTME: Shared by the deploy and watch commands.

use shipyard::audit::AuditLog;
use shipyard::build::ArtifactBuilder;
use shipyard::config::Config;
use shipyard::diagnostics::{Diagnostics, Warning};
use shipyard::error::Result;
use shipyard::host::CommandHost;
use shipyard::notify::Notifier;
use shipyard::registry::Registry;
use shipyard::rollout::Controller;
use shipyard::source::{GitRepository, SourceRepository};
use shipyard::store::FsArtifactStore;
use std::sync::Arc;

pub struct Pipeline {
    pub source: Arc<dyn SourceRepository>,
    pub controller: Arc<Controller>,
}

impl Pipeline {
    pub fn open(config: &Config, diag: &mut Diagnostics) -> Result<Self> {
        let source: Arc<dyn SourceRepository> =
            Arc::new(GitRepository::new(config.repository_path()));

        let registry = Registry::open(config.registry_path())?;
        let report = registry.reconcile(&config.environment_names())?;
        for name in &report.created {
            tracing::debug!(environment = %name, "registered environment");
        }
        for name in &report.unknown {
            diag.warn(Warning::unknown_environment(format!(
                "registry has environment {name} which is not in the configuration"
            )));
        }

        let controller = Controller::new(
            ArtifactBuilder::new(source.clone()).scratch_in(config.state_dir().join("builds")),
            Arc::new(FsArtifactStore::new(config.store_dir())),
            Arc::new(registry),
            Arc::new(CommandHost::from_config(config)?),
            Arc::new(AuditLog::new(config.audit_path())),
            Notifier::from_config(&config.notify)?,
            config.recipe.clone(),
        )
        .with_policies_from(config);

        Ok(Self {
            source,
            controller: Arc::new(controller),
        })
    }
}
