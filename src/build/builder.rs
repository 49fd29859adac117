// ABOUTME: Runs recipe steps in declared order inside a scratch copy of the source.
// ABOUTME: Any failing step aborts the build and discards the scratch directory.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use super::{BuildError, bundle};
use crate::config::{Recipe, RecipeStep, resolve_env_map};
use crate::source::SourceRepository;
use crate::store::BuiltArtifact;
use crate::types::{BuildId, Revision};

/// Builds artifacts from a source repository.
///
/// A build is a pure function of (revision, recipe) as long as the recipe
/// steps themselves are deterministic: the source snapshot and the bundle
/// format carry no timestamps or ownership.
#[derive(Clone)]
pub struct ArtifactBuilder {
    source: Arc<dyn SourceRepository>,
    scratch_root: Option<PathBuf>,
}

impl std::fmt::Debug for ArtifactBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBuilder")
            .field("scratch_root", &self.scratch_root)
            .finish()
    }
}

impl ArtifactBuilder {
    pub fn new(source: Arc<dyn SourceRepository>) -> Self {
        Self {
            source,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `dir` instead of the system temp dir.
    pub fn scratch_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// Resolve a branch, tag, or commit to the revision a build would use.
    pub async fn resolve(&self, reference: &Revision) -> Result<Revision, BuildError> {
        self.source
            .resolve(reference.as_str())
            .await
            .map_err(BuildError::Resolve)
    }

    pub async fn build(
        &self,
        revision: &Revision,
        recipe: &Recipe,
    ) -> Result<BuiltArtifact, BuildError> {
        let build_id = BuildId::generate();
        tracing::info!(build = %build_id.short(), %revision, steps = recipe.steps.len(), "starting build");

        let env = resolve_env_map(&recipe.env).map_err(|e| BuildError::Environment(e.to_string()))?;

        // Dropping the TempDir on any exit path discards partial output.
        let scratch = self.scratch_dir(&build_id)?;
        let workdir = scratch.path().join("src");
        tokio::fs::create_dir_all(&workdir).await?;

        self.source.snapshot(revision, &workdir).await?;

        let mut log = String::new();
        for (index, step) in recipe.steps.iter().enumerate() {
            run_step(index + 1, step, recipe, &workdir, revision, &env, &mut log).await?;
        }

        let output_dir = output_dir(&workdir, recipe.output.as_deref())?;
        let packed = tokio::task::spawn_blocking(move || bundle::pack_dir(&output_dir))
            .await
            .map_err(|e| BuildError::Bundle(e.to_string()))?
            .map_err(|e| BuildError::Bundle(e.to_string()))?;

        let built = BuiltArtifact::new(revision.clone(), Bytes::from(packed), log);
        tracing::info!(
            build = %build_id.short(),
            hash = %built.hash().short(),
            size = built.artifact.size,
            "build finished"
        );
        Ok(built)
    }

    fn scratch_dir(&self, build_id: &BuildId) -> Result<tempfile::TempDir, BuildError> {
        let prefix = format!("shipyard-build-{}-", build_id.short());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

async fn run_step(
    number: usize,
    step: &RecipeStep,
    recipe: &Recipe,
    workdir: &Path,
    revision: &Revision,
    env: &HashMap<String, String>,
    log: &mut String,
) -> Result<(), BuildError> {
    tracing::debug!(step = number, name = %step.name, "running build step");
    let _ = writeln!(log, "==> [{}] {}", number, step.name);

    let child = Command::new("sh")
        .arg("-c")
        .arg(&step.run)
        .current_dir(workdir)
        .envs(env)
        .env("SHIPYARD_REVISION", revision.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let failed = |exit_code: Option<i32>, log: &mut String| BuildError::StepFailed {
        step: number,
        name: step.name.clone(),
        exit_code,
        log: std::mem::take(log),
    };

    let output = match tokio::time::timeout(recipe.step_timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            let _ = writeln!(log, "failed to spawn step: {e}");
            return Err(failed(None, log));
        }
        Err(_elapsed) => {
            let _ = writeln!(log, "step timed out after {:?}", recipe.step_timeout);
            return Err(failed(None, log));
        }
    };

    log.push_str(&String::from_utf8_lossy(&output.stdout));
    log.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        let code = output.status.code();
        tracing::warn!(step = number, name = %step.name, exit_code = ?code, "build step failed");
        return Err(failed(code, log));
    }

    Ok(())
}

/// Resolve the recipe output directory, refusing paths that escape the tree.
fn output_dir(workdir: &Path, output: Option<&Path>) -> Result<PathBuf, BuildError> {
    let Some(output) = output else {
        return Ok(workdir.to_path_buf());
    };

    let escapes = output
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    let dir = workdir.join(output);
    if escapes || !dir.is_dir() {
        return Err(BuildError::MissingOutput(output.to_path_buf()));
    }
    Ok(dir)
}
