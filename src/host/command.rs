// ABOUTME: Execution host driven by per-environment shell commands.
// ABOUTME: Unpacks releases under releases/<env>/<hash> and runs deploy/probe/stop.

use async_trait::async_trait;
use bytes::Bytes;
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::error::{SpawnSnafu, UnknownEnvironmentSnafu, UnpackSnafu};
use super::{ExecutionHost, HealthCheckResult, HostError};
use crate::build::bundle;
use crate::config::{Config, EnvironmentConfig, resolve_env_map};
use crate::error::Result as AppResult;
use crate::store::Artifact;
use crate::types::EnvironmentName;

#[derive(Debug, Clone)]
struct Target {
    deploy: String,
    stop: Option<String>,
    healthcheck: Option<String>,
    env: HashMap<String, String>,
}

impl Target {
    fn from_config(config: &EnvironmentConfig) -> AppResult<Self> {
        Ok(Self {
            deploy: config.deploy.clone(),
            stop: config.stop.clone(),
            healthcheck: config.healthcheck.as_ref().map(|hc| hc.cmd.clone()),
            env: resolve_env_map(&config.env)?,
        })
    }
}

/// Runs configured shell commands against unpacked releases.
#[derive(Debug, Clone)]
pub struct CommandHost {
    releases_dir: PathBuf,
    targets: HashMap<EnvironmentName, Target>,
}

impl CommandHost {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let targets = config
            .environments
            .iter()
            .map(|env| Target::from_config(env).map(|target| (env.name.clone(), target)))
            .collect::<AppResult<HashMap<_, _>>>()?;

        Ok(Self {
            releases_dir: config.releases_dir(),
            targets,
        })
    }

    /// Directory an artifact is unpacked into for an environment.
    pub fn release_dir(&self, environment: &EnvironmentName, artifact: &Artifact) -> PathBuf {
        self.releases_dir
            .join(environment.as_str())
            .join(artifact.hash.as_str())
    }

    fn target(&self, environment: &EnvironmentName) -> Result<&Target, HostError> {
        self.targets.get(environment).ok_or_else(|| {
            UnknownEnvironmentSnafu {
                environment: environment.to_string(),
            }
            .build()
        })
    }

    async fn ensure_release(&self, dir: &Path, bundle: &Bytes) -> Result<(), HostError> {
        if dir.is_dir() {
            return Ok(());
        }

        let partial = dir.with_extension("partial");
        let bytes = bundle.clone();
        let target = partial.clone();
        tokio::task::spawn_blocking(move || {
            let _ = std::fs::remove_dir_all(&target);
            bundle::unpack(&bytes, &target)
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|result| result)
        .context(UnpackSnafu { path: dir })?;

        tokio::fs::rename(&partial, dir)
            .await
            .context(UnpackSnafu { path: dir })
    }
}

async fn run_shell(
    command: &str,
    cwd: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<std::process::Output, HostError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    cmd.output().await.context(SpawnSnafu { command })
}

fn check_status(command: &str, output: &std::process::Output) -> Result<(), HostError> {
    if output.status.success() {
        return Ok(());
    }
    Err(HostError::CommandFailed {
        command: command.to_string(),
        exit_code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Last non-empty line of the probe output, for the health check detail.
fn last_line(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout
        .lines()
        .chain(stderr.lines())
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl ExecutionHost for CommandHost {
    async fn run(
        &self,
        environment: &EnvironmentName,
        artifact: &Artifact,
        bundle: &Bytes,
    ) -> Result<(), HostError> {
        let target = self.target(environment)?;
        let dir = self.release_dir(environment, artifact);
        self.ensure_release(&dir, bundle).await?;

        let mut env = target.env.clone();
        env.insert("SHIPYARD_ENVIRONMENT".to_string(), environment.to_string());
        env.insert("SHIPYARD_ARTIFACT".to_string(), artifact.hash.to_string());
        env.insert("SHIPYARD_REVISION".to_string(), artifact.revision.to_string());
        env.insert(
            "SHIPYARD_RELEASE_DIR".to_string(),
            dir.to_string_lossy().into_owned(),
        );

        tracing::info!(%environment, release = %dir.display(), "running deploy command");
        let output = run_shell(&target.deploy, Some(&dir), &env).await?;
        check_status(&target.deploy, &output)
    }

    async fn health_check(
        &self,
        environment: &EnvironmentName,
    ) -> Result<HealthCheckResult, HostError> {
        let target = self.target(environment)?;
        let Some(cmd) = &target.healthcheck else {
            return Ok(HealthCheckResult::passed("no healthcheck configured"));
        };

        let mut env = target.env.clone();
        env.insert("SHIPYARD_ENVIRONMENT".to_string(), environment.to_string());

        let output = run_shell(cmd, None, &env).await?;
        let detail = last_line(&output);
        if output.status.success() {
            Ok(HealthCheckResult::passed(detail))
        } else {
            let detail = if detail.is_empty() {
                format!("probe exited with {:?}", output.status.code())
            } else {
                detail
            };
            Ok(HealthCheckResult::failed(detail))
        }
    }

    async fn stop(&self, environment: &EnvironmentName) -> Result<(), HostError> {
        let target = self.target(environment)?;
        let Some(cmd) = &target.stop else {
            tracing::debug!(%environment, "no stop command configured");
            return Ok(());
        };

        let mut env = target.env.clone();
        env.insert("SHIPYARD_ENVIRONMENT".to_string(), environment.to_string());

        let output = run_shell(cmd, None, &env).await?;
        check_status(cmd, &output)
    }
}
