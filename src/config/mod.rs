// ABOUTME: Configuration types and parsing for shipyard.yml.
// ABOUTME: Handles YAML parsing, path resolution, and per-environment lookup.

mod deserialize;
mod env_value;
mod environment;
mod healthcheck;
mod init;
mod notify;
mod recipe;
mod store;
mod trigger;

pub use env_value::{EnvValue, resolve_env_map};
pub use environment::EnvironmentConfig;
pub use healthcheck::HealthcheckConfig;
pub use init::init_config;
pub use notify::SinkConfig;
pub use recipe::{Recipe, RecipeStep};
pub use store::StoreConfig;
pub use trigger::{TriggerConfig, WebhookConfig};

use crate::error::{Error, Result};
use crate::types::EnvironmentName;
use deserialize::deserialize_environments;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "shipyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "shipyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shipyard/config.yml";

const DEFAULT_STATE_DIR: &str = ".shipyard/state";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,

    #[serde(default)]
    pub recipe: Recipe,

    #[serde(deserialize_with = "deserialize_environments")]
    pub environments: NonEmpty<EnvironmentConfig>,

    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub notify: Vec<SinkConfig>,

    /// Directory relative paths are resolved against (the project root).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Path to the git repository to build from.
    #[serde(default = "default_repository")]
    pub repository: PathBuf,
}

fn default_repository() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = project_root_for(path);
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Look up a configured environment by name.
    pub fn environment(&self, name: &EnvironmentName) -> Result<&EnvironmentConfig> {
        self.environments
            .iter()
            .find(|env| &env.name == name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))
    }

    /// Names of every configured environment, in declaration order.
    pub fn environment_names(&self) -> Vec<EnvironmentName> {
        self.environments.iter().map(|e| e.name.clone()).collect()
    }

    /// Resolve a possibly relative path against the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn repository_path(&self) -> PathBuf {
        self.resolve_path(&self.source.repository)
    }

    pub fn state_dir(&self) -> PathBuf {
        let dir = self
            .state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
        self.resolve_path(&dir)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.state_dir().join("store")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir().join("environments.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.state_dir().join("audit.log")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir().join("locks")
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.state_dir().join("releases")
    }

    pub fn trigger_cursor_path(&self) -> PathBuf {
        self.state_dir().join("triggers.json")
    }

    pub fn template() -> Self {
        Config {
            source: SourceConfig {
                repository: default_repository(),
            },
            recipe: Recipe::default(),
            environments: NonEmpty::new(EnvironmentConfig::template(
                EnvironmentName::new("staging").expect("template name is valid"),
            )),
            state_dir: None,
            store: StoreConfig::default(),
            trigger: TriggerConfig::default(),
            notify: vec![SinkConfig::Log],
            base_dir: PathBuf::from("."),
        }
    }
}

/// `.shipyard/config.yml` lives one level below the project root.
fn project_root_for(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or_else(|| Path::new("."));
    if parent.file_name().is_some_and(|name| name == ".shipyard") {
        parent.parent().unwrap_or(parent).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}
