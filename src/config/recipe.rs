// ABOUTME: Build recipe: ordered shell steps and the output directory to bundle.
// ABOUTME: Steps may be plain strings or {name, run} maps.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::EnvValue;

#[derive(Debug, Clone, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub steps: Vec<RecipeStep>,

    /// Directory (relative to the source root) bundled into the artifact.
    /// Unset means the whole tree.
    #[serde(default)]
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default = "default_step_timeout", with = "humantime_serde")]
    pub step_timeout: Duration,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            output: None,
            env: HashMap::new(),
            step_timeout: default_step_timeout(),
        }
    }
}

impl Recipe {
    pub fn from_steps<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: steps.into_iter().map(RecipeStep::new).collect(),
            ..Self::default()
        }
    }
}

fn default_step_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeStep {
    pub name: String,
    pub run: String,
}

impl RecipeStep {
    pub fn new(run: impl Into<String>) -> Self {
        let run = run.into();
        Self {
            name: run.clone(),
            run,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepEntry {
    Simple(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        run: String,
    },
}

impl<'de> Deserialize<'de> for RecipeStep {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let step = match StepEntry::deserialize(deserializer)? {
            StepEntry::Simple(run) => RecipeStep::new(run),
            StepEntry::Detailed { name, run } => RecipeStep {
                name: name.unwrap_or_else(|| run.clone()),
                run,
            },
        };

        if step.run.trim().is_empty() {
            return Err(serde::de::Error::custom("recipe step cannot be empty"));
        }
        Ok(step)
    }
}
