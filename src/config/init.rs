// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates shipyard.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::EnvironmentName;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, environment: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let environment = EnvironmentName::new(environment.unwrap_or("staging"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    std::fs::write(&config_path, generate_template_yaml(&environment))?;

    Ok(())
}

fn generate_template_yaml(environment: &EnvironmentName) -> String {
    format!(
        r#"source:
  repository: .

recipe:
  steps: []
  # output: dist

environments:
  - name: {environment}
    branch: main
    deploy: ./deploy.sh
    # healthcheck:
    #   cmd: "curl -fsS http://localhost:8080/health"
    #   required_passes: 3
    #   deadline: 30s

notify:
  - type: log
"#
    )
}
