// ABOUTME: Values for recipe and environment `env:` maps in shipyard.yml.
// ABOUTME: A value is either literal or read from the shipyard process environment.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Prefix of the variables shipyard itself hands to build steps and host
/// commands (`SHIPYARD_REVISION`, `SHIPYARD_RELEASE_DIR`, ...).
pub const RESERVED_PREFIX: &str = "SHIPYARD_";

/// One entry of an `env:` map.
///
/// ```yaml
/// env:
///   MODE: release
///   API_TOKEN:
///     env: STAGING_API_TOKEN
///     default: dev-token
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Read the value now. Secrets stay out of shipyard.yml this way and are
    /// picked up from whoever runs the deploy.
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::FromEnv { var, default } => std::env::var(var)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }
}

/// Resolve a whole `env:` map for a build step or host command.
///
/// Names under [`RESERVED_PREFIX`] are refused: shipyard sets those after the
/// map is applied, so a configured value would silently never take effect.
pub fn resolve_env_map(map: &HashMap<String, EnvValue>) -> Result<HashMap<String, String>> {
    map.iter()
        .map(|(name, value)| {
            if name.starts_with(RESERVED_PREFIX) {
                return Err(Error::InvalidConfig(format!(
                    "env variable {name} is reserved for shipyard"
                )));
            }
            Ok((name.clone(), value.resolve()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(entries: &[(&str, EnvValue)]) -> HashMap<String, EnvValue> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn release_variables_cannot_be_overridden() {
        let map = env(&[(
            "SHIPYARD_RELEASE_DIR",
            EnvValue::Literal("/srv/elsewhere".to_string()),
        )]);

        let err = resolve_env_map(&map).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("SHIPYARD_RELEASE_DIR")));
    }

    #[test]
    fn deploy_secret_comes_from_the_operator_shell() {
        let map = env(&[
            ("MODE", EnvValue::Literal("release".to_string())),
            (
                "API_TOKEN",
                EnvValue::FromEnv {
                    var: "SHIPYARD_UNIT_STAGING_TOKEN".to_string(),
                    default: Some("dev-token".to_string()),
                },
            ),
        ]);

        temp_env::with_var("SHIPYARD_UNIT_STAGING_TOKEN", Some("s3cret"), || {
            let resolved = resolve_env_map(&map).unwrap();
            assert_eq!(resolved["MODE"], "release");
            assert_eq!(resolved["API_TOKEN"], "s3cret");
        });
        temp_env::with_var_unset("SHIPYARD_UNIT_STAGING_TOKEN", || {
            assert_eq!(resolve_env_map(&map).unwrap()["API_TOKEN"], "dev-token");
        });
    }

    #[test]
    fn reading_a_reserved_name_from_the_shell_is_fine() {
        let value = EnvValue::FromEnv {
            var: "SHIPYARD_UNIT_PASSTHROUGH".to_string(),
            default: None,
        };
        let map = env(&[("UPSTREAM_REVISION", value)]);

        temp_env::with_var("SHIPYARD_UNIT_PASSTHROUGH", Some("abc123"), || {
            assert_eq!(resolve_env_map(&map).unwrap()["UPSTREAM_REVISION"], "abc123");
        });
    }
}
