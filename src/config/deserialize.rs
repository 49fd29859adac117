// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Enforces a non-empty environment list with unique names.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use super::EnvironmentConfig;

pub fn deserialize_environments<'de, D>(
    deserializer: D,
) -> Result<NonEmpty<EnvironmentConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<EnvironmentConfig> = Vec::deserialize(deserializer)?;

    let mut seen = HashSet::new();
    for env in &values {
        if !seen.insert(env.name.clone()) {
            return Err(serde::de::Error::custom(format!(
                "duplicate environment name: {}",
                env.name
            )));
        }
    }

    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one environment is required"))
}
