use std::collections::HashSet;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::spec::validate_identifier;
use crate::version::PortVersion;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PortDefinition {
    pub name: String,
    pub version: PortVersion,
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub build: Option<Vec<String>>,
}

impl PortDefinition {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let mut definition: Self =
            toml::from_str(input).context("failed to parse port definition")?;
        definition.version = PortVersion::new(definition.version.as_str());
        validate_identifier(&definition.name)
            .with_context(|| format!("invalid port name '{}'", definition.name))?;
        if definition.version.as_str().is_empty() {
            return Err(anyhow!(
                "port '{}' declares an empty version",
                definition.name
            ));
        }
        if definition.version.as_str().chars().any(char::is_control) {
            return Err(anyhow!(
                "port '{}' declares a version containing control characters",
                definition.name
            ));
        }

        let mut seen = HashSet::new();
        for dependency in &definition.dependencies {
            if dependency == &definition.name {
                return Err(anyhow!("port '{}' depends on itself", definition.name));
            }
            validate_identifier(dependency).with_context(|| {
                format!(
                    "invalid dependency '{dependency}' in port '{}'",
                    definition.name
                )
            })?;
            if !seen.insert(dependency.as_str()) {
                return Err(anyhow!(
                    "duplicate dependency '{dependency}' in port '{}'",
                    definition.name
                ));
            }
        }

        if let Some(build) = &definition.build {
            if build.first().map(|program| program.trim().is_empty()).unwrap_or(true) {
                return Err(anyhow!(
                    "build command for port '{}' must name a program",
                    definition.name
                ));
            }
        }

        Ok(definition)
    }
}
