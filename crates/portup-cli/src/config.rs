use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use portup_core::Triplet;
use portup_installer::{default_root, InstallLayout};
use portup_registry::{PortsProvider, PortsTree};
use serde::Deserialize;
use tracing::debug;

/// Optional `<root>/config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PortupConfig {
    pub(crate) default_triplet: Option<String>,
    #[serde(default)]
    pub(crate) overlay_ports: Vec<PathBuf>,
}

impl PortupConfig {
    pub(crate) fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse portup config")
    }
}

pub(crate) fn load_config(layout: &InstallLayout) -> Result<PortupConfig> {
    let path = layout.config_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(PortupConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed reading config: {}", path.display()))
        }
    };
    PortupConfig::from_toml_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
}

pub(crate) fn resolve_root(flag: Option<PathBuf>, env_root: Option<&str>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root);
    }
    match env_root.map(str::trim) {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
        _ => default_root(),
    }
}

/// Picks the triplet used for specs written without `:triplet`.
pub(crate) fn resolve_default_triplet(
    flag: Option<&str>,
    env_triplet: Option<&str>,
    config: &PortupConfig,
) -> Result<Triplet> {
    let env_triplet = env_triplet.map(str::trim).filter(|value| !value.is_empty());
    match flag.or(env_triplet).or(config.default_triplet.as_deref()) {
        Some(value) => Triplet::parse(value),
        None => Ok(Triplet::host()),
    }
}

/// Overlay directories first, then `<root>/ports`. Relative overlays resolve against the root.
pub(crate) fn ports_provider(layout: &InstallLayout, config: &PortupConfig) -> PortsProvider {
    let mut trees = config
        .overlay_ports
        .iter()
        .map(|overlay| PortsTree::open(resolve_against(layout.root(), overlay)))
        .collect::<Vec<_>>();
    trees.push(PortsTree::open(layout.ports_dir()));
    let provider = PortsProvider::new(trees);
    for tree in provider.trees() {
        debug!(tree = %tree.root().display(), "searching ports tree");
    }
    provider
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
