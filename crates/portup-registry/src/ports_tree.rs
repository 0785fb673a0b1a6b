use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use portup_core::{DefinitionProvider, PortDefinition};
use tracing::debug;

const DEFINITION_FILE: &str = "port.toml";

/// A directory of ports laid out as `<root>/<name>/port.toml`.
#[derive(Debug, Clone)]
pub struct PortsTree {
    root: PathBuf,
}

/// Ordered set of ports trees; the first tree that knows a port wins.
#[derive(Debug, Clone)]
pub struct PortsProvider {
    trees: Vec<PortsTree>,
}

impl PortsTree {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self, name: &str) -> Result<Option<PortDefinition>> {
        let path = self.root.join(name).join(DEFINITION_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading port definition: {}", path.display()))
            }
        };

        let definition = PortDefinition::from_toml_str(&content)
            .with_context(|| format!("failed parsing port definition: {}", path.display()))?;
        if definition.name != name {
            anyhow::bail!(
                "port definition {} declares name '{}' but lives under '{name}'",
                path.display(),
                definition.name
            );
        }
        Ok(Some(definition))
    }
}

impl PortsProvider {
    pub fn new(trees: Vec<PortsTree>) -> Self {
        Self { trees }
    }

    pub fn trees(&self) -> &[PortsTree] {
        &self.trees
    }

    pub fn definition_with_tree(&self, name: &str) -> Result<Option<(&PortsTree, PortDefinition)>> {
        for tree in &self.trees {
            if let Some(definition) = tree.load(name)? {
                debug!(port = name, tree = %tree.root().display(), "resolved port definition");
                return Ok(Some((tree, definition)));
            }
        }
        Ok(None)
    }
}

impl DefinitionProvider for PortsProvider {
    fn definition(&self, name: &str) -> Result<Option<PortDefinition>> {
        Ok(self
            .definition_with_tree(name)?
            .map(|(_, definition)| definition))
    }
}

impl DefinitionProvider for PortsTree {
    fn definition(&self, name: &str) -> Result<Option<PortDefinition>> {
        self.load(name)
    }
}
