use std::collections::BTreeMap;

use anyhow::Result;

use crate::definition::PortDefinition;

/// Source of locally available port definitions.
///
/// Definitions are keyed by port name only; every triplet of a port shares one
/// definition.
pub trait DefinitionProvider {
    fn definition(&self, name: &str) -> Result<Option<PortDefinition>>;
}

impl DefinitionProvider for BTreeMap<String, PortDefinition> {
    fn definition(&self, name: &str) -> Result<Option<PortDefinition>> {
        Ok(self.get(name).cloned())
    }
}

impl<T: DefinitionProvider + ?Sized> DefinitionProvider for &T {
    fn definition(&self, name: &str) -> Result<Option<PortDefinition>> {
        (**self).definition(name)
    }
}
