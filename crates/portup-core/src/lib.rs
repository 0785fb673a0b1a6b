mod definition;
mod installed;
mod provider;
mod spec;
mod version;

pub use definition::PortDefinition;
pub use installed::{InstalledPackages, InstalledRecord};
pub use provider::DefinitionProvider;
pub use spec::{PackageSpec, Triplet, BUILTIN_TRIPLETS};
pub use version::{PortVersion, VersionChange};

#[cfg(test)]
mod tests;
