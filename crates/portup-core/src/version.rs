use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Version string declared by a port definition or recorded at install time.
///
/// Staleness is decided by plain inequality of the raw strings. The semver
/// reading is only used to annotate plans with the direction of a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortVersion(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChange {
    Same,
    Upgrade,
    Downgrade,
    Changed,
}

impl PortVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn semver(&self) -> Option<Version> {
        if let Ok(version) = Version::parse(&self.0) {
            return Some(version);
        }
        let dots = self.0.matches('.').count();
        let padded = match dots {
            0 => format!("{}.0.0", self.0),
            1 => format!("{}.0", self.0),
            _ => return None,
        };
        Version::parse(&padded).ok()
    }

    /// Direction of moving from `installed` to `self`.
    pub fn change_from(&self, installed: &PortVersion) -> VersionChange {
        if self == installed {
            return VersionChange::Same;
        }
        match (installed.semver(), self.semver()) {
            (Some(old), Some(new)) if new > old => VersionChange::Upgrade,
            (Some(old), Some(new)) if new < old => VersionChange::Downgrade,
            _ => VersionChange::Changed,
        }
    }
}

impl fmt::Display for PortVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
