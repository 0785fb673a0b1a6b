use std::fmt;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

/// Triplets every installation understands without further configuration.
pub const BUILTIN_TRIPLETS: &[&str] = &[
    "x86-windows",
    "x64-windows",
    "arm64-windows",
    "x64-linux",
    "arm64-linux",
    "x64-osx",
    "arm64-osx",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Triplet(String);

impl Triplet {
    pub fn parse(value: &str) -> Result<Self> {
        validate_identifier(value).with_context(|| format!("invalid triplet '{value}'"))?;
        Ok(Self(value.to_string()))
    }

    /// Triplet of the machine running portup.
    pub fn host() -> Self {
        let arch = if cfg!(target_arch = "aarch64") {
            "arm64"
        } else if cfg!(target_arch = "x86") {
            "x86"
        } else {
            "x64"
        };
        let os = if cfg!(windows) {
            "windows"
        } else if cfg!(target_os = "macos") {
            "osx"
        } else {
            "linux"
        };
        Self(format!("{arch}-{os}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_builtin(&self) -> bool {
        BUILTIN_TRIPLETS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One package instance: a port name built for one triplet.
///
/// Ordering is by name first, then triplet, which keeps grouped output stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackageSpec {
    name: String,
    triplet: Triplet,
}

impl PackageSpec {
    pub fn new(name: &str, triplet: Triplet) -> Result<Self> {
        validate_identifier(name).with_context(|| format!("invalid package name '{name}'"))?;
        Ok(Self {
            name: name.to_string(),
            triplet,
        })
    }

    /// Parses `name` or `name:triplet`, filling in `default_triplet` when the
    /// triplet is omitted.
    pub fn parse(input: &str, default_triplet: &Triplet) -> Result<Self> {
        let trimmed = input.trim();
        match trimmed.split_once(':') {
            Some((name, triplet)) => {
                let triplet = Triplet::parse(triplet)
                    .with_context(|| format!("invalid package spec '{trimmed}'"))?;
                Self::new(name, triplet)
                    .with_context(|| format!("invalid package spec '{trimmed}'"))
            }
            None => Self::new(trimmed, default_triplet.clone())
                .with_context(|| format!("invalid package spec '{trimmed}'")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn triplet(&self) -> &Triplet {
        &self.triplet
    }

    /// Filesystem-safe token used for per-spec state files and directories.
    pub fn dir_token(&self) -> String {
        format!("{}_{}", self.name, self.triplet)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.triplet)
    }
}

pub(crate) fn validate_identifier(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(anyhow!("identifier must not be empty"));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(anyhow!(
            "identifier must not start or end with '-': {value}"
        ));
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
    {
        return Err(anyhow!(
            "identifier may only contain lowercase ASCII letters, digits and '-': {value}"
        ));
    }
    Ok(())
}
