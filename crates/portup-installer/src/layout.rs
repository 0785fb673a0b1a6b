use anyhow::{Context, Result};
use portup_core::PackageSpec;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn ports_dir(&self) -> PathBuf {
        self.root.join("ports")
    }

    pub fn installed_state_dir(&self) -> PathBuf {
        self.root.join("installed")
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    pub fn buildtrees_dir(&self) -> PathBuf {
        self.root.join("buildtrees")
    }

    pub fn receipt_path(&self, spec: &PackageSpec) -> PathBuf {
        self.installed_state_dir()
            .join(format!("{}.receipt", spec.dir_token()))
    }

    pub fn package_dir(&self, spec: &PackageSpec) -> PathBuf {
        self.packages_dir().join(spec.dir_token())
    }

    pub fn buildtree_path(&self, spec: &PackageSpec) -> PathBuf {
        self.buildtrees_dir().join(spec.dir_token())
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.ports_dir(),
            self.installed_state_dir(),
            self.packages_dir(),
            self.buildtrees_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows portup root")?;
        return Ok(PathBuf::from(app_data).join("Portup"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve portup root")?;
    Ok(PathBuf::from(home).join(".portup"))
}
