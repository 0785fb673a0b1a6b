use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use portup_core::{InstalledPackages, InstalledRecord, PackageSpec};
use tracing::debug;

use crate::receipts::{read_install_receipts, remove_install_receipt, write_install_receipt};
use crate::InstallLayout;

/// Installed-package record backed by receipt files under the layout root.
///
/// Mutations reach disk before the in-memory view is updated.
#[derive(Debug, Clone)]
pub struct StatusDb {
    layout: InstallLayout,
    records: BTreeMap<PackageSpec, InstalledRecord>,
}

impl StatusDb {
    pub fn load(layout: &InstallLayout) -> Result<Self> {
        let records = read_install_receipts(layout)?
            .into_iter()
            .map(|record| (record.spec.clone(), record))
            .collect::<BTreeMap<_, _>>();
        debug!(count = records.len(), root = %layout.root().display(), "loaded status database");
        Ok(Self {
            layout: layout.clone(),
            records,
        })
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mark_installed(&mut self, record: InstalledRecord) -> Result<()> {
        write_install_receipt(&self.layout, &record)?;
        debug!(spec = %record.spec, version = %record.version, "recorded install");
        self.records.insert(record.spec.clone(), record);
        Ok(())
    }

    /// Deletes the installed files of `spec`, then its receipt. Returns whether
    /// anything was recorded for it.
    ///
    /// The receipt outlives the files, so a failed removal leaves the package
    /// recorded as installed both on disk and in memory.
    pub fn mark_removed(&mut self, spec: &PackageSpec) -> Result<bool> {
        let package_dir = self.layout.package_dir(spec);
        if package_dir.exists() {
            fs::remove_dir_all(&package_dir).with_context(|| {
                format!(
                    "failed to remove installed files: {}",
                    package_dir.display()
                )
            })?;
        }
        let had_receipt = remove_install_receipt(&self.layout, spec)?;
        let had_record = self.records.remove(spec).is_some();
        debug!(%spec, "recorded removal");
        Ok(had_receipt || had_record)
    }
}

impl InstalledPackages for StatusDb {
    fn find_installed(&self, spec: &PackageSpec) -> Option<&InstalledRecord> {
        self.records.get(spec)
    }

    fn installed(&self) -> Vec<&InstalledRecord> {
        self.records.values().collect()
    }
}
