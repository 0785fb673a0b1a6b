use std::collections::BTreeMap;

use crate::spec::PackageSpec;
use crate::version::PortVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRecord {
    pub spec: PackageSpec,
    pub version: PortVersion,
    pub dependencies: Vec<String>,
    pub installed_at_unix: u64,
}

/// Read access to the record of installed packages.
pub trait InstalledPackages {
    fn find_installed(&self, spec: &PackageSpec) -> Option<&InstalledRecord>;

    /// Every installed record, sorted by spec.
    fn installed(&self) -> Vec<&InstalledRecord>;
}

impl InstalledPackages for BTreeMap<PackageSpec, InstalledRecord> {
    fn find_installed(&self, spec: &PackageSpec) -> Option<&InstalledRecord> {
        self.get(spec)
    }

    fn installed(&self) -> Vec<&InstalledRecord> {
        self.values().collect()
    }
}

impl<T: InstalledPackages + ?Sized> InstalledPackages for &T {
    fn find_installed(&self, spec: &PackageSpec) -> Option<&InstalledRecord> {
        (**self).find_installed(spec)
    }

    fn installed(&self) -> Vec<&InstalledRecord> {
        (**self).installed()
    }
}

impl<T: InstalledPackages + ?Sized> InstalledPackages for &mut T {
    fn find_installed(&self, spec: &PackageSpec) -> Option<&InstalledRecord> {
        (**self).find_installed(spec)
    }

    fn installed(&self) -> Vec<&InstalledRecord> {
        (**self).installed()
    }
}
