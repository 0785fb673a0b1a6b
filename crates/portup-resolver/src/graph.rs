use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::{anyhow, Context, Result};
use portup_core::{DefinitionProvider, InstalledPackages, PackageSpec, PortDefinition};
use tracing::debug;

use crate::order::topo_order;
use crate::plan::{ActionPlan, BuildOptions, InstallAction, PlanAction, RemoveAction, RequestType};

/// Accumulates upgrade requests for one run and turns them into a plan.
pub trait UpgradePlanner {
    /// Registers `spec` for upgrade. Requesting the same spec twice is a no-op.
    fn request(&mut self, spec: &PackageSpec) -> Result<()>;

    /// Finalizes the plan. With no prior requests the plan is empty.
    fn serialize(self) -> Result<ActionPlan>;
}

/// Reference resolver over the installed-package record and local definitions.
///
/// Each requested spec is rebuilt together with every installed package of the
/// same triplet that depends on it, directly or transitively. Dependencies of
/// rebuilt packages that are missing get installed; installed dependencies are
/// left untouched.
pub struct PackageGraph<'a, S, D> {
    status: &'a S,
    definitions: &'a D,
    requested: BTreeSet<PackageSpec>,
}

impl<'a, S, D> PackageGraph<'a, S, D>
where
    S: InstalledPackages,
    D: DefinitionProvider,
{
    pub fn new(status: &'a S, definitions: &'a D) -> Self {
        Self {
            status,
            definitions,
            requested: BTreeSet::new(),
        }
    }

    fn reinstall_set(&self) -> BTreeSet<PackageSpec> {
        let mut reinstall = self.requested.clone();
        let mut queue: VecDeque<PackageSpec> = self.requested.iter().cloned().collect();

        while let Some(next) = queue.pop_front() {
            for record in self.status.installed() {
                if record.spec.triplet() != next.triplet() || reinstall.contains(&record.spec) {
                    continue;
                }
                if record
                    .dependencies
                    .iter()
                    .any(|dependency| dependency == next.name())
                {
                    debug!(dependent = %record.spec, dependency = %next, "rebuilding dependent");
                    reinstall.insert(record.spec.clone());
                    queue.push_back(record.spec.clone());
                }
            }
        }

        reinstall
    }

    fn load_definition(&self, spec: &PackageSpec) -> Result<PortDefinition> {
        self.definitions
            .definition(spec.name())
            .with_context(|| format!("failed loading definition for '{spec}'"))?
            .ok_or_else(|| anyhow!("no port definition found for '{spec}'"))
    }

    fn dependency_specs(
        &self,
        spec: &PackageSpec,
        dependencies: &[String],
    ) -> Result<BTreeSet<PackageSpec>> {
        dependencies
            .iter()
            .map(|name| {
                PackageSpec::new(name, spec.triplet().clone())
                    .with_context(|| format!("invalid dependency of '{spec}'"))
            })
            .collect()
    }
}

impl<S, D> UpgradePlanner for PackageGraph<'_, S, D>
where
    S: InstalledPackages,
    D: DefinitionProvider,
{
    fn request(&mut self, spec: &PackageSpec) -> Result<()> {
        if self.status.find_installed(spec).is_none() {
            return Err(anyhow!("cannot upgrade '{spec}': it is not installed"));
        }
        if self.requested.insert(spec.clone()) {
            debug!(%spec, "upgrade requested");
        }
        Ok(())
    }

    fn serialize(self) -> Result<ActionPlan> {
        if self.requested.is_empty() {
            return Ok(ActionPlan::default());
        }

        let reinstall = self.reinstall_set();
        let mut definitions: BTreeMap<PackageSpec, PortDefinition> = BTreeMap::new();
        let mut queue: VecDeque<PackageSpec> = VecDeque::new();
        for spec in &reinstall {
            definitions.insert(spec.clone(), self.load_definition(spec)?);
            queue.push_back(spec.clone());
        }

        let mut new_installs = BTreeSet::new();
        let mut install_edges: BTreeMap<PackageSpec, BTreeSet<PackageSpec>> = BTreeMap::new();
        while let Some(next) = queue.pop_front() {
            let dependencies = match definitions.get(&next) {
                Some(definition) => self.dependency_specs(&next, &definition.dependencies)?,
                None => BTreeSet::new(),
            };
            for dependency in &dependencies {
                if definitions.contains_key(dependency)
                    || self.status.find_installed(dependency).is_some()
                {
                    continue;
                }
                debug!(%dependency, dependent = %next, "installing missing dependency");
                definitions.insert(dependency.clone(), self.load_definition(dependency)?);
                new_installs.insert(dependency.clone());
                queue.push_back(dependency.clone());
            }
            install_edges.insert(next, dependencies);
        }

        let mut remove_edges: BTreeMap<PackageSpec, BTreeSet<PackageSpec>> = BTreeMap::new();
        for spec in &reinstall {
            let record = self
                .status
                .find_installed(spec)
                .ok_or_else(|| anyhow!("installed record for '{spec}' disappeared"))?;
            remove_edges.insert(
                spec.clone(),
                self.dependency_specs(spec, &record.dependencies)?,
            );
        }

        let mut actions = Vec::new();
        for spec in topo_order(&remove_edges)?.into_iter().rev() {
            let record = self
                .status
                .find_installed(&spec)
                .ok_or_else(|| anyhow!("installed record for '{spec}' disappeared"))?;
            actions.push(PlanAction::Remove(RemoveAction {
                version: record.version.clone(),
                request_type: request_type(&self.requested, &spec),
                spec,
            }));
        }

        for spec in topo_order(&install_edges)? {
            let definition = definitions
                .remove(&spec)
                .ok_or_else(|| anyhow!("definition for '{spec}' was not loaded"))?;
            let installed_version = self
                .status
                .find_installed(&spec)
                .map(|record| record.version.clone());
            actions.push(PlanAction::Install(InstallAction {
                request_type: request_type(&self.requested, &spec),
                spec,
                definition,
                build_options: BuildOptions::default(),
                installed_version,
            }));
        }

        debug!(
            requested = self.requested.len(),
            rebuilt = reinstall.len(),
            installed = new_installs.len(),
            "serialized upgrade plan"
        );
        Ok(ActionPlan::new(actions))
    }
}

fn request_type(requested: &BTreeSet<PackageSpec>, spec: &PackageSpec) -> RequestType {
    if requested.contains(spec) {
        RequestType::UserRequested
    } else {
        RequestType::AutoSelected
    }
}
