use std::collections::HashSet;

use portup_core::{PackageSpec, PortDefinition, PortVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    UserRequested,
    AutoSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub use_head_version: bool,
    pub allow_downloads: bool,
    pub retain_buildtrees: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            use_head_version: false,
            allow_downloads: true,
            retain_buildtrees: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAction {
    pub spec: PackageSpec,
    pub definition: PortDefinition,
    pub request_type: RequestType,
    pub build_options: BuildOptions,
    /// Version being replaced, when the spec is currently installed.
    pub installed_version: Option<PortVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveAction {
    pub spec: PackageSpec,
    pub version: PortVersion,
    pub request_type: RequestType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Remove,
    Install,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Remove(RemoveAction),
    Install(InstallAction),
}

impl PlanAction {
    pub fn spec(&self) -> &PackageSpec {
        match self {
            Self::Remove(action) => &action.spec,
            Self::Install(action) => &action.spec,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Remove(_) => ActionKind::Remove,
            Self::Install(_) => ActionKind::Install,
        }
    }

    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Remove(action) => action.request_type,
            Self::Install(action) => action.request_type,
        }
    }

    pub fn install_action(&self) -> Option<&InstallAction> {
        match self {
            Self::Install(action) => Some(action),
            Self::Remove(_) => None,
        }
    }
}

/// Ordered actions; every action's dependencies appear before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    actions: Vec<PlanAction>,
}

impl ActionPlan {
    pub fn new(actions: Vec<PlanAction>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[PlanAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn install_actions_mut(&mut self) -> impl Iterator<Item = &mut InstallAction> {
        self.actions.iter_mut().filter_map(|action| match action {
            PlanAction::Install(install) => Some(install),
            PlanAction::Remove(_) => None,
        })
    }

    /// Drops repeated `(kind, spec)` actions, keeping the first occurrence.
    /// Returns how many actions were dropped.
    pub fn dedup_actions(&mut self) -> usize {
        let before = self.actions.len();
        let mut seen = HashSet::new();
        self.actions
            .retain(|action| seen.insert((action.kind(), action.spec().clone())));
        before - self.actions.len()
    }
}
