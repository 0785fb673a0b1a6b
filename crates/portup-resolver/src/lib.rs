mod graph;
mod order;
mod plan;

pub use graph::{PackageGraph, UpgradePlanner};
pub use plan::{
    ActionKind, ActionPlan, BuildOptions, InstallAction, PlanAction, RemoveAction, RequestType,
};
