use portup_core::PackageSpec;
use thiserror::Error;

/// Ways an upgrade run can end without completing every action.
#[derive(Debug, Error)]
pub(crate) enum UpgradeError {
    #[error("{}", invalid_specs_message(.not_installed, .no_definition))]
    InvalidSpecs {
        not_installed: Vec<PackageSpec>,
        no_definition: Vec<PackageSpec>,
    },
    #[error("unknown triplet for: {}", join_specs(.0))]
    UnknownTriplets(Vec<PackageSpec>),
    #[error("upgrade plan is empty although packages were selected")]
    EmptyPlan,
    /// The plan was printed but nothing was applied.
    #[error("dry run only; nothing was changed")]
    PreviewOnly,
    #[error("upgrade stopped after '{spec}' failed: {reason}")]
    ActionFailed { spec: PackageSpec, reason: String },
    #[error("failed writing output")]
    Output(#[from] std::io::Error),
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl UpgradeError {
    /// Process exit status for this error. Usage errors are reported by clap.
    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            Self::PreviewOnly => 3,
            _ => 1,
        }
    }
}

fn invalid_specs_message(not_installed: &[PackageSpec], no_definition: &[PackageSpec]) -> String {
    let mut parts = Vec::new();
    if !not_installed.is_empty() {
        parts.push(format!("not installed: {}", join_specs(not_installed)));
    }
    if !no_definition.is_empty() {
        parts.push(format!("no port definition: {}", join_specs(no_definition)));
    }
    format!("cannot upgrade requested packages ({})", parts.join("; "))
}

fn join_specs(specs: &[PackageSpec]) -> String {
    specs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
