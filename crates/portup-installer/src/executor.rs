use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use portup_core::{InstalledRecord, PackageSpec};
use portup_resolver::{ActionKind, ActionPlan, InstallAction, PlanAction};
use tracing::{debug, info, warn};

use crate::{PortBuilder, StatusDb};

/// Failure tolerance while executing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepGoing {
    No,
    Yes,
}

impl From<bool> for KeepGoing {
    fn from(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed(String),
    /// Not attempted because an earlier action failed.
    Skipped,
}

impl ActionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Failed(_) => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub spec: PackageSpec,
    pub kind: ActionKind,
    pub outcome: ActionOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub results: Vec<ActionResult>,
    pub total_elapsed: Duration,
}

impl InstallSummary {
    pub fn first_failure(&self) -> Option<&ActionResult> {
        self.results
            .iter()
            .find(|result| matches!(result.outcome, ActionOutcome::Failed(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, ActionOutcome::Failed(_)))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|outcome| *outcome == ActionOutcome::Succeeded)
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| *outcome == ActionOutcome::Skipped)
    }

    fn count(&self, predicate: impl Fn(&ActionOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|result| predicate(&result.outcome))
            .count()
    }
}

/// Applies `plan` in order against `status`, delegating builds to `builder`.
///
/// With `KeepGoing::No` the first failure stops the run and every later action
/// is reported as skipped. Mutations made by earlier actions are kept.
/// `on_action` is called after each attempted action with its index.
pub fn perform<B, F>(
    plan: &ActionPlan,
    keep_going: KeepGoing,
    status: &mut StatusDb,
    builder: &mut B,
    mut on_action: F,
) -> InstallSummary
where
    B: PortBuilder + ?Sized,
    F: FnMut(usize, &ActionResult),
{
    let started = Instant::now();
    let mut results = Vec::with_capacity(plan.len());
    let mut stopped = false;

    for (index, action) in plan.actions().iter().enumerate() {
        if stopped {
            results.push(ActionResult {
                spec: action.spec().clone(),
                kind: action.kind(),
                outcome: ActionOutcome::Skipped,
                elapsed: Duration::ZERO,
            });
            continue;
        }

        let action_started = Instant::now();
        let applied = match action {
            PlanAction::Remove(remove) => status.mark_removed(&remove.spec).map(|_| ()),
            PlanAction::Install(install) => apply_install(install, status, builder),
        };
        let outcome = match applied {
            Ok(()) => {
                info!(spec = %action.spec(), kind = ?action.kind(), "action succeeded");
                ActionOutcome::Succeeded
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(
                    spec = %action.spec(),
                    kind = ?action.kind(),
                    error = %reason,
                    "action failed"
                );
                if keep_going == KeepGoing::No {
                    stopped = true;
                }
                ActionOutcome::Failed(reason)
            }
        };

        let result = ActionResult {
            spec: action.spec().clone(),
            kind: action.kind(),
            outcome,
            elapsed: action_started.elapsed(),
        };
        on_action(index, &result);
        results.push(result);
    }

    let summary = InstallSummary {
        results,
        total_elapsed: started.elapsed(),
    };
    debug!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        skipped = summary.skipped(),
        "plan execution finished"
    );
    summary
}

fn apply_install<B: PortBuilder + ?Sized>(
    action: &InstallAction,
    status: &mut StatusDb,
    builder: &mut B,
) -> Result<()> {
    builder.build(action)?;
    status.mark_installed(InstalledRecord {
        spec: action.spec.clone(),
        version: action.definition.version.clone(),
        dependencies: action.definition.dependencies.clone(),
        installed_at_unix: current_unix_timestamp()?,
    })
}

fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before unix epoch")?
        .as_secs())
}
