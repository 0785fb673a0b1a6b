use std::collections::BTreeSet;
use std::io::Write;

use portup_core::{
    DefinitionProvider, InstalledPackages, PackageSpec, PortVersion, Triplet, VersionChange,
};
use portup_installer::{perform, ActionOutcome, InstallSummary, KeepGoing, PortBuilder, StatusDb};
use portup_resolver::{
    ActionKind, ActionPlan, BuildOptions, PlanAction, RequestType, UpgradePlanner,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::UpgradeError;
use crate::render::{
    format_elapsed, render_section_header, render_status_line, OutputStyle, TerminalProgress,
};

pub(crate) const UP_TO_DATE_MESSAGE: &str =
    "All installed packages are up-to-date with the local definitions.";
pub(crate) const PREVIEW_MESSAGE: &str =
    "If you are sure you want to rebuild the above packages, run this command with the --no-dry-run option.";

/// Build policy applied to every install action of an upgrade.
pub(crate) const UPGRADE_BUILD_OPTIONS: BuildOptions = BuildOptions {
    use_head_version: false,
    allow_downloads: true,
    retain_buildtrees: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpgradeMode {
    Preview,
    Commit,
}

impl UpgradeMode {
    pub(crate) fn from_no_dry_run(no_dry_run: bool) -> Self {
        if no_dry_run {
            Self::Commit
        } else {
            Self::Preview
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UpgradeOptions {
    pub(crate) mode: UpgradeMode,
    pub(crate) keep_going: KeepGoing,
    pub(crate) style: OutputStyle,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum UpgradeOutcome {
    NothingToUpgrade,
    Executed(InstallSummary),
}

/// Candidate specs partitioned against the installed record and local definitions.
///
/// `not_installed` and `no_definition` may share specs. Every bucket is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SpecClassification {
    pub(crate) up_to_date: Vec<PackageSpec>,
    pub(crate) not_installed: Vec<PackageSpec>,
    pub(crate) no_definition: Vec<PackageSpec>,
    pub(crate) to_upgrade: Vec<PackageSpec>,
}

impl SpecClassification {
    pub(crate) fn ensure_valid(&self) -> Result<(), UpgradeError> {
        if self.not_installed.is_empty() && self.no_definition.is_empty() {
            return Ok(());
        }
        Err(UpgradeError::InvalidSpecs {
            not_installed: self.not_installed.clone(),
            no_definition: self.no_definition.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct OutdatedPackage {
    pub(crate) spec: PackageSpec,
    pub(crate) installed: PortVersion,
    pub(crate) available: PortVersion,
}

pub(crate) fn classify_specs<S, D>(
    candidates: &[PackageSpec],
    status: &S,
    definitions: &D,
) -> anyhow::Result<SpecClassification>
where
    S: InstalledPackages + ?Sized,
    D: DefinitionProvider + ?Sized,
{
    let unique = candidates.iter().collect::<BTreeSet<_>>();
    let mut classification = SpecClassification::default();

    for spec in unique {
        let installed = status.find_installed(spec);
        if installed.is_none() {
            classification.not_installed.push(spec.clone());
        }

        let Some(definition) = definitions.definition(spec.name())? else {
            classification.no_definition.push(spec.clone());
            continue;
        };
        if let Some(record) = installed {
            if record.version != definition.version {
                classification.to_upgrade.push(spec.clone());
            } else {
                classification.up_to_date.push(spec.clone());
            }
        }
    }

    debug!(
        up_to_date = classification.up_to_date.len(),
        not_installed = classification.not_installed.len(),
        no_definition = classification.no_definition.len(),
        to_upgrade = classification.to_upgrade.len(),
        "classified requested specs"
    );
    Ok(classification)
}

/// Every installed package whose local definition declares a different version.
pub(crate) fn find_outdated_packages<S, D>(
    status: &S,
    definitions: &D,
) -> anyhow::Result<Vec<OutdatedPackage>>
where
    S: InstalledPackages + ?Sized,
    D: DefinitionProvider + ?Sized,
{
    let mut outdated = Vec::new();
    for record in status.installed() {
        let Some(definition) = definitions.definition(record.spec.name())? else {
            debug!(spec = %record.spec, "installed package has no definition; skipping");
            continue;
        };
        if definition.version != record.version {
            outdated.push(OutdatedPackage {
                spec: record.spec.clone(),
                installed: record.version.clone(),
                available: definition.version,
            });
        }
    }
    outdated.sort_by(|left, right| left.spec.cmp(&right.spec));
    Ok(outdated)
}

/// Non-builtin triplets a spec may name: those already installed and the default.
pub(crate) fn known_triplets<S>(status: &S, default_triplet: &Triplet) -> BTreeSet<Triplet>
where
    S: InstalledPackages + ?Sized,
{
    let mut known = status
        .installed()
        .into_iter()
        .map(|record| record.spec.triplet().clone())
        .collect::<BTreeSet<_>>();
    known.insert(default_triplet.clone());
    known
}

pub(crate) fn validate_triplets(
    specs: &[PackageSpec],
    known: &BTreeSet<Triplet>,
) -> Result<(), UpgradeError> {
    let unknown = specs
        .iter()
        .filter(|spec| !spec.triplet().is_builtin() && !known.contains(spec.triplet()))
        .cloned()
        .collect::<BTreeSet<_>>();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(UpgradeError::UnknownTriplets(unknown.into_iter().collect()))
}

/// Feeds `targets` to `planner` and returns the plan with repeated actions dropped.
pub(crate) fn build_upgrade_plan<P: UpgradePlanner>(
    mut planner: P,
    targets: &[PackageSpec],
) -> Result<ActionPlan, UpgradeError> {
    for spec in targets {
        planner.request(spec)?;
    }
    let mut plan = planner.serialize()?;
    let dropped = plan.dedup_actions();
    if dropped > 0 {
        debug!(dropped, "dropped repeated plan actions");
    }
    if plan.is_empty() {
        return Err(UpgradeError::EmptyPlan);
    }
    Ok(plan)
}

pub(crate) fn apply_upgrade_build_options(plan: &mut ActionPlan) {
    for install in plan.install_actions_mut() {
        install.build_options = UPGRADE_BUILD_OPTIONS;
    }
}

/// Runs one upgrade: select targets, plan, gate, execute.
///
/// `plan_with` is only called when there is something to upgrade. It receives
/// the status record read-only; the executor borrows it mutably afterwards.
pub(crate) fn run_upgrade<D, B, P, W>(
    specs: &[PackageSpec],
    options: UpgradeOptions,
    status: &mut StatusDb,
    definitions: &D,
    builder: &mut B,
    plan_with: P,
    out: &mut W,
) -> Result<UpgradeOutcome, UpgradeError>
where
    D: DefinitionProvider + ?Sized,
    B: PortBuilder + ?Sized,
    P: FnOnce(&StatusDb, &[PackageSpec]) -> Result<ActionPlan, UpgradeError>,
    W: Write,
{
    let targets = if specs.is_empty() {
        let outdated = find_outdated_packages(&*status, definitions)?;
        if outdated.is_empty() {
            writeln!(out, "{UP_TO_DATE_MESSAGE}")?;
            return Ok(UpgradeOutcome::NothingToUpgrade);
        }
        outdated
            .into_iter()
            .map(|package| package.spec)
            .collect::<Vec<_>>()
    } else {
        let classification = classify_specs(specs, &*status, definitions)?;
        for line in format_classification_lines(&classification, options.style) {
            writeln!(out, "{line}")?;
        }
        classification.ensure_valid()?;
        if classification.to_upgrade.is_empty() {
            return Ok(UpgradeOutcome::NothingToUpgrade);
        }
        classification.to_upgrade
    };

    let mut plan = plan_with(&*status, &targets)?;
    apply_upgrade_build_options(&mut plan);
    for line in format_plan_lines(&plan, options.style) {
        writeln!(out, "{line}")?;
    }

    if options.mode == UpgradeMode::Preview {
        writeln!(
            out,
            "{}",
            render_status_line(options.style, "warn", PREVIEW_MESSAGE)
        )?;
        return Err(UpgradeError::PreviewOnly);
    }

    info!(actions = plan.len(), keep_going = ?options.keep_going, "executing upgrade plan");
    status.layout().ensure_base_dirs()?;
    let mut progress = TerminalProgress::start(options.style, "upgrade", plan.len() as u64);
    let summary = perform(&plan, options.keep_going, status, builder, |index, _| {
        progress.set(index as u64 + 1);
    });
    if let Some(line) = progress.finish() {
        writeln!(out, "{line}")?;
    }
    for line in format_summary_lines(&summary, options.keep_going, options.style) {
        writeln!(out, "{line}")?;
    }

    if options.keep_going == KeepGoing::No {
        if let Some(failure) = summary.first_failure() {
            let reason = match &failure.outcome {
                ActionOutcome::Failed(reason) => reason.clone(),
                _ => String::new(),
            };
            return Err(UpgradeError::ActionFailed {
                spec: failure.spec.clone(),
                reason,
            });
        }
    }
    Ok(UpgradeOutcome::Executed(summary))
}

pub(crate) fn format_classification_lines(
    classification: &SpecClassification,
    style: OutputStyle,
) -> Vec<String> {
    let sections = [
        (
            "ok",
            "The following packages are up-to-date:",
            &classification.up_to_date,
        ),
        (
            "err",
            "The following packages are not installed, so not upgraded:",
            &classification.not_installed,
        ),
        (
            "err",
            "The following packages have no port definition, so cannot be upgraded:",
            &classification.no_definition,
        ),
    ];

    let mut lines = Vec::new();
    for (status, header, specs) in sections {
        if specs.is_empty() {
            continue;
        }
        lines.push(render_status_line(style, status, header));
        lines.extend(specs.iter().map(|spec| format!("    {spec}")));
    }
    lines
}

pub(crate) fn format_plan_lines(plan: &ActionPlan, style: OutputStyle) -> Vec<String> {
    let installed_specs = plan
        .actions()
        .iter()
        .filter_map(PlanAction::install_action)
        .map(|install| &install.spec)
        .collect::<BTreeSet<_>>();

    let mut rebuilt = Vec::new();
    let mut new_installs = Vec::new();
    let mut removed = Vec::new();
    let mut any_auto_selected = false;

    for action in plan.actions() {
        if action.request_type() == RequestType::AutoSelected {
            any_auto_selected = true;
        }
        let marker = match action.request_type() {
            RequestType::AutoSelected => "  * ",
            RequestType::UserRequested => "    ",
        };
        match action {
            PlanAction::Install(install) => match &install.installed_version {
                Some(old) => {
                    let new = &install.definition.version;
                    let direction = match new.change_from(old) {
                        VersionChange::Downgrade => " (downgrade)",
                        _ => "",
                    };
                    rebuilt.push(format!(
                        "{marker}{} {old} -> {new}{direction}",
                        install.spec
                    ));
                }
                None => new_installs.push(format!(
                    "{marker}{} {}",
                    install.spec, install.definition.version
                )),
            },
            PlanAction::Remove(remove) if !installed_specs.contains(&remove.spec) => {
                removed.push(format!("{marker}{} {}", remove.spec, remove.version));
            }
            PlanAction::Remove(_) => {}
        }
    }

    let mut lines = Vec::new();
    for (header, entries) in [
        ("The following packages will be removed:", removed),
        ("The following packages will be rebuilt:", rebuilt),
        ("The following packages will be built and installed:", new_installs),
    ] {
        if entries.is_empty() {
            continue;
        }
        lines.push(render_section_header(style, header));
        lines.extend(entries);
    }
    if any_auto_selected {
        lines.push(
            "Additional packages (*) will be modified to complete this operation.".to_string(),
        );
    }
    lines
}

pub(crate) fn format_summary_lines(
    summary: &InstallSummary,
    keep_going: KeepGoing,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Total elapsed time: {}",
        format_elapsed(summary.total_elapsed)
    )];
    if keep_going == KeepGoing::No {
        return lines;
    }

    lines.push(String::new());
    lines.push(render_section_header(style, "RESULTS"));
    for result in &summary.results {
        lines.push(format!(
            "    {} {}: {}: {}",
            action_kind_label(result.kind),
            result.spec,
            result.outcome.label(),
            format_elapsed(result.elapsed)
        ));
        if let ActionOutcome::Failed(reason) = &result.outcome {
            lines.push(format!("        {reason}"));
        }
    }

    lines.push(String::new());
    lines.push(render_section_header(style, "SUMMARY"));
    for (label, count) in [
        ("SUCCEEDED", summary.succeeded()),
        ("FAILED", summary.failed()),
        ("SKIPPED", summary.skipped()),
    ] {
        if count > 0 {
            lines.push(format!("    {label}: {count}"));
        }
    }
    lines
}

fn action_kind_label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Remove => "remove",
        ActionKind::Install => "install",
    }
}
