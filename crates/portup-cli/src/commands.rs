use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use portup_core::{InstalledPackages, PackageSpec, PortVersion, Triplet};
use portup_installer::{CommandBuilder, InstallLayout, KeepGoing, StatusDb};
use portup_resolver::PackageGraph;
use serde::Serialize;
use tracing::debug;

use crate::config::{load_config, ports_provider, resolve_default_triplet, resolve_root};
use crate::error::UpgradeError;
use crate::render::OutputStyle;
use crate::upgrade::{
    build_upgrade_plan, find_outdated_packages, known_triplets, run_upgrade, validate_triplets,
    UpgradeMode, UpgradeOptions,
};

/// Installed package as printed by `list --json`.
#[derive(Debug, Serialize)]
struct InstalledView<'a> {
    spec: &'a PackageSpec,
    version: &'a PortVersion,
    dependencies: &'a [String],
    installed_at_unix: u64,
}

pub(crate) struct UpgradeArgs {
    pub(crate) specs: Vec<String>,
    pub(crate) no_dry_run: bool,
    pub(crate) keep_going: bool,
    pub(crate) triplet: Option<String>,
}

pub(crate) fn open_layout(root_flag: Option<PathBuf>) -> Result<InstallLayout> {
    let root = resolve_root(root_flag, std::env::var("PORTUP_ROOT").ok().as_deref())?;
    debug!(root = %root.display(), "using portup root");
    Ok(InstallLayout::new(root))
}

pub(crate) fn run_upgrade_command<W: Write>(
    layout: &InstallLayout,
    args: UpgradeArgs,
    style: OutputStyle,
    out: &mut W,
) -> Result<(), UpgradeError> {
    let mode = UpgradeMode::from_no_dry_run(args.no_dry_run);
    let keep_going = KeepGoing::from(args.keep_going);

    let config = load_config(layout)?;
    let default_triplet = resolve_default_triplet(
        args.triplet.as_deref(),
        std::env::var("PORTUP_DEFAULT_TRIPLET").ok().as_deref(),
        &config,
    )?;
    let specs = parse_specs(&args.specs, &default_triplet)?;

    let provider = ports_provider(layout, &config);
    let mut status = StatusDb::load(layout)?;
    validate_triplets(&specs, &known_triplets(&status, &default_triplet))?;

    let mut builder = CommandBuilder::new(layout.clone());
    let options = UpgradeOptions {
        mode,
        keep_going,
        style,
    };
    run_upgrade(
        &specs,
        options,
        &mut status,
        &provider,
        &mut builder,
        |status, targets| build_upgrade_plan(PackageGraph::new(status, &provider), targets),
        out,
    )?;
    Ok(())
}

pub(crate) fn run_list_command<W: Write>(
    layout: &InstallLayout,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let status = StatusDb::load(layout)?;
    if status.is_empty() && !json {
        writeln!(out, "No packages installed.")?;
        return Ok(());
    }

    let records = status.installed();
    if json {
        let views = records
            .iter()
            .map(|record| InstalledView {
                spec: &record.spec,
                version: &record.version,
                dependencies: &record.dependencies,
                installed_at_unix: record.installed_at_unix,
            })
            .collect::<Vec<_>>();
        serde_json::to_writer_pretty(&mut *out, &views)
            .context("failed to serialize installed packages")?;
        writeln!(out)?;
        return Ok(());
    }

    for record in records {
        writeln!(out, "{} {}", record.spec, record.version)?;
    }
    Ok(())
}

pub(crate) fn run_outdated_command<W: Write>(
    layout: &InstallLayout,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let config = load_config(layout)?;
    let provider = ports_provider(layout, &config);
    let status = StatusDb::load(layout)?;
    let outdated = find_outdated_packages(&status, &provider)?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &outdated)
            .context("failed to serialize outdated packages")?;
        writeln!(out)?;
        return Ok(());
    }

    if outdated.is_empty() {
        writeln!(out, "{}", crate::upgrade::UP_TO_DATE_MESSAGE)?;
    }
    for package in outdated {
        writeln!(
            out,
            "{}  {} -> {}",
            package.spec, package.installed, package.available
        )?;
    }
    Ok(())
}

fn parse_specs(inputs: &[String], default_triplet: &Triplet) -> Result<Vec<PackageSpec>> {
    inputs
        .iter()
        .map(|input| PackageSpec::parse(input, default_triplet))
        .collect()
}
