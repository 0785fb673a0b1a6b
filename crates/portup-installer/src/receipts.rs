use anyhow::{anyhow, Context, Result};
use portup_core::{InstalledRecord, PackageSpec, PortVersion, Triplet};
use std::fs;
use std::path::PathBuf;

use crate::InstallLayout;

pub fn write_install_receipt(layout: &InstallLayout, record: &InstalledRecord) -> Result<PathBuf> {
    if record.version.as_str().chars().any(char::is_control) {
        return Err(anyhow!(
            "refusing to record '{}': version contains control characters",
            record.spec
        ));
    }

    let mut payload = String::new();
    payload.push_str(&format!("name={}\n", record.spec.name()));
    payload.push_str(&format!("triplet={}\n", record.spec.triplet()));
    payload.push_str(&format!("version={}\n", record.version));
    for dependency in &record.dependencies {
        payload.push_str(&format!("dependency={}\n", dependency));
    }
    payload.push_str(&format!("installed_at_unix={}\n", record.installed_at_unix));

    let dir = layout.installed_state_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create install state directory: {}", dir.display()))?;
    let path = layout.receipt_path(&record.spec);
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write install receipt: {}", path.display()))?;
    Ok(path)
}

pub fn read_install_receipts(layout: &InstallLayout) -> Result<Vec<InstalledRecord>> {
    let dir = layout.installed_state_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read install state directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) != Some("receipt") {
            continue;
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read install receipt: {}", path.display()))?;
        let record = parse_receipt(&raw)
            .with_context(|| format!("failed to parse install receipt: {}", path.display()))?;
        records.push(record);
    }

    records.sort_by(|a, b| a.spec.cmp(&b.spec));
    Ok(records)
}

pub fn remove_install_receipt(layout: &InstallLayout, spec: &PackageSpec) -> Result<bool> {
    let path = layout.receipt_path(spec);
    if !path.exists() {
        return Ok(false);
    }

    fs::remove_file(&path)
        .with_context(|| format!("failed to remove install receipt: {}", path.display()))?;
    Ok(true)
}

pub(crate) fn parse_receipt(raw: &str) -> Result<InstalledRecord> {
    let mut name = None;
    let mut triplet = None;
    let mut version = None;
    let mut dependencies = Vec::new();
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "name" => name = Some(v.to_string()),
            "triplet" => triplet = Some(Triplet::parse(v)?),
            "version" => version = Some(PortVersion::new(v)),
            "dependency" => dependencies.push(v.to_string()),
            "installed_at_unix" => {
                installed_at_unix = Some(v.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    let name = name.context("missing name")?;
    let spec = PackageSpec::new(&name, triplet.context("missing triplet")?)?;
    Ok(InstalledRecord {
        spec,
        version: version.context("missing version")?,
        dependencies,
        installed_at_unix: installed_at_unix.context("missing installed_at_unix")?,
    })
}
