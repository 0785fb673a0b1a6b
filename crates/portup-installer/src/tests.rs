use super::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use portup_core::{
    InstalledPackages, InstalledRecord, PackageSpec, PortDefinition, PortVersion, Triplet,
};
use portup_resolver::{
    ActionKind, ActionPlan, BuildOptions, InstallAction, PlanAction, RemoveAction, RequestType,
};

use crate::receipts::parse_receipt;

static TEST_LAYOUT_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Default)]
struct ScriptedBuilder {
    failing: BTreeSet<String>,
    attempted: Vec<String>,
}

impl ScriptedBuilder {
    fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(ToString::to_string).collect(),
            attempted: Vec::new(),
        }
    }
}

impl PortBuilder for ScriptedBuilder {
    fn build(&mut self, action: &InstallAction) -> anyhow::Result<()> {
        self.attempted.push(action.spec.name().to_string());
        if self.failing.contains(action.spec.name()) {
            return Err(anyhow!("scripted failure for {}", action.spec));
        }
        Ok(())
    }
}

fn linux() -> Triplet {
    Triplet::parse("x64-linux").expect("valid triplet")
}

fn spec(name: &str) -> PackageSpec {
    PackageSpec::new(name, linux()).expect("valid spec")
}

fn record(name: &str, version: &str) -> InstalledRecord {
    InstalledRecord {
        spec: spec(name),
        version: PortVersion::new(version),
        dependencies: Vec::new(),
        installed_at_unix: 100,
    }
}

fn install_action(name: &str, version: &str, build: Option<Vec<String>>) -> PlanAction {
    PlanAction::Install(InstallAction {
        spec: spec(name),
        definition: PortDefinition {
            name: name.to_string(),
            version: PortVersion::new(version),
            description: None,
            dependencies: Vec::new(),
            build,
        },
        request_type: RequestType::UserRequested,
        build_options: BuildOptions::default(),
        installed_version: None,
    })
}

fn three_install_plan() -> ActionPlan {
    ActionPlan::new(vec![
        install_action("zlib", "1.3.1", None),
        install_action("libpng", "1.6.43", None),
        install_action("freetype", "2.13.3", None),
    ])
}

#[test]
fn parse_receipt_shape() {
    let raw = "name=libpng\ntriplet=x64-linux\nversion=1.6.43\ndependency=zlib\ninstalled_at_unix=123\nfuture_key=ignored\n";
    let parsed = parse_receipt(raw).expect("must parse");
    assert_eq!(parsed.spec.to_string(), "libpng:x64-linux");
    assert_eq!(parsed.version.as_str(), "1.6.43");
    assert_eq!(parsed.dependencies, vec!["zlib"]);
    assert_eq!(parsed.installed_at_unix, 123);
}

#[test]
fn parse_receipt_requires_triplet() {
    let err = parse_receipt("name=zlib\nversion=1.3.1\ninstalled_at_unix=1\n")
        .expect_err("missing triplet must fail");
    assert!(err.to_string().contains("missing triplet"));
}

#[test]
fn parse_receipt_rejects_bad_timestamp() {
    let err = parse_receipt("name=zlib\ntriplet=x64-linux\nversion=1.3.1\ninstalled_at_unix=soon\n")
        .expect_err("bad timestamp must fail");
    assert!(err.to_string().contains("installed_at_unix must be u64"));
}

#[test]
fn receipt_round_trip() {
    let layout = test_layout();
    let mut written = record("libpng", "1.6.43");
    written.dependencies = vec!["zlib".to_string()];
    let path = write_install_receipt(&layout, &written).expect("must write receipt");
    assert_eq!(path, layout.receipt_path(&spec("libpng")));

    let records = read_install_receipts(&layout).expect("must read receipts");
    assert_eq!(records, vec![written]);

    assert!(remove_install_receipt(&layout, &spec("libpng")).expect("must remove"));
    assert!(!remove_install_receipt(&layout, &spec("libpng")).expect("must be idempotent"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn receipt_refuses_multiline_version() {
    let layout = test_layout();
    let written = record("zlib", "1.0\nrc");

    let err = write_install_receipt(&layout, &written).expect_err("multi-line version must fail");
    assert!(err.to_string().contains("control characters"));
    assert!(!layout.receipt_path(&spec("zlib")).exists());

    let mut status = StatusDb::load(&layout).expect("must load");
    assert!(status.mark_installed(written).is_err());
    assert!(status.find_installed(&spec("zlib")).is_none());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn read_receipts_without_state_dir_is_empty() {
    let layout = test_layout();
    assert!(read_install_receipts(&layout)
        .expect("must read receipts")
        .is_empty());
}

#[test]
fn layout_paths_are_keyed_by_spec() {
    let layout = InstallLayout::new("/opt/portup");
    assert_eq!(
        layout.receipt_path(&spec("zlib")),
        PathBuf::from("/opt/portup/installed/zlib_x64-linux.receipt")
    );
    assert_eq!(
        layout.package_dir(&spec("zlib")),
        PathBuf::from("/opt/portup/packages/zlib_x64-linux")
    );
    assert_eq!(
        layout.buildtree_path(&spec("zlib")),
        PathBuf::from("/opt/portup/buildtrees/zlib_x64-linux")
    );
    assert_eq!(layout.config_path(), PathBuf::from("/opt/portup/config.toml"));
}

#[test]
fn status_db_tracks_installs_and_removals() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");

    let mut status = StatusDb::load(&layout).expect("must load");
    assert!(status.is_empty());

    status
        .mark_installed(record("zlib", "1.3.1"))
        .expect("must record install");
    fs::create_dir_all(layout.package_dir(&spec("zlib"))).expect("must create package dir");

    let reloaded = StatusDb::load(&layout).expect("must reload");
    assert_eq!(reloaded.installed().len(), 1);
    assert_eq!(
        reloaded
            .find_installed(&spec("zlib"))
            .map(|r| r.version.as_str()),
        Some("1.3.1")
    );

    assert!(status.mark_removed(&spec("zlib")).expect("must remove"));
    assert!(status.find_installed(&spec("zlib")).is_none());
    assert!(!layout.package_dir(&spec("zlib")).exists());
    assert!(StatusDb::load(&layout).expect("must reload").is_empty());

    let _ = fs::remove_dir_all(layout.root());
}

#[cfg(unix)]
#[test]
fn failed_removal_keeps_package_recorded() {
    let layout = test_layout();
    let mut status = StatusDb::load(&layout).expect("must load");
    status
        .mark_installed(record("zlib", "1.3.1"))
        .expect("must record install");
    fs::create_dir_all(layout.packages_dir()).expect("must create packages dir");
    fs::write(layout.package_dir(&spec("zlib")), b"not a directory")
        .expect("must write blocking file");

    let err = status
        .mark_removed(&spec("zlib"))
        .expect_err("removing a plain file as a package dir must fail");
    assert!(err.to_string().contains("failed to remove installed files"));

    assert!(status.find_installed(&spec("zlib")).is_some());
    assert!(layout.receipt_path(&spec("zlib")).exists());
    let reloaded = StatusDb::load(&layout).expect("must reload");
    assert!(reloaded.find_installed(&spec("zlib")).is_some());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn perform_stops_on_first_failure() {
    let layout = test_layout();
    let mut status = StatusDb::load(&layout).expect("must load");
    let mut builder = ScriptedBuilder::failing(&["libpng"]);
    let mut reported = Vec::new();

    let summary = perform(
        &three_install_plan(),
        KeepGoing::No,
        &mut status,
        &mut builder,
        |index, _| reported.push(index),
    );

    assert_eq!(builder.attempted, vec!["zlib", "libpng"]);
    assert_eq!(reported, vec![0, 1]);
    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.results[0].outcome, ActionOutcome::Succeeded);
    assert!(matches!(summary.results[1].outcome, ActionOutcome::Failed(_)));
    assert_eq!(summary.results[2].outcome, ActionOutcome::Skipped);
    assert_eq!(
        summary.first_failure().map(|r| r.spec.to_string()),
        Some("libpng:x64-linux".to_string())
    );
    assert!(status.find_installed(&spec("zlib")).is_some());
    assert!(status.find_installed(&spec("freetype")).is_none());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn perform_keep_going_attempts_every_action() {
    let layout = test_layout();
    let mut status = StatusDb::load(&layout).expect("must load");
    let mut builder = ScriptedBuilder::failing(&["libpng"]);

    let summary = perform(
        &three_install_plan(),
        KeepGoing::Yes,
        &mut status,
        &mut builder,
        |_, _| {},
    );

    assert_eq!(builder.attempted, vec!["zlib", "libpng", "freetype"]);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.skipped(), 0);
    match &summary.results[1].outcome {
        ActionOutcome::Failed(reason) => {
            assert!(reason.contains("scripted failure for libpng:x64-linux"))
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(status.find_installed(&spec("freetype")).is_some());
    assert!(status.find_installed(&spec("libpng")).is_none());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn perform_removal_then_install_replaces_record() {
    let layout = test_layout();
    let mut status = StatusDb::load(&layout).expect("must load");
    status
        .mark_installed(record("zlib", "1.3.0"))
        .expect("must seed install");

    let plan = ActionPlan::new(vec![
        PlanAction::Remove(RemoveAction {
            spec: spec("zlib"),
            version: PortVersion::new("1.3.0"),
            request_type: RequestType::UserRequested,
        }),
        install_action("zlib", "1.3.1", None),
    ]);
    let mut builder = ScriptedBuilder::default();
    let summary = perform(&plan, KeepGoing::No, &mut status, &mut builder, |_, _| {});

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.results[0].kind, ActionKind::Remove);
    assert_eq!(
        status
            .find_installed(&spec("zlib"))
            .map(|r| r.version.as_str()),
        Some("1.3.1")
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn perform_empty_plan_is_empty_summary() {
    let layout = test_layout();
    let mut status = StatusDb::load(&layout).expect("must load");
    let mut builder = ScriptedBuilder::default();
    let summary = perform(
        &ActionPlan::default(),
        KeepGoing::No,
        &mut status,
        &mut builder,
        |_, _| {},
    );
    assert!(summary.results.is_empty());
    assert!(summary.first_failure().is_none());
}

#[cfg(unix)]
#[test]
fn command_builder_runs_build_command_and_cleans_buildtree() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");

    let mut action = install_action(
        "zlib",
        "1.3.1",
        Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf '%s %s %s' \"$PORTUP_VERSION\" \"$PORTUP_TRIPLET\" \"$PORTUP_ALLOW_DOWNLOADS\" > \"$PORTUP_INSTALL_DIR/marker\"".to_string(),
        ]),
    );
    if let PlanAction::Install(install) = &mut action {
        install.build_options.retain_buildtrees = false;
    }
    let PlanAction::Install(install) = &action else {
        panic!("expected install action");
    };

    let mut builder = CommandBuilder::new(layout.clone());
    builder.build(install).expect("build must succeed");

    let marker = fs::read_to_string(layout.package_dir(&spec("zlib")).join("marker"))
        .expect("marker must exist");
    assert_eq!(marker, "1.3.1 x64-linux 1");
    assert!(!layout.buildtree_path(&spec("zlib")).exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[cfg(unix)]
#[test]
fn command_builder_reports_failing_command() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");

    let action = install_action(
        "zlib",
        "1.3.1",
        Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo broken >&2; exit 3".to_string(),
        ]),
    );
    let PlanAction::Install(install) = &action else {
        panic!("expected install action");
    };

    let mut builder = CommandBuilder::new(layout.clone());
    let err = builder.build(install).expect_err("build must fail");
    let message = err.to_string();
    assert!(message.contains("build of 'zlib:x64-linux' failed"));
    assert!(message.contains("stderr='broken'"));
    assert!(!layout.package_dir(&spec("zlib")).exists());
    assert!(layout.buildtree_path(&spec("zlib")).exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn command_builder_without_build_command_creates_install_dir() {
    let layout = test_layout();
    let PlanAction::Install(install) = install_action("zlib", "1.3.1", None) else {
        panic!("expected install action");
    };

    let mut builder = CommandBuilder::new(layout.clone());
    builder.build(&install).expect("build must succeed");
    assert!(layout.package_dir(&spec("zlib")).is_dir());
    assert!(layout.buildtree_path(&spec("zlib")).is_dir());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn keep_going_from_flag() {
    assert_eq!(KeepGoing::from(true), KeepGoing::Yes);
    assert_eq!(KeepGoing::from(false), KeepGoing::No);
}

fn build_test_layout_path(nanos: u128) -> PathBuf {
    let mut path = std::env::temp_dir();
    let sequence = TEST_LAYOUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "portup-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    path
}

fn test_layout() -> InstallLayout {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    InstallLayout::new(build_test_layout_path(nanos))
}
