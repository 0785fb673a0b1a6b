use std::collections::BTreeMap;

use super::*;

fn linux() -> Triplet {
    Triplet::parse("x64-linux").expect("valid triplet")
}

#[test]
fn parse_port_definition() {
    let content = r#"
name = "libpng"
version = "1.6.43"
description = "PNG reference library"
dependencies = ["zlib"]
build = ["sh", "-c", "make install"]
"#;

    let parsed = PortDefinition::from_toml_str(content).expect("definition should parse");
    assert_eq!(parsed.name, "libpng");
    assert_eq!(parsed.version.as_str(), "1.6.43");
    assert_eq!(parsed.description.as_deref(), Some("PNG reference library"));
    assert_eq!(parsed.dependencies, vec!["zlib"]);
    assert_eq!(
        parsed.build,
        Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            "make install".to_string()
        ])
    );
}

#[test]
fn parse_minimal_port_definition() {
    let parsed = PortDefinition::from_toml_str("name = \"zlib\"\nversion = \"1.3.1\"\n")
        .expect("definition should parse");
    assert!(parsed.dependencies.is_empty());
    assert!(parsed.build.is_none());
    assert!(parsed.description.is_none());
}

#[test]
fn reject_self_dependency() {
    let err = PortDefinition::from_toml_str(
        "name = \"zlib\"\nversion = \"1.3.1\"\ndependencies = [\"zlib\"]\n",
    )
    .expect_err("self dependency must fail");
    assert!(err.to_string().contains("depends on itself"));
}

#[test]
fn reject_duplicate_dependency() {
    let err = PortDefinition::from_toml_str(
        "name = \"curl\"\nversion = \"8.9.0\"\ndependencies = [\"zlib\", \"zlib\"]\n",
    )
    .expect_err("duplicate dependency must fail");
    assert!(err.to_string().contains("duplicate dependency 'zlib'"));
}

#[test]
fn reject_empty_build_command() {
    let err =
        PortDefinition::from_toml_str("name = \"zlib\"\nversion = \"1.3.1\"\nbuild = []\n")
            .expect_err("empty build command must fail");
    assert!(err.to_string().contains("must name a program"));
}

#[test]
fn reject_unknown_definition_keys() {
    let result = PortDefinition::from_toml_str(
        "name = \"zlib\"\nversion = \"1.3.1\"\nhomepage = \"https://zlib.net\"\n",
    );
    assert!(result.is_err());
}

#[test]
fn reject_empty_version() {
    let err = PortDefinition::from_toml_str("name = \"zlib\"\nversion = \"  \"\n")
        .expect_err("empty version must fail");
    assert!(err.to_string().contains("empty version"));
}

#[test]
fn reject_version_with_line_break() {
    let err = PortDefinition::from_toml_str("name = \"zlib\"\nversion = \"1.0\\nrc\"\n")
        .expect_err("multi-line version must fail");
    assert!(err.to_string().contains("control characters"));
}

#[test]
fn spec_parse_uses_default_triplet() {
    let spec = PackageSpec::parse("zlib", &linux()).expect("spec should parse");
    assert_eq!(spec.name(), "zlib");
    assert_eq!(spec.triplet().as_str(), "x64-linux");
    assert_eq!(spec.to_string(), "zlib:x64-linux");
}

#[test]
fn spec_parse_explicit_triplet_wins() {
    let spec = PackageSpec::parse("zlib:arm64-osx", &linux()).expect("spec should parse");
    assert_eq!(spec.triplet().as_str(), "arm64-osx");
    assert_eq!(spec.dir_token(), "zlib_arm64-osx");
}

#[test]
fn spec_parse_rejects_bad_identifiers() {
    for input in ["", "Zlib", "zlib:", ":x64-linux", "zlib:x64_linux", "-zlib", "z lib"] {
        assert!(
            PackageSpec::parse(input, &linux()).is_err(),
            "expected '{input}' to be rejected"
        );
    }
}

#[test]
fn specs_order_by_name_then_triplet() {
    let osx = Triplet::parse("x64-osx").expect("valid triplet");
    let mut specs = vec![
        PackageSpec::new("zlib", osx.clone()).expect("spec"),
        PackageSpec::new("curl", osx).expect("spec"),
        PackageSpec::new("zlib", linux()).expect("spec"),
    ];
    specs.sort();
    let rendered: Vec<String> = specs.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec!["curl:x64-osx", "zlib:x64-linux", "zlib:x64-osx"]
    );
}

#[test]
fn host_triplet_is_builtin() {
    assert!(Triplet::host().is_builtin());
}

#[test]
fn version_change_direction() {
    let old = PortVersion::new("1.2.11");
    assert_eq!(PortVersion::new("1.3.0").change_from(&old), VersionChange::Upgrade);
    assert_eq!(PortVersion::new("1.2.0").change_from(&old), VersionChange::Downgrade);
    assert_eq!(PortVersion::new("1.2.11").change_from(&old), VersionChange::Same);
    assert_eq!(
        PortVersion::new("2024-01-05").change_from(&old),
        VersionChange::Changed
    );
}

#[test]
fn version_semver_pads_short_versions() {
    assert_eq!(
        PortVersion::new("1.2").semver().map(|v| v.to_string()),
        Some("1.2.0".to_string())
    );
    assert_eq!(
        PortVersion::new("3").semver().map(|v| v.to_string()),
        Some("3.0.0".to_string())
    );
}

#[test]
fn map_backed_collaborators_answer_lookups() {
    let definition =
        PortDefinition::from_toml_str("name = \"zlib\"\nversion = \"1.3.1\"\n").expect("parse");
    let mut definitions = BTreeMap::new();
    definitions.insert("zlib".to_string(), definition.clone());
    assert_eq!(
        definitions.definition("zlib").expect("lookup"),
        Some(definition)
    );
    assert_eq!(definitions.definition("curl").expect("lookup"), None);

    let spec = PackageSpec::new("zlib", linux()).expect("spec");
    let mut installed = BTreeMap::new();
    installed.insert(
        spec.clone(),
        InstalledRecord {
            spec: spec.clone(),
            version: PortVersion::new("1.3.0"),
            dependencies: Vec::new(),
            installed_at_unix: 1,
        },
    );
    assert_eq!(
        installed.find_installed(&spec).map(|r| r.version.as_str()),
        Some("1.3.0")
    );
    assert_eq!(installed.installed().len(), 1);
}
