//! CLI integration tests.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = "\
interface TengigabitEthernet 1/1
 switchport
 no shutdown
!
";

const MANIFEST: &str = r#"
interfaces:
  "1/1":
    untagged_vlan: 100
"#;

fn write_inputs(dir: &TempDir) -> (String, String) {
    let config_path = dir.path().join("running-config.txt");
    let manifest_path = dir.path().join("manifest.yaml");
    fs::write(&config_path, CONFIG).unwrap();
    fs::write(&manifest_path, MANIFEST).unwrap();
    (
        config_path.to_string_lossy().into_owned(),
        manifest_path.to_string_lossy().into_owned(),
    )
}

#[test]
fn test_renders_nested_commands() {
    let dir = TempDir::new().unwrap();
    let (config, manifest) = write_inputs(&dir);

    Command::cargo_bin("os9-reconcile")
        .unwrap()
        .args(["--running-config", &config, "--manifest", &manifest])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "interface Vlan 100\n untagged TengigabitEthernet 1/1",
        ));
}

#[test]
fn test_json_output() {
    let dir = TempDir::new().unwrap();
    let (config, manifest) = write_inputs(&dir);

    let output = Command::cargo_bin("os9-reconcile")
        .unwrap()
        .args(["--running-config", &config, "--manifest", &manifest, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let fragments: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(fragments[0]["scope"][0], "interface Vlan 100");
    assert_eq!(fragments[0]["lines"][0], "untagged TengigabitEthernet 1/1");
}

#[test]
fn test_invalid_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("running-config.txt");
    let manifest_path = dir.path().join("manifest.yaml");
    fs::write(&config_path, CONFIG).unwrap();
    fs::write(
        &manifest_path,
        r#"
interfaces:
  "1/1":
    untagged_vlan: 100
    ip4: 10.0.0.1/24
"#,
    )
    .unwrap();
    let config = config_path.to_string_lossy().into_owned();
    let manifest = manifest_path.to_string_lossy().into_owned();

    Command::cargo_bin("os9-reconcile")
        .unwrap()
        .args(["--running-config", &config, "--manifest", &manifest])
        .assert()
        .failure()
        .stderr(predicate::str::contains("both L2 and L3"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let manifest_path = dir.path().join("manifest.yaml");
    fs::write(&manifest_path, MANIFEST).unwrap();
    let manifest = manifest_path.to_string_lossy().into_owned();

    Command::cargo_bin("os9-reconcile")
        .unwrap()
        .args([
            "--running-config",
            "/nonexistent/running-config.txt",
            "--manifest",
            &manifest,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("running configuration"));
}
