//! Black-box tests of the `lace` binary.
//!
//! Each test runs against a temporary workspace with `LACE_CONFIG_DIR`
//! pointed at a per-test directory, so persisted state never leaks between
//! tests or into the developer's real `~/.lace`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;

const WEZTERM_REF: &str = "ghcr.io/acme/features/wezterm-server:1";

fn lace(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lace").unwrap();
    cmd.env("LACE_CONFIG_DIR", config_dir);
    cmd
}

/// Write a workspace with a `.devcontainer/devcontainer.json` and a
/// pre-fetched metadata file; returns the metadata file path.
fn write_workspace(workspace: &Path, config: &Value) -> std::path::PathBuf {
    let devcontainer = workspace.join(".devcontainer");
    std::fs::create_dir_all(&devcontainer).unwrap();
    std::fs::write(
        devcontainer.join("devcontainer.json"),
        serde_json::to_string_pretty(config).unwrap(),
    )
    .unwrap();

    let metadata = json!({
        WEZTERM_REF: {
            "id": "wezterm-server",
            "options": {"sshPort": {"type": "string", "default": "2222"}},
            "customizations": {"lace": {
                "ports": {"sshPort": {"label": "wezterm ssh"}}
            }}
        }
    });
    let metadata_path = workspace.join("metadata.json");
    std::fs::write(&metadata_path, serde_json::to_string(&metadata).unwrap()).unwrap();
    metadata_path
}

#[test]
fn test_resolve_prints_resolved_config() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("lace");
    let workspace = tmp.path().join("ws");
    let metadata = write_workspace(&workspace, &json!({"features": {WEZTERM_REF: {}}}));

    let output = lace(&config_dir)
        .arg("resolve")
        .arg("--workspace")
        .arg(&workspace)
        .arg("--metadata")
        .arg(&metadata)
        .arg("--project-id")
        .arg("cli-test")
        .arg("--quiet")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let resolved: Value = serde_json::from_slice(&output).unwrap();
    let port = resolved["features"][WEZTERM_REF]["sshPort"].as_u64().unwrap();
    assert!((22425..=22499).contains(&port), "port {port} outside window");
    assert_eq!(resolved["appPort"], json!([format!("{port}:{port}")]));
    assert_eq!(resolved["forwardPorts"], json!([port]));
    assert_eq!(
        resolved["portsAttributes"][port.to_string()]["label"],
        json!("wezterm ssh (lace)")
    );
}

#[test]
fn test_resolve_is_stable_across_runs() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("lace");
    let workspace = tmp.path().join("ws");
    let metadata = write_workspace(&workspace, &json!({"features": {WEZTERM_REF: {}}}));

    let mut ports = Vec::new();
    for _ in 0..2 {
        let output = lace(&config_dir)
            .arg("resolve")
            .arg("--workspace")
            .arg(&workspace)
            .arg("--metadata")
            .arg(&metadata)
            .arg("--project-id")
            .arg("cli-test")
            .arg("--quiet")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let resolved: Value = serde_json::from_slice(&output).unwrap();
        ports.push(resolved["features"][WEZTERM_REF]["sshPort"].as_u64().unwrap());
    }
    assert_eq!(ports[0], ports[1]);
}

#[test]
fn test_resolve_writes_output_file() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("lace");
    let workspace = tmp.path().join("ws");
    let metadata = write_workspace(&workspace, &json!({"features": {WEZTERM_REF: {}}}));
    let out_path = tmp.path().join("resolved.json");

    lace(&config_dir)
        .arg("resolve")
        .arg("--workspace")
        .arg(&workspace)
        .arg("--metadata")
        .arg(&metadata)
        .arg("--project-id")
        .arg("cli-test")
        .arg("--output")
        .arg(&out_path)
        .arg("--quiet")
        .assert()
        .success();

    let resolved: Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert!(resolved["features"][WEZTERM_REF]["sshPort"].is_u64());
}

#[test]
fn test_resolve_fails_without_devcontainer_config() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("lace");
    let workspace = tmp.path().join("empty");
    std::fs::create_dir_all(&workspace).unwrap();

    lace(&config_dir)
        .arg("resolve")
        .arg("--workspace")
        .arg(&workspace)
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("devcontainer.json"));
}

#[test]
fn test_state_show_and_clear() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("lace");
    let workspace = tmp.path().join("ws");
    let metadata = write_workspace(&workspace, &json!({"features": {WEZTERM_REF: {}}}));

    lace(&config_dir)
        .arg("resolve")
        .arg("--workspace")
        .arg(&workspace)
        .arg("--metadata")
        .arg(&metadata)
        .arg("--project-id")
        .arg("cli-test")
        .arg("--quiet")
        .assert()
        .success();

    lace(&config_dir)
        .arg("state")
        .arg("--project-id")
        .arg("cli-test")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("wezterm-server/sshPort"));

    lace(&config_dir)
        .arg("state")
        .arg("--project-id")
        .arg("cli-test")
        .arg("--quiet")
        .arg("clear")
        .assert()
        .success();

    lace(&config_dir)
        .arg("state")
        .arg("--project-id")
        .arg("cli-test")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no state)"));
}
