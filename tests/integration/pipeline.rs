//! End-to-end pipeline tests through the library API.
//!
//! These mirror the wiring of the `resolve` command: inject
//! feature-declared templates, validate the declaration set, substitute,
//! then generate the port plumbing entries. Port probes are deterministic
//! so allocations are predictable from the window start.

use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

use lace_cli::config::Settings;
use lace_cli::metadata::FeatureMetadataMap;
use lace_cli::mounts::MountPathResolver;
use lace_cli::ports::{PortAllocator, PortProbe};
use lace_cli::template::{
    auto_inject_mount_templates, auto_inject_port_templates, entries::collect_port_metadata,
    generate_port_entries, merge_port_entries, prebaked_static_port_diagnostics,
    resolve_templates, validate_mount_namespaces, validate_mount_target_conflicts,
};

const WEZTERM_REF: &str = "ghcr.io/acme/features/wezterm-server:1";

struct AlwaysFree;

impl PortProbe for AlwaysFree {
    fn is_free(&self, _port: u16) -> bool {
        true
    }
}

fn allocator(state_dir: &Path) -> PortAllocator {
    PortAllocator::with_probe(state_dir.join("ports.json"), Box::new(AlwaysFree)).unwrap()
}

/// Metadata for a feature with one templatable port option.
fn wezterm_port_metadata() -> FeatureMetadataMap {
    serde_json::from_value(json!({
        WEZTERM_REF: {
            "id": "wezterm-server",
            "options": {"sshPort": {"type": "string", "default": "2222"}},
            "customizations": {"lace": {
                "ports": {"sshPort": {"label": "wezterm ssh"}}
            }}
        }
    }))
    .unwrap()
}

/// Metadata for a feature with one declared mount point.
fn wezterm_mount_metadata() -> FeatureMetadataMap {
    serde_json::from_value(json!({
        WEZTERM_REF: {
            "id": "wezterm-server",
            "customizations": {"lace": {
                "mounts": {"config": {"target": "/home/dev/.config/wezterm"}}
            }}
        }
    }))
    .unwrap()
}

#[test]
fn test_full_pipeline_injects_resolves_and_generates_entries() {
    let tmp = TempDir::new().unwrap();
    let metadata = wezterm_port_metadata();
    let mut config = json!({
        "image": "ubuntu:24.04",
        "features": {WEZTERM_REF: {}}
    });

    let injected = auto_inject_port_templates(&mut config, &metadata).unwrap();
    assert_eq!(injected, vec!["wezterm-server/sshPort".to_string()]);
    assert_eq!(
        config["features"][WEZTERM_REF]["sshPort"],
        json!("${lace.port(wezterm-server/sshPort)}")
    );

    let mut ports = allocator(tmp.path());
    let mut out = resolve_templates(&config, &mut ports, None).unwrap();

    // First allocation with an empty state and a free host starts the
    // window.
    assert_eq!(out.config["features"][WEZTERM_REF]["sshPort"], json!(22425));
    assert_eq!(out.allocations.len(), 1);
    assert_eq!(out.allocations[0].label, "wezterm-server/sshPort");

    let port_metadata = collect_port_metadata(&config, &metadata);
    let entries = generate_port_entries(&out.config, &out.allocations, &port_metadata);
    merge_port_entries(&mut out.config, &entries);

    assert_eq!(out.config["appPort"], json!(["22425:22425"]));
    assert_eq!(out.config["forwardPorts"], json!([22425]));
    let attrs = &out.config["portsAttributes"]["22425"];
    assert_eq!(attrs["label"], json!("wezterm ssh (lace)"));
    assert_eq!(attrs["requireLocalPort"], json!(true));
}

#[test]
fn test_pipeline_is_idempotent_across_invocations() {
    let tmp = TempDir::new().unwrap();
    let metadata = wezterm_port_metadata();

    let mut first = None;
    for _ in 0..2 {
        let mut config = json!({"features": {WEZTERM_REF: {}}});
        auto_inject_port_templates(&mut config, &metadata).unwrap();

        let mut ports = allocator(tmp.path());
        let out = resolve_templates(&config, &mut ports, None).unwrap();
        ports.save().unwrap();

        let port = out.config["features"][WEZTERM_REF]["sshPort"]
            .as_u64()
            .unwrap();
        match first {
            None => first = Some(port),
            Some(p) => assert_eq!(port, p),
        }
    }
}

#[test]
fn test_prebaked_feature_gets_asymmetric_app_port_entry() {
    let tmp = TempDir::new().unwrap();
    let metadata = wezterm_port_metadata();
    let mut config = json!({
        "customizations": {"lace": {"prebakedFeatures": {
            WEZTERM_REF: {"sshPort": "2222"}
        }}}
    });

    let injected = auto_inject_port_templates(&mut config, &metadata).unwrap();
    assert_eq!(injected, vec!["wezterm-server/sshPort".to_string()]);
    // Baked options are immutable: the static value stays, the mapping
    // lands on appPort instead.
    assert_eq!(
        config["customizations"]["lace"]["prebakedFeatures"][WEZTERM_REF]["sshPort"],
        json!("2222")
    );
    assert_eq!(
        config["appPort"],
        json!(["${lace.port(wezterm-server/sshPort)}:2222"])
    );

    let mut ports = allocator(tmp.path());
    let mut out = resolve_templates(&config, &mut ports, None).unwrap();
    assert_eq!(out.config["appPort"], json!(["22425:2222"]));

    // The asymmetric entry already maps host 22425, so no duplicate
    // symmetric entry is appended.
    let port_metadata = collect_port_metadata(&config, &metadata);
    let entries = generate_port_entries(&out.config, &out.allocations, &port_metadata);
    merge_port_entries(&mut out.config, &entries);
    assert_eq!(out.config["appPort"], json!(["22425:2222"]));
    assert_eq!(out.config["forwardPorts"], json!([22425]));

    // Lace injected this mapping itself, so the static-port diagnostic
    // stays quiet.
    let warnings = prebaked_static_port_diagnostics(&config, &metadata, &injected);
    assert!(warnings.is_empty());
}

#[test]
fn test_existing_structures_suppress_generated_entries() {
    let tmp = TempDir::new().unwrap();
    let metadata = wezterm_port_metadata();
    let mut config = json!({
        "features": {WEZTERM_REF: {}},
        "forwardPorts": [8080],
        "portsAttributes": {"8080": {"label": "web"}}
    });

    auto_inject_port_templates(&mut config, &metadata).unwrap();
    let mut ports = allocator(tmp.path());
    let mut out = resolve_templates(&config, &mut ports, None).unwrap();

    let port_metadata = collect_port_metadata(&config, &metadata);
    let entries = generate_port_entries(&out.config, &out.allocations, &port_metadata);
    merge_port_entries(&mut out.config, &entries);

    // User-authored structures are authoritative: untouched entirely.
    assert_eq!(out.config["forwardPorts"], json!([8080]));
    assert_eq!(out.config["portsAttributes"], json!({"8080": {"label": "web"}}));
    // appPort has no existing entries, so the symmetric one still lands.
    assert_eq!(out.config["appPort"], json!(["22425:22425"]));
}

#[test]
fn test_mount_pipeline_resolves_injected_template_and_accessor() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();

    let metadata = wezterm_mount_metadata();
    let mut config = json!({
        "features": {WEZTERM_REF: {}},
        "remoteEnv": {
            "WEZTERM_CONFIG_FILE":
                "${lace.mount(wezterm-server/config).target}/wezterm.lua"
        }
    });

    let injection = auto_inject_mount_templates(&mut config, &BTreeMap::new(), &metadata).unwrap();
    assert_eq!(injection.injected, vec!["wezterm-server/config".to_string()]);
    assert_eq!(
        config["mounts"],
        json!(["${lace.mount(wezterm-server/config)}"])
    );

    let short_ids = vec!["wezterm-server".to_string()];
    validate_mount_namespaces(&injection.declarations, &short_ids).unwrap();
    validate_mount_target_conflicts(&injection.declarations).unwrap();

    let lace_root = tmp.path().join("lace");
    let mut mounts = MountPathResolver::with_root(
        lace_root.clone(),
        &workspace,
        "proj",
        Settings::new(),
        injection.declarations,
    )
    .unwrap();

    let mut ports = allocator(tmp.path());
    let out = resolve_templates(&config, &mut ports, Some(&mut mounts)).unwrap();

    let source = lace_root.join("proj/mounts/wezterm-server/config");
    assert_eq!(
        out.config["mounts"][0],
        json!(format!(
            "source={},target=/home/dev/.config/wezterm,type=bind",
            source.display()
        ))
    );
    assert_eq!(
        out.config["remoteEnv"]["WEZTERM_CONFIG_FILE"],
        json!("/home/dev/.config/wezterm/wezterm.lua")
    );
    // Derived sources exist on disk before the container tool runs.
    assert!(source.is_dir());
    assert_eq!(out.mount_assignments.len(), 1);
    assert!(!out.mount_assignments[0].is_override);
}

#[test]
fn test_distinct_labels_get_distinct_ports() {
    let tmp = TempDir::new().unwrap();
    let metadata: FeatureMetadataMap = serde_json::from_value(json!({
        WEZTERM_REF: {
            "id": "wezterm-server",
            "customizations": {"lace": {"ports": {
                "sshPort": {"label": "wezterm ssh"},
                "httpPort": {}
            }}}
        }
    }))
    .unwrap();
    let mut config = json!({"features": {WEZTERM_REF: {}}});

    auto_inject_port_templates(&mut config, &metadata).unwrap();
    let mut ports = allocator(tmp.path());
    let out = resolve_templates(&config, &mut ports, None).unwrap();

    let feature = out.config["features"][WEZTERM_REF].as_object().unwrap();
    let ssh = feature["sshPort"].as_u64().unwrap();
    let http = feature["httpPort"].as_u64().unwrap();
    assert_ne!(ssh, http);
    for port in [ssh, http] {
        assert!((22425..=22499).contains(&port));
    }
    assert_eq!(out.allocations.len(), 2);
}

#[test]
fn test_resolution_failure_reports_unknown_feature() {
    let tmp = TempDir::new().unwrap();
    let config = json!({
        "features": {WEZTERM_REF: {}},
        "containerEnv": {"PORT": "${lace.port(other-server/port)}"}
    });

    let mut ports = allocator(tmp.path());
    let err = resolve_templates(&config, &mut ports, None).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("other-server"), "got: {message}");
    assert!(message.contains("wezterm-server"), "got: {message}");
}
