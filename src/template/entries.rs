//! Post-resolution generation of port plumbing entries.
//!
//! After substitution, each allocation can feed three config structures:
//! a symmetric `appPort` entry (`"port:port"`), a `forwardPorts` number,
//! and a `portsAttributes` entry keyed by port. Each structure is
//! suppressed independently: symmetric `appPort` per port when the user
//! (or asymmetric injection) already maps that host port, `forwardPorts`
//! and `portsAttributes` in their entirety when the user supplied their
//! own. The merge step only ever appends — user content is never
//! overwritten.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::PORT_LABEL_SUFFIX;
use crate::features::{extract_feature_short_id, features_block, prebaked_features_block};
use crate::metadata::{FeatureMetadataMap, PortDeclaration};
use crate::ports::PortAllocation;

/// Candidate port entries produced by [`generate_port_entries`].
#[derive(Debug, Default)]
pub struct PortEntries {
    /// Symmetric `"port:port"` entries, minus suppressed ports.
    pub app_port: Vec<Value>,
    /// Port numbers for `forwardPorts`; empty when user-supplied.
    pub forward_ports: Vec<Value>,
    /// `portsAttributes` entries keyed by port number; empty when
    /// user-supplied.
    pub ports_attributes: serde_json::Map<String, Value>,
}

/// Collect per-label port metadata for every feature present in `config`.
#[must_use]
pub fn collect_port_metadata(
    config: &Value,
    metadata: &FeatureMetadataMap,
) -> BTreeMap<String, PortDeclaration> {
    let mut map = BTreeMap::new();
    for block in [features_block(config), prebaked_features_block(config)] {
        let Some(block) = block else { continue };
        for reference in block.keys() {
            let Some(Some(meta)) = metadata.get(reference) else {
                continue;
            };
            let short_id = extract_feature_short_id(reference);
            for (option_name, declaration) in &meta.customizations.lace.ports {
                map.insert(format!("{short_id}/{option_name}"), declaration.clone());
            }
        }
    }
    map
}

/// Generate candidate `appPort`/`forwardPorts`/`portsAttributes` entries
/// for the final allocation list, applying the three suppression rules.
#[must_use]
pub fn generate_port_entries(
    config: &Value,
    allocations: &[PortAllocation],
    port_metadata: &BTreeMap<String, PortDeclaration>,
) -> PortEntries {
    let existing_hosts = existing_app_port_hosts(config);
    let forward_suppressed = config.get("forwardPorts").is_some();
    let attributes_suppressed = config.get("portsAttributes").is_some();

    let mut entries = PortEntries::default();

    for allocation in allocations {
        let port = allocation.port;
        let declaration = port_metadata.get(&allocation.label);

        // An existing entry with this host side covers the asymmetric
        // mapping case; a duplicate symmetric entry would shadow it.
        if !existing_hosts.contains(&port) {
            entries
                .app_port
                .push(Value::String(format!("{port}:{port}")));
        }

        if !forward_suppressed {
            entries.forward_ports.push(Value::Number(port.into()));
        }

        if !attributes_suppressed {
            let base_label = declaration
                .and_then(|d| d.label.clone())
                .unwrap_or_else(|| allocation.label.clone());

            let mut attributes = serde_json::Map::new();
            attributes.insert(
                "label".to_string(),
                Value::String(format!("{base_label}{PORT_LABEL_SUFFIX}")),
            );
            attributes.insert(
                "requireLocalPort".to_string(),
                Value::Bool(declaration.and_then(|d| d.require_local_port).unwrap_or(true)),
            );
            if let Some(on_auto_forward) = declaration.and_then(|d| d.on_auto_forward.clone()) {
                attributes.insert("onAutoForward".to_string(), Value::String(on_auto_forward));
            }

            entries
                .ports_attributes
                .insert(port.to_string(), Value::Object(attributes));
        }
    }

    entries
}

/// Append generated entries onto the existing config structures, never
/// overwriting user content.
pub fn merge_port_entries(config: &mut Value, entries: &PortEntries) {
    let Some(root) = config.as_object_mut() else {
        return;
    };

    if !entries.app_port.is_empty() {
        match root.get_mut("appPort") {
            Some(Value::Array(items)) => items.extend(entries.app_port.iter().cloned()),
            Some(existing) => {
                let mut items = vec![existing.take()];
                items.extend(entries.app_port.iter().cloned());
                *existing = Value::Array(items);
            }
            None => {
                root.insert(
                    "appPort".to_string(),
                    Value::Array(entries.app_port.clone()),
                );
            }
        }
    }

    if !entries.forward_ports.is_empty() {
        match root.get_mut("forwardPorts") {
            Some(Value::Array(items)) => items.extend(entries.forward_ports.iter().cloned()),
            Some(_) => {}
            None => {
                root.insert(
                    "forwardPorts".to_string(),
                    Value::Array(entries.forward_ports.clone()),
                );
            }
        }
    }

    if !entries.ports_attributes.is_empty() {
        let attributes = root
            .entry("portsAttributes")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(map) = attributes.as_object_mut() {
            for (port, attrs) in &entries.ports_attributes {
                map.entry(port.clone()).or_insert_with(|| attrs.clone());
            }
        }
    }
}

/// Host-side port numbers of every existing `appPort` entry.
///
/// Entries may be a bare number (symmetric), a `"host:container"` string,
/// or a plain numeric string.
fn existing_app_port_hosts(config: &Value) -> Vec<u16> {
    let mut hosts = Vec::new();
    let mut push_entry = |entry: &Value| match entry {
        Value::Number(n) => {
            if let Some(port) = n.as_u64().and_then(|n| u16::try_from(n).ok()) {
                hosts.push(port);
            }
        }
        Value::String(s) => {
            let host_side = s.split(':').next().unwrap_or(s);
            if let Ok(port) = host_side.parse::<u16>() {
                hosts.push(port);
            }
        }
        _ => {}
    };

    match config.get("appPort") {
        Some(Value::Array(items)) => items.iter().for_each(&mut push_entry),
        Some(other) => push_entry(other),
        None => {}
    }
    hosts
}
