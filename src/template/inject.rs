//! Auto-injection of templates declared by feature metadata.
//!
//! Features declare their templatable resources under
//! `customizations.lace.{ports,mounts}`. When the user has not wired a
//! declared resource up themselves, lace injects the template expression
//! on their behalf. Injection is append-only: user-supplied values are
//! never replaced.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::features::{PREBAKED_FEATURES_POINTER, extract_feature_short_id};
use crate::metadata::{FeatureMetadataMap, MountDeclaration};

use super::{mount_template, port_template};

/// Result of mount template injection.
#[derive(Debug)]
pub struct MountInjection {
    /// Labels whose templates were appended to the `mounts` array.
    pub injected: Vec<String>,
    /// The merged declaration map (project ∪ all features), the
    /// authoritative namespace registry for validation and resolution.
    pub declarations: BTreeMap<String, MountDeclaration>,
}

/// Inject port templates for feature-declared port options.
///
/// Ordinary features get the bare template set as the option value in
/// place; later resolution coerces it to a concrete integer. Pre-baked
/// features cannot have their options changed after the image is built, so
/// they get an asymmetric `appPort` entry `"<template>:<internal>"`
/// instead, with the container side fixed at the feature's documented
/// internal port (the option's declared default).
///
/// Returns the injected labels, used for downstream warning suppression
/// and reporting.
pub fn auto_inject_port_templates(
    config: &mut Value,
    metadata: &FeatureMetadataMap,
) -> Result<Vec<String>> {
    let mut injected = Vec::new();

    inject_ordinary_ports(config, metadata, &mut injected);
    inject_prebaked_ports(config, metadata, &mut injected);

    Ok(injected)
}

fn inject_ordinary_ports(
    config: &mut Value,
    metadata: &FeatureMetadataMap,
    injected: &mut Vec<String>,
) {
    let Some(features) = config.get_mut("features").and_then(Value::as_object_mut) else {
        return;
    };

    for (reference, options_value) in features.iter_mut() {
        let Some(Some(meta)) = metadata.get(reference) else {
            continue;
        };
        let short_id = extract_feature_short_id(reference);

        for option_name in meta.customizations.lace.ports.keys() {
            let label = format!("{short_id}/{option_name}");
            let template = port_template(&label);

            // The boolean shorthand ("feature": true) carries no options;
            // promote it to an object so the template has somewhere to go.
            if options_value == &Value::Bool(true) {
                *options_value = Value::Object(serde_json::Map::new());
            }
            let Some(options) = options_value.as_object_mut() else {
                tracing::debug!(
                    "Skipping port injection for '{reference}': options are not an object"
                );
                continue;
            };

            match options.get(option_name) {
                None => {}
                // A literal placeholder already pointing at the same label
                // still counts as lace-managed.
                Some(Value::String(s)) if s == &template => {}
                Some(_) => continue,
            }

            tracing::debug!("Injecting port template for '{label}'");
            options.insert(option_name.clone(), Value::String(template));
            injected.push(label);
        }
    }
}

fn inject_prebaked_ports(
    config: &mut Value,
    metadata: &FeatureMetadataMap,
    injected: &mut Vec<String>,
) {
    let Some(prebaked) = config
        .pointer(PREBAKED_FEATURES_POINTER)
        .and_then(Value::as_object)
        .cloned()
    else {
        return;
    };

    for (reference, options_value) in &prebaked {
        let Some(Some(meta)) = metadata.get(reference) else {
            continue;
        };
        let short_id = extract_feature_short_id(reference);

        for option_name in meta.customizations.lace.ports.keys() {
            let label = format!("{short_id}/{option_name}");
            let template = port_template(&label);

            // A static baked value means the user wired this up (or failed
            // to; the static-port diagnostic covers that case).
            match options_value.get(option_name) {
                None => {}
                Some(Value::String(s)) if s == &template => {}
                Some(_) => continue,
            }

            if app_port_references(config, &template) {
                continue;
            }

            let Some(internal) = meta.option_default_string(option_name) else {
                tracing::warn!(
                    "Pre-baked feature '{reference}' declares port option '{option_name}' \
                     without a default value; cannot derive its internal port, skipping injection"
                );
                continue;
            };

            tracing::debug!("Injecting asymmetric appPort entry for pre-baked '{label}'");
            append_app_port(config, Value::String(format!("{template}:{internal}")));
            injected.push(label);
        }
    }
}

/// Whether any existing `appPort` entry already references `template`.
fn app_port_references(config: &Value, template: &str) -> bool {
    match config.get("appPort") {
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| v.as_str().is_some_and(|s| s.contains(template))),
        Some(Value::String(s)) => s.contains(template),
        _ => false,
    }
}

/// Append an entry to `appPort`, normalizing a scalar user value into an
/// array first.
fn append_app_port(config: &mut Value, entry: Value) {
    let Some(root) = config.as_object_mut() else {
        return;
    };

    match root.get_mut("appPort") {
        Some(Value::Array(items)) => items.push(entry),
        Some(existing) => {
            let prior = existing.take();
            *existing = Value::Array(vec![prior, entry]);
        }
        None => {
            root.insert("appPort".to_string(), Value::Array(vec![entry]));
        }
    }
}

/// Inject mount templates for every declared label not already referenced.
///
/// Declarations come from the project-level map and from each feature with
/// fetched metadata declaring `customizations.lace.mounts`. A label is
/// already satisfied when the existing `mounts` array references it in any
/// of three textual shapes: the bare template, the `.source` accessor, or
/// the `.target` accessor. Unsatisfied labels get the bare template
/// appended.
pub fn auto_inject_mount_templates(
    config: &mut Value,
    project_declarations: &BTreeMap<String, MountDeclaration>,
    metadata: &FeatureMetadataMap,
) -> Result<MountInjection> {
    let mut declarations = project_declarations.clone();

    for block in [
        config.get("features").and_then(Value::as_object),
        config
            .pointer(PREBAKED_FEATURES_POINTER)
            .and_then(Value::as_object),
    ] {
        let Some(block) = block else { continue };
        for reference in block.keys() {
            let Some(Some(meta)) = metadata.get(reference) else {
                continue;
            };
            let short_id = extract_feature_short_id(reference);
            for (name, declaration) in &meta.customizations.lace.mounts {
                declarations.insert(format!("{short_id}/{name}"), declaration.clone());
            }
        }
    }

    let existing = config
        .get("mounts")
        .map(|v| v.to_string())
        .unwrap_or_default();

    let mut injected = Vec::new();
    for label in declarations.keys() {
        let shapes = [
            mount_template(label),
            format!("${{lace.mount({label}).source}}"),
            format!("${{lace.mount({label}).target}}"),
        ];
        if shapes.iter().any(|s| existing.contains(s.as_str())) {
            continue;
        }

        tracing::debug!("Injecting mount template for '{label}'");
        let Some(root) = config.as_object_mut() else {
            break;
        };
        root.entry("mounts")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(Value::Array(items)) = root.get_mut("mounts") {
            items.push(Value::String(mount_template(label)));
            injected.push(label.clone());
        }
    }

    Ok(MountInjection {
        injected,
        declarations,
    })
}
