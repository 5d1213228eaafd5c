//! Template resolution over devcontainer configuration trees.
//!
//! The resolver walks an arbitrary JSON configuration tree (objects,
//! arrays, string leaves) and substitutes the two template forms lace
//! owns:
//!
//! - `${lace.port(namespace/name)}` — replaced by an allocated port. When
//!   the template is the entire string value, the value is promoted to a
//!   JSON number; embedded in a larger string (`"${lace.port(a/b)}:2222"`)
//!   the stringified port is spliced in place.
//! - `${lace.mount(namespace/name)}` and its `.source` / `.target`
//!   accessors — the bare form replaces the entire string value with a
//!   full composed mount-spec string; accessors substitute the resolved
//!   host path or the declared container path and always stay strings.
//!
//! Placeholders of other namespaces (`${localEnv:...}`,
//! `${containerEnv:...}`) pass through untouched. Any other `${lace.*}`
//! expression is fatal. Mount templates without a mount resolver supplied
//! are left as literal text, which lets port-only passes run without one.
//!
//! Submodules carry the rest of the component: [`inject`] (auto-injection
//! of templates declared by feature metadata), [`validate`] (namespace and
//! target-conflict checks, run before substitution so failures surface
//! before any side effects), and [`entries`] (post-resolution
//! `appPort`/`forwardPorts`/`portsAttributes` generation).

pub mod entries;
pub mod inject;
pub mod validate;


use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::constants::TEMPLATE_PREFIX;
use crate::core::{Label, LaceError};
use crate::features::{build_feature_id_map, prebaked_features_block};
use crate::metadata::FeatureMetadataMap;
use crate::mounts::{MountAssignment, MountPathResolver};
use crate::ports::{PortAllocation, PortAllocator};

pub use entries::{PortEntries, generate_port_entries, merge_port_entries};
pub use inject::{MountInjection, auto_inject_mount_templates, auto_inject_port_templates};
pub use validate::{validate_mount_namespaces, validate_mount_target_conflicts};

static LACE_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{lace\.[^}]*\}").unwrap());
static PORT_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{lace\.port\(([^)]*)\)\}$").unwrap());
static MOUNT_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{lace\.mount\(([^)]*)\)(?:\.(source|target))?\}$").unwrap());

/// The port template expression for a label, as injected into configs.
#[must_use]
pub fn port_template(label: &str) -> String {
    format!("${{lace.port({label})}}")
}

/// The bare mount template expression for a label.
#[must_use]
pub fn mount_template(label: &str) -> String {
    format!("${{lace.mount({label})}}")
}

/// Result of one resolution pass.
#[derive(Debug)]
pub struct ResolutionOutput {
    /// The resolved configuration tree (a mutated deep copy).
    pub config: Value,
    /// Every unique port allocation observed during the walk, in first
    /// observation order.
    pub allocations: Vec<PortAllocation>,
    /// Every unique mount assignment observed during the walk.
    pub mount_assignments: Vec<MountAssignment>,
    /// Non-fatal advisory warnings.
    pub warnings: Vec<String>,
}

/// Resolve all lace templates in `config`.
///
/// Builds the feature-ID map first, so a feature short-ID collision aborts
/// before any substitution occurs. The same label referenced at multiple
/// tree locations resolves to the identical value (allocator and resolver
/// idempotency). Pass `None` for `mounts` to run a port-only pass; mount
/// templates are then left as literal text.
pub fn resolve_templates(
    config: &Value,
    allocator: &mut PortAllocator,
    mut mounts: Option<&mut MountPathResolver>,
) -> Result<ResolutionOutput> {
    let feature_ids = build_feature_id_map(config)?;

    let mut warnings = prebaked_template_warnings(config);
    if let Some(m) = mounts.as_deref() {
        warnings.extend(m.warnings().iter().cloned());
    }

    let mut walker = Walker {
        allocator,
        mounts: mounts.as_deref_mut(),
        feature_ids,
        port_labels: Vec::new(),
        mount_labels: Vec::new(),
        seen: BTreeSet::new(),
    };

    let mut resolved = config.clone();
    walker.visit(&mut resolved)?;

    // Release the walker's reborrows before reading back the final maps.
    let Walker {
        port_labels,
        mount_labels,
        ..
    } = walker;

    let allocations = port_labels
        .iter()
        .filter_map(|l| allocator.get(l).cloned())
        .collect();
    let mount_assignments = match mounts.as_deref() {
        Some(m) => mount_labels
            .iter()
            .filter_map(|l| m.assignments().get(l).cloned())
            .collect(),
        None => Vec::new(),
    };

    Ok(ResolutionOutput {
        config: resolved,
        allocations,
        mount_assignments,
        warnings,
    })
}

struct Walker<'a> {
    allocator: &'a mut PortAllocator,
    mounts: Option<&'a mut MountPathResolver>,
    feature_ids: BTreeMap<String, String>,
    port_labels: Vec<String>,
    mount_labels: Vec<String>,
    seen: BTreeSet<String>,
}

impl Walker<'_> {
    fn visit(&mut self, value: &mut Value) -> Result<()> {
        match value {
            Value::Object(map) => {
                for child in map.values_mut() {
                    self.visit(child)?;
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    self.visit(child)?;
                }
            }
            Value::String(s) => {
                if let Some(replacement) = self.resolve_string(s)? {
                    *value = replacement;
                }
            }
            // Numbers, booleans and nulls pass through unchanged.
            _ => {}
        }
        Ok(())
    }

    /// Resolve one string leaf. `None` leaves the value untouched.
    fn resolve_string(&mut self, raw: &str) -> Result<Option<Value>> {
        if !raw.contains(TEMPLATE_PREFIX) {
            return Ok(None);
        }

        // Whole-string forms first: a bare port template promotes the
        // value to a number, a whole-string mount form replaces the value.
        if let Some(caps) = PORT_EXPR_RE.captures(raw) {
            let port = self.allocate_port(&caps[1])?;
            return Ok(Some(Value::Number(port.into())));
        }
        if let Some(caps) = MOUNT_EXPR_RE.captures(raw) {
            if self.mounts.is_none() {
                return Ok(None);
            }
            let accessor = caps.get(2).map(|m| m.as_str().to_string());
            let label = caps[1].to_string();
            let rendered = self.resolve_mount(&label, accessor.as_deref())?;
            return Ok(Some(Value::String(rendered)));
        }

        // Embedded occurrences: splice each expression into the string.
        let mut out = String::new();
        let mut cursor = 0;
        let mut changed = false;
        for found in LACE_EXPR_RE.find_iter(raw) {
            out.push_str(&raw[cursor..found.start()]);
            cursor = found.end();
            let expr = found.as_str();

            if let Some(caps) = PORT_EXPR_RE.captures(expr) {
                let label = caps[1].to_string();
                out.push_str(&self.allocate_port(&label)?.to_string());
                changed = true;
            } else if let Some(caps) = MOUNT_EXPR_RE.captures(expr) {
                if self.mounts.is_none() {
                    out.push_str(expr);
                } else {
                    let accessor = caps.get(2).map(|m| m.as_str().to_string());
                    let label = caps[1].to_string();
                    out.push_str(&self.resolve_mount(&label, accessor.as_deref())?);
                    changed = true;
                }
            } else {
                return Err(LaceError::UnknownTemplateVariable {
                    expression: expr.to_string(),
                }
                .into());
            }
        }
        out.push_str(&raw[cursor..]);

        Ok(changed.then_some(Value::String(out)))
    }

    fn allocate_port(&mut self, label: &str) -> Result<u16> {
        let parsed = Label::parse(label)?;
        if !self.feature_ids.contains_key(&parsed.namespace) {
            let features = if self.feature_ids.is_empty() {
                "(none)".to_string()
            } else {
                self.feature_ids
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(LaceError::UnknownPortFeature {
                label: label.to_string(),
                namespace: parsed.namespace,
                features,
            }
            .into());
        }

        let port = self.allocator.allocate(label)?;
        if self.seen.insert(format!("port:{label}")) {
            self.port_labels.push(label.to_string());
        }
        Ok(port)
    }

    fn resolve_mount(&mut self, label: &str, accessor: Option<&str>) -> Result<String> {
        let mounts = self
            .mounts
            .as_deref_mut()
            .expect("resolve_mount called without a mount resolver");

        let rendered = match accessor {
            None => mounts.resolve_full_spec(label)?,
            Some("source") => mounts.resolve_source(label)?.display().to_string(),
            Some("target") => mounts.resolve_target(label)?,
            Some(other) => unreachable!("accessor '{other}' not matched by grammar"),
        };

        if self.seen.insert(format!("mount:{label}")) {
            self.mount_labels.push(label.to_string());
        }
        Ok(rendered)
    }
}

/// Warn about port templates sitting inside the pre-baked features block.
///
/// Baked-image builds run before template resolution, so these values pass
/// through literally into the image, which is almost always a mistake.
fn prebaked_template_warnings(config: &Value) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(block) = prebaked_features_block(config) else {
        return warnings;
    };

    for (reference, options) in block {
        collect_port_template_strings(options, &mut |expr| {
            let warning = format!(
                "Pre-baked feature '{reference}' contains port template '{expr}' in its options; \
                 baked images cannot resolve templates and will receive the literal text"
            );
            tracing::warn!("{warning}");
            warnings.push(warning);
        });
    }
    warnings
}

fn collect_port_template_strings(value: &Value, found: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => {
            for m in LACE_EXPR_RE.find_iter(s) {
                if PORT_EXPR_RE.is_match(m.as_str()) {
                    found(m.as_str());
                }
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_port_template_strings(child, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_port_template_strings(child, found);
            }
        }
        _ => {}
    }
}

/// Warn about pre-baked features that declare a port but carry a static
/// option value with no `appPort` entry mapping it — the host can never
/// reach that port.
///
/// Labels lace itself injected this run are skipped.
pub fn prebaked_static_port_diagnostics(
    config: &Value,
    metadata: &FeatureMetadataMap,
    injected_labels: &[String],
) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(block) = prebaked_features_block(config) else {
        return warnings;
    };

    let app_port_text = config
        .get("appPort")
        .map(|v| v.to_string())
        .unwrap_or_default();

    for (reference, options) in block {
        let Some(Some(meta)) = metadata.get(reference) else {
            continue;
        };
        let short_id = crate::features::extract_feature_short_id(reference);

        for option_name in meta.customizations.lace.ports.keys() {
            let label = format!("{short_id}/{option_name}");
            if injected_labels.contains(&label) {
                continue;
            }

            let Some(value) = options.get(option_name) else {
                continue;
            };
            let static_value = match value {
                Value::String(s) if !s.contains(TEMPLATE_PREFIX) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };

            let mapped = app_port_text.contains(&format!(":{static_value}"));
            if !mapped {
                let warning = format!(
                    "Pre-baked feature '{reference}' declares port option '{option_name}' with \
                     static value '{static_value}' but no appPort entry maps it; the host cannot \
                     reach that port"
                );
                tracing::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }
    warnings
}
