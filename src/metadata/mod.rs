//! Feature metadata types consumed from the metadata provider.
//!
//! Fetching and caching metadata from OCI registries or local paths happens
//! outside this crate; the resolution core only consumes the materialized
//! map of `feature reference → metadata`. A `None` value marks a feature
//! whose fetch failed but whose failure was explicitly tolerated upstream,
//! so injection simply skips it.
//!
//! The interesting part of the metadata is `customizations.lace`: the
//! feature's declared port options and mount points, which drive
//! auto-injection and form the authoritative label namespace for
//! validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Map from full feature reference to its fetched metadata.
///
/// `None` denotes a tolerated fetch failure.
pub type FeatureMetadataMap = HashMap<String, Option<FeatureMetadata>>;

/// Declared metadata of a single devcontainer feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureMetadata {
    /// Feature ID as declared by the feature itself.
    #[serde(default)]
    pub id: String,

    /// Feature version, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Schema of settable option names. Lace reads an option's declared
    /// `default` as the feature's documented internal port when building
    /// asymmetric `appPort` entries for pre-baked features.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, OptionSchema>,

    /// Tool-specific customization blocks; lace reads only its own.
    #[serde(default)]
    pub customizations: Customizations,
}

impl FeatureMetadata {
    /// The lace port declaration for `option_name`, if any.
    #[must_use]
    pub fn port_declaration(&self, option_name: &str) -> Option<&PortDeclaration> {
        self.customizations.lace.ports.get(option_name)
    }

    /// The documented internal port of a port option: its declared schema
    /// default, as a string. `None` when the option has no usable default.
    #[must_use]
    pub fn option_default_string(&self, option_name: &str) -> Option<String> {
        match self.options.get(option_name)?.default.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Schema entry for one feature option.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionSchema {
    /// Option value type ("string", "boolean", ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub option_type: Option<String>,

    /// Declared default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Customization blocks of a feature; only the `lace` block is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customizations {
    /// Lace's own customization namespace.
    #[serde(default)]
    pub lace: LaceCustomizations,
}

/// Lace-specific declarations a feature may carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaceCustomizations {
    /// Port declarations keyed by option name. The full label is
    /// `shortId/optionName`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ports: HashMap<String, PortDeclaration>,

    /// Mount declarations keyed by mount name. The full label is
    /// `shortId/name`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mounts: HashMap<String, MountDeclaration>,
}

/// A feature's declaration of one templatable port option.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortDeclaration {
    /// Human-readable label for generated `portsAttributes` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Whether the forwarded port must keep its local number. Defaults to
    /// true in generated entries when unset.
    #[serde(
        default,
        rename = "requireLocalPort",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_local_port: Option<bool>,

    /// Forward behavior hint, passed through to `portsAttributes` verbatim.
    #[serde(
        default,
        rename = "onAutoForward",
        skip_serializing_if = "Option::is_none"
    )]
    pub on_auto_forward: Option<String>,
}

/// A declaration of one mountable resource.
///
/// The union of all declarations (project-level plus one set per known
/// feature) is the authoritative namespace registry: once any declarations
/// exist, a label without a matching declaration is an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountDeclaration {
    /// Container path the mount lands on. Must be unique across all
    /// declarations.
    pub target: String,

    /// Mount type; defaults to "bind" in composed mount specs.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<String>,

    /// Whether the mount is read-only. Appended as a bare `readonly` flag
    /// in composed specs when true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,

    /// Consistency hint (macOS), passed through when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<String>,
}

impl MountDeclaration {
    /// A minimal declaration with just a target path.
    #[must_use]
    pub fn bind(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mount_type: None,
            readonly: None,
            consistency: None,
        }
    }
}
