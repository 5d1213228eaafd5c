//! Feature identity: short IDs and the feature-ID map.
//!
//! A feature reference is either a registry reference
//! (`registry/org/.../name[:version]`) or a local filesystem path
//! (`./path/name`). Its short ID is the final path segment with any
//! trailing `:version` stripped. Short IDs are the namespace key used
//! inside template expressions, so two references collapsing to the same
//! short ID cannot coexist.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::LaceError;

/// JSON pointer to the pre-baked features block.
///
/// Features baked into a cached base image share the template label
/// namespace with the ordinary `features` block, so both feed the
/// feature-ID map.
pub const PREBAKED_FEATURES_POINTER: &str = "/customizations/lace/prebakedFeatures";

/// Extract the short ID of a feature reference.
///
/// Final path segment, `:version` suffix stripped:
/// `ghcr.io/acme/features/wezterm-server:1` → `wezterm-server`,
/// `./local/features/tooling` → `tooling`.
#[must_use]
pub fn extract_feature_short_id(reference: &str) -> String {
    let segment = reference.rsplit('/').next().unwrap_or(reference);
    segment
        .split_once(':')
        .map_or(segment, |(name, _version)| name)
        .to_string()
}

/// The ordinary `features` block of a configuration, if present.
#[must_use]
pub fn features_block(config: &Value) -> Option<&serde_json::Map<String, Value>> {
    config.get("features")?.as_object()
}

/// The pre-baked features block of a configuration, if present.
#[must_use]
pub fn prebaked_features_block(config: &Value) -> Option<&serde_json::Map<String, Value>> {
    config.pointer(PREBAKED_FEATURES_POINTER)?.as_object()
}

/// Build the map `short ID → full feature reference` over the union of the
/// `features` block and the pre-baked features block.
///
/// Two distinct references normalizing to the same short ID are a fatal
/// collision, reported with both full references so the user can rename
/// one via a wrapper feature.
pub fn build_feature_id_map(config: &Value) -> Result<BTreeMap<String, String>, LaceError> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();

    let blocks = [features_block(config), prebaked_features_block(config)];
    for reference in blocks.into_iter().flatten().flat_map(|b| b.keys()) {
        let short_id = extract_feature_short_id(reference);
        if let Some(existing) = map.get(&short_id) {
            if existing != reference {
                return Err(LaceError::FeatureIdCollision {
                    short_id,
                    first: existing.clone(),
                    second: reference.clone(),
                });
            }
        } else {
            map.insert(short_id, reference.clone());
        }
    }

    Ok(map)
}
