//! Cross-cutting validation of the merged mount declaration set.
//!
//! Both checks run before substitution so failures are reported before any
//! side effects (no directories created, no ports allocated).

use std::collections::BTreeMap;

use crate::core::{Label, LaceError, PROJECT_NAMESPACE};
use crate::metadata::MountDeclaration;

/// Every declaration's namespace must be `project` or a known feature
/// short ID. All violations are collected into a single error listing the
/// full set of valid namespaces.
pub fn validate_mount_namespaces(
    declarations: &BTreeMap<String, MountDeclaration>,
    known_feature_short_ids: &[String],
) -> Result<(), LaceError> {
    let mut offending = Vec::new();

    for label in declarations.keys() {
        let parsed = Label::parse(label)?;
        if !parsed.is_project() && !known_feature_short_ids.contains(&parsed.namespace) {
            offending.push(label.clone());
        }
    }

    if offending.is_empty() {
        return Ok(());
    }

    let mut valid: Vec<String> = vec![PROJECT_NAMESPACE.to_string()];
    valid.extend(known_feature_short_ids.iter().cloned());

    Err(LaceError::UnknownNamespace {
        labels: offending.join(", "),
        valid: valid.join(", "),
    })
}

/// No two declarations may share an identical container target path,
/// regardless of namespace.
pub fn validate_mount_target_conflicts(
    declarations: &BTreeMap<String, MountDeclaration>,
) -> Result<(), LaceError> {
    let mut by_target: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (label, declaration) in declarations {
        by_target
            .entry(declaration.target.as_str())
            .or_default()
            .push(label.as_str());
    }

    for (target, labels) in by_target {
        if labels.len() > 1 {
            return Err(LaceError::MountTargetConflict {
                target: target.to_string(),
                labels: labels.join(", "),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MountDeclaration;

    fn decls(entries: &[(&str, &str)]) -> BTreeMap<String, MountDeclaration> {
        entries
            .iter()
            .map(|(label, target)| (label.to_string(), MountDeclaration::bind(*target)))
            .collect()
    }

    #[test]
    fn test_project_and_feature_namespaces_pass() {
        let declarations = decls(&[
            ("project/data", "/data"),
            ("wezterm-server/config", "/config"),
        ]);
        validate_mount_namespaces(&declarations, &["wezterm-server".to_string()]).unwrap();
    }

    #[test]
    fn test_unknown_namespaces_are_collected_into_one_error() {
        let declarations = decls(&[
            ("ghost/data", "/a"),
            ("phantom/cache", "/b"),
            ("project/data", "/c"),
        ]);

        let err =
            validate_mount_namespaces(&declarations, &["wezterm-server".to_string()]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost/data"));
        assert!(msg.contains("phantom/cache"));
        assert!(!msg.contains("project/data,"));
        assert!(msg.contains("project, wezterm-server"));
    }

    #[test]
    fn test_malformed_declaration_label_is_reported() {
        let declarations = decls(&[("nodash", "/a")]);
        let err = validate_mount_namespaces(&declarations, &[]).unwrap_err();
        assert!(matches!(err, LaceError::MalformedLabel { .. }));
    }

    #[test]
    fn test_target_conflict_names_both_labels() {
        let declarations = decls(&[
            ("project/data", "/shared"),
            ("wezterm-server/state", "/shared"),
            ("project/logs", "/logs"),
        ]);

        let err = validate_mount_target_conflicts(&declarations).unwrap_err();
        match err {
            LaceError::MountTargetConflict { target, labels } => {
                assert_eq!(target, "/shared");
                assert!(labels.contains("project/data"));
                assert!(labels.contains("wezterm-server/state"));
            }
            other => panic!("expected target conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_distinct_targets_pass() {
        let declarations = decls(&[("project/a", "/a"), ("project/b", "/b")]);
        validate_mount_target_conflicts(&declarations).unwrap();
    }
}
