//! The `namespace/name` label grammar.
//!
//! Labels are the only cross-component identifier: the port allocator, the
//! mount path resolver, and the template resolver all key their state by
//! label. Both halves match `[A-Za-z0-9_-]+` with exactly one `/`
//! separator (feature option names are camelCase, so the name half keeps
//! case). The namespace is either the literal `project` or a feature
//! short ID.

use super::error::LaceError;

/// Namespace reserved for the user's own (non-feature) declarations.
pub const PROJECT_NAMESPACE: &str = "project";

/// A validated `namespace/name` label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    /// `project` or a feature short ID.
    pub namespace: String,
    /// The port option or mount name within the namespace.
    pub name: String,
}

impl Label {
    /// Parse and validate a label.
    ///
    /// Failures name which half is malformed and why, distinguishing a
    /// wrong separator count from a bad character set.
    pub fn parse(label: &str) -> Result<Self, LaceError> {
        let slashes = label.matches('/').count();
        if slashes != 1 {
            return Err(LaceError::MalformedLabel {
                label: label.to_string(),
                reason: format!(
                    "expected exactly one '/' separator between namespace and name, found {slashes}"
                ),
            });
        }

        let (namespace, name) = label.split_once('/').unwrap_or((label, ""));

        for (half, value) in [("namespace", namespace), ("name", name)] {
            if value.is_empty() {
                return Err(LaceError::MalformedLabel {
                    label: label.to_string(),
                    reason: format!("{half} is empty"),
                });
            }
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(LaceError::MalformedLabel {
                    label: label.to_string(),
                    reason: format!(
                        "{half} '{value}' contains invalid characters (allowed: letters, digits, '-', '_')"
                    ),
                });
            }
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Whether this label lives in the reserved `project` namespace.
    #[must_use]
    pub fn is_project(&self) -> bool {
        self.namespace == PROJECT_NAMESPACE
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
