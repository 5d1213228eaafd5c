//! Error handling for lace.
//!
//! Every failure in the resolution core is fatal and synchronous: there is
//! no retry policy inside the resolver or the allocators, and the tool is
//! CLI-facing, so each error must carry enough detail (the offending label
//! or path, and the valid alternatives where they exist) for the user to
//! fix their configuration from the message alone.
//!
//! The error system consists of two types:
//! - [`LaceError`] - enumerated error types for all failure classes
//! - [`ErrorContext`] - wrapper that adds a suggestion and details for
//!   terminal display
//!
//! Use [`user_friendly_error`] at the binary boundary to convert any
//! `anyhow::Error` into a displayable [`ErrorContext`].

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for lace operations.
///
/// Each variant is one failure class of the resolution pipeline. Variants
/// carry the offending label/path and, where the class has a bounded set of
/// valid alternatives, a preformatted listing of them.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum LaceError {
    /// A label does not match the `namespace/name` grammar.
    ///
    /// `reason` names which half is malformed and why (wrong character set
    /// vs. wrong number of slashes).
    #[error("Malformed label '{label}': {reason}")]
    MalformedLabel {
        /// The label as written in the configuration
        label: String,
        /// Which half is malformed and why
        reason: String,
    },

    /// A mount declaration's namespace is neither `project` nor a known
    /// feature short ID. All violations of one validation pass are
    /// collected into a single error.
    #[error("Unknown mount namespace(s): {labels}\nValid namespaces: {valid}")]
    UnknownNamespace {
        /// Offending labels, comma-separated
        labels: String,
        /// The full set of valid namespaces, comma-separated
        valid: String,
    },

    /// A port template references a feature that is not present in the
    /// configuration.
    #[error("Port label '{label}' references unknown feature '{namespace}'\nFeatures in this configuration: {features}")]
    UnknownPortFeature {
        /// The full port label
        label: String,
        /// The namespace half that matched no feature
        namespace: String,
        /// Short IDs of the features actually present, comma-separated
        features: String,
    },

    /// A well-formed mount label has no matching declaration.
    #[error("Mount label '{label}' is not declared\nDeclared labels: {valid}")]
    UndeclaredMountLabel {
        /// The label that matched no declaration
        label: String,
        /// All declared labels, comma-separated
        valid: String,
    },

    /// Two distinct feature references normalize to the same short ID.
    ///
    /// Short IDs are the namespace key inside template expressions, so the
    /// references cannot be disambiguated.
    #[error("Feature ID collision: '{first}' and '{second}' both resolve to short ID '{short_id}'")]
    FeatureIdCollision {
        /// The colliding short ID
        short_id: String,
        /// First full feature reference
        first: String,
        /// Second full feature reference
        second: String,
    },

    /// Two mount declarations share an identical container target path.
    #[error("Mount target conflict: '{target}' is declared by {labels}")]
    MountTargetConflict {
        /// The shared container target path
        target: String,
        /// The colliding labels, comma-separated
        labels: String,
    },

    /// A user-configured mount override points at a path that does not
    /// exist on the host. Overrides are never auto-created.
    #[error("Mount override for '{label}' points at missing path: {path}")]
    OverridePathMissing {
        /// The overridden label
        label: String,
        /// The configured source path
        path: String,
    },

    /// Every port in the fixed allocation window is taken.
    #[error("Port range exhausted: no free port in {start}-{end}")]
    PortRangeExhausted {
        /// First port of the window (inclusive)
        start: u16,
        /// Last port of the window (inclusive)
        end: u16,
    },

    /// A `${lace.*}` expression outside the two recognized template forms.
    #[error("Unknown template variable: {expression}\nSupported forms: ${{lace.port(namespace/name)}}, ${{lace.mount(namespace/name)}}, ${{lace.mount(namespace/name).source}}, ${{lace.mount(namespace/name).target}}")]
    UnknownTemplateVariable {
        /// The unrecognized expression, verbatim
        expression: String,
    },

    /// Configuration file issues (settings, devcontainer config).
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of what's wrong
        message: String,
    },

    /// A persisted state file exists but cannot be parsed.
    #[error("Invalid state file syntax in {file}")]
    StateParseError {
        /// Path of the unreadable state file
        file: String,
        /// Underlying parse failure
        reason: String,
    },

    /// General file system failure with operation context.
    #[error("File system error: {operation}")]
    FileSystemError {
        /// What was being attempted
        operation: String,
        /// The path involved
        path: String,
    },

    /// Standard I/O errors.
    #[error("IO error: {0}")]
    IoError(String),

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for LaceError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for LaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

/// Wrapper adding a user-facing suggestion and details to a [`LaceError`].
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying lace error
    pub error: LaceError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: LaceError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, shown in green in the terminal.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining why the error occurred, shown in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// [`LaceError`] instances get per-class suggestions; everything else is
/// wrapped as a generic configuration error carrying the original message.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(lace_error) = error.downcast_ref::<LaceError>() {
        return create_error_context(lace_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(LaceError::IoError(io_error.to_string()))
                .with_suggestion("Check file ownership and permissions for the lace state directory")
                .with_details("lace needs to read and write its state files under ~/.lace");
        }
    }

    ErrorContext::new(LaceError::ConfigError {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: LaceError) -> ErrorContext {
    let context = ErrorContext::new(error.clone());
    match &error {
        LaceError::MalformedLabel { .. } => context
            .with_suggestion(
                "Use the form 'namespace/name' where both halves contain only letters, digits, '-' and '_'",
            )
            .with_details("Labels identify one templated port or mount and must have exactly one '/' separator"),

        LaceError::UnknownNamespace { .. } => context
            .with_suggestion(
                "Use 'project' for your own mounts, or the short ID of a feature present in this configuration",
            )
            .with_details(
                "A mount declaration's namespace must be 'project' or match a feature in the features or prebaked-features block",
            ),

        LaceError::UnknownPortFeature { .. } => context
            .with_suggestion("Check the spelling of the feature short ID, or add the feature to the configuration")
            .with_details("Port labels are namespaced by feature short ID (the final path segment of the feature reference)"),

        LaceError::UndeclaredMountLabel { .. } => context
            .with_suggestion("Declare the mount in your configuration or in the feature's metadata, or fix the label"),

        LaceError::FeatureIdCollision { short_id, .. } => context
            .with_suggestion(format!(
                "Wrap one of the features so its reference ends in a segment other than '{short_id}'"
            ))
            .with_details("Template labels use feature short IDs as namespaces, so two features with the same final path segment cannot coexist"),

        LaceError::MountTargetConflict { .. } => context
            .with_suggestion("Change one declaration's 'target' so every mount lands on a distinct container path"),

        LaceError::OverridePathMissing { path, .. } => context
            .with_suggestion(format!(
                "Create the directory '{path}' or remove the override from ~/.lace/settings.toml"
            ))
            .with_details("Override paths are used verbatim and never auto-created, to avoid silently shadowing user data"),

        LaceError::PortRangeExhausted { .. } => context
            .with_suggestion("Free up lace-managed ports (stop stale containers) or delete the workspace port state to re-derive assignments")
            .with_details("The allocation window is a fixed deployment constant and never wraps or expands"),

        LaceError::UnknownTemplateVariable { .. } => context
            .with_suggestion("Only port and mount templates are supported; check for typos in the expression"),

        LaceError::StateParseError { file, .. } => context
            .with_suggestion(format!(
                "Delete '{file}' to let the next run re-derive fresh assignments (port numbers may change)"
            )),

        _ => context,
    }
}
