//! Core types and error handling.
//!
//! Home of [`LaceError`], the taxonomy of fatal failures in the resolution
//! pipeline, and the [`ErrorContext`] rendering used at the CLI boundary.

pub mod error;
pub mod label;

pub use error::{ErrorContext, LaceError, user_friendly_error};
pub use label::{Label, PROJECT_NAMESPACE};

/// Standard result type using [`LaceError`].
pub type Result<T> = std::result::Result<T, LaceError>;
