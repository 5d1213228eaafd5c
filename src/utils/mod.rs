//! Shared utilities.
//!
//! - [`fs`] - File system operations with atomic writes
//!
//! Everything here is synchronous; the resolution pipeline has no background
//! work and persists state only after a fully successful pass.

pub mod fs;

pub use fs::{atomic_write, atomic_write_string, ensure_dir};
