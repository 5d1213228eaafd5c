//! Lace - devcontainer templating and resource allocation.
//!
//! Lace augments a devcontainer build/run tool with a templating layer:
//! configuration files may reference symbolic placeholders for TCP ports
//! and host bind-mount paths, and lace resolves those placeholders to
//! concrete, stable, conflict-free values before the underlying container
//! tool runs.
//!
//! # Architecture Overview
//!
//! Three tightly coupled components do the work:
//!
//! - [`ports`] - stable `label → port` assignment inside a fixed window
//!   (22425–22499), persisted per project and probed against the host so a
//!   port grabbed by another process is never silently reused
//! - [`mounts`] - stable `label → host path` assignment with settings
//!   overrides, declaration validation, and staleness repair when the
//!   project identity changes
//! - [`template`] - the tree-walking substitution engine: auto-injection
//!   of feature-declared templates, `${lace.port(...)}` /
//!   `${lace.mount(...)}` substitution, namespace and target-conflict
//!   validation, and post-resolution port-entry generation
//!
//! Labels have the form `namespace/name`, where the namespace is either
//! `project` or a feature short ID (the final path segment of the feature
//! reference, version-stripped). All persisted state is keyed by label.
//!
//! # Supporting Modules
//!
//! - [`cli`] - the `lace` command-line interface (`resolve`, `state`)
//! - [`config`] - user settings (`~/.lace/settings.toml`) and directory
//!   layout
//! - [`core`] - error taxonomy ([`core::LaceError`]) and the label grammar
//! - [`features`] - feature short-ID extraction and collision detection
//! - [`metadata`] - types consumed from the feature metadata provider
//! - [`state`] - persisted assignment files (read-merge-write, atomic)
//! - [`utils`] - filesystem helpers
//!
//! # Template Forms
//!
//! Exactly two template forms exist; any other `${lace.*}` expression is a
//! fatal error:
//!
//! ```json
//! {
//!     "features": {
//!         "ghcr.io/acme/features/wezterm-server:1": {
//!             "sshPort": "${lace.port(wezterm-server/sshPort)}"
//!         }
//!     },
//!     "mounts": ["${lace.mount(wezterm-server/config)}"],
//!     "remoteEnv": {
//!         "WEZTERM_CONFIG": "${lace.mount(wezterm-server/config).target}/wezterm.lua"
//!     }
//! }
//! ```
//!
//! A whole-string port template resolves to a JSON number; embedded in a
//! larger string it is spliced as text. Mount accessors (`.source`,
//! `.target`) always stay strings; the bare mount form replaces the whole
//! value with a composed bind-mount specification.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod features;
pub mod metadata;
pub mod mounts;
pub mod ports;
pub mod state;
pub mod template;
pub mod utils;
