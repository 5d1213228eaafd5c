//! Global constants used throughout the lace codebase.
//!
//! This module contains the port allocation window, probe timeouts, and the
//! well-known directory and file names for persisted state. Defining them
//! centrally improves maintainability and makes magic numbers more
//! discoverable.

use std::time::Duration;

/// First port of the allocation window (inclusive).
///
/// The window is a deployment constant, deliberately small: lace-managed
/// ports are identifiable at a glance and the scan on exhaustion stays
/// bounded. It is not user-configurable.
pub const PORT_RANGE_START: u16 = 22425;

/// Last port of the allocation window (inclusive). 75 ports total.
pub const PORT_RANGE_END: u16 = 22499;

/// Timeout for a single TCP availability probe.
///
/// Worst-case allocation scan time is proportional to the window size, so
/// this stays short. Connection refused or timeout means the port is free;
/// an accepted connection means something is already listening.
pub const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Name of the lace configuration directory under the user's home.
pub const LACE_DIR_NAME: &str = ".lace";

/// File name of the persisted port assignments, per project.
pub const PORT_STATE_FILE: &str = "ports.json";

/// File name of the persisted mount assignments, per project.
pub const MOUNT_STATE_FILE: &str = "mounts.json";

/// Prefix shared by every template expression lace owns.
///
/// Expressions of other devcontainer namespaces (`${localEnv:...}`,
/// `${containerEnv:...}`) are passed through untouched.
pub const TEMPLATE_PREFIX: &str = "${lace.";

/// Suffix appended to feature-supplied port labels in generated
/// `portsAttributes` entries, marking them as lace-managed.
pub const PORT_LABEL_SUFFIX: &str = " (lace)";
