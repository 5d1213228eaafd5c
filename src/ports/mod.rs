//! Stable port allocation within the fixed lace window.
//!
//! The allocator owns a per-project persisted mapping `label → port` inside
//! [`PORT_RANGE_START`]..=[`PORT_RANGE_END`]. Allocation is deterministic
//! and idempotent: for a fixed set of busy host ports and fixed persisted
//! state, the same label resolves to the same port within a process and
//! across processes, as long as nothing external rebinds the port. A wrong
//! fallback here silently breaks SSH connectivity into the container, so
//! the cached-port-still-free check is the load-bearing branch.
//!
//! Host availability is checked through the [`PortProbe`] seam; production
//! code uses [`TcpProbe`], tests substitute a deterministic probe.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;

use crate::constants::{PORT_PROBE_TIMEOUT, PORT_RANGE_END, PORT_RANGE_START, PORT_STATE_FILE};
use crate::core::LaceError;
use crate::state;


/// Host port availability check.
pub trait PortProbe {
    /// Whether `port` is currently free on the host.
    fn is_free(&self, port: u16) -> bool;
}

/// Production probe: TCP connect to localhost with a short timeout.
///
/// Connection refused or timeout means free; an accepted connection means
/// another process is already listening.
pub struct TcpProbe;

impl PortProbe for TcpProbe {
    fn is_free(&self, port: u16) -> bool {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        TcpStream::connect_timeout(&addr, PORT_PROBE_TIMEOUT).is_err()
    }
}

/// One persisted port assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortAllocation {
    /// The `namespace/name` label this port is bound to.
    pub label: String,
    /// The allocated port, inside the lace window.
    pub port: u16,
    /// When the assignment was first made.
    pub assigned_at: DateTime<Utc>,
}

/// Per-project port allocator with persisted idempotency.
pub struct PortAllocator {
    state_path: PathBuf,
    probe: Box<dyn PortProbe>,
    allocations: BTreeMap<String, PortAllocation>,
}

impl PortAllocator {
    /// Construct for a project, loading persisted assignments and probing
    /// through [`TcpProbe`].
    pub fn new(project_id: &str) -> Result<Self> {
        let state_path =
            crate::config::project_state_dir(project_id)?.join(PORT_STATE_FILE);
        Self::with_probe(state_path, Box::new(TcpProbe))
    }

    /// Construct with an explicit state file and probe. Loads any persisted
    /// `label → port` mapping to seed idempotency across invocations.
    pub fn with_probe(state_path: PathBuf, probe: Box<dyn PortProbe>) -> Result<Self> {
        let allocations = state::load_assignments(&state_path)
            .with_context(|| "Failed to load port assignment state")?;
        Ok(Self {
            state_path,
            probe,
            allocations,
        })
    }

    /// Allocate a port for `label`.
    ///
    /// Returns the cached port when one exists and the host still reports
    /// it free. Otherwise scans the window from its lowest value, skipping
    /// ports claimed by other labels and ports busy on the host, and binds
    /// the first free one. No free port left is a fatal
    /// [`LaceError::PortRangeExhausted`]; the window never wraps or grows.
    pub fn allocate(&mut self, label: &str) -> Result<u16> {
        if let Some(existing) = self.allocations.get(label) {
            if self.probe.is_free(existing.port) {
                tracing::debug!("Port {} for '{label}' still free, keeping it", existing.port);
                return Ok(existing.port);
            }
            tracing::warn!(
                "Port {} previously assigned to '{label}' is now busy, reassigning",
                existing.port
            );
        }

        let claimed: Vec<u16> = self
            .allocations
            .iter()
            .filter(|(l, _)| l.as_str() != label)
            .map(|(_, a)| a.port)
            .collect();

        for port in PORT_RANGE_START..=PORT_RANGE_END {
            if claimed.contains(&port) {
                continue;
            }
            if !self.probe.is_free(port) {
                continue;
            }

            tracing::debug!("Assigned port {port} to '{label}'");
            self.allocations.insert(
                label.to_string(),
                PortAllocation {
                    label: label.to_string(),
                    port,
                    assigned_at: Utc::now(),
                },
            );
            return Ok(port);
        }

        Err(LaceError::PortRangeExhausted {
            start: PORT_RANGE_START,
            end: PORT_RANGE_END,
        }
        .into())
    }

    /// The current allocation for `label`, if one has been made or loaded.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&PortAllocation> {
        self.allocations.get(label)
    }

    /// All allocations, keyed by label.
    #[must_use]
    pub fn allocations(&self) -> &BTreeMap<String, PortAllocation> {
        &self.allocations
    }

    /// Persist the full allocation map to the project state file.
    ///
    /// Called only after a fully successful resolution pass, so a failed
    /// pass never corrupts previously-saved allocations.
    pub fn save(&self) -> Result<()> {
        state::save_assignments(&self.state_path, &self.allocations)
    }
}
