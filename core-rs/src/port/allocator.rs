/**
 * allocator.rs
 * Host-wide port allocation for workspace containers
 *
 * Every workspace gets one port from the configured range:
 * - First allocate: lowest port that is neither reserved in the table nor
 *   bound on the host
 * - Later allocates: the stored assignment, unchanged
 * - Release: entry removed, port returns to the pool
 *
 * All mutations run under the table lease. The reservation check happens
 * inside the lease, so two allocators can never both pick a port that no
 * container has bound yet.
 *
 * Example with range 13000-13099:
 * - /src/app-main      -> 13000
 * - /src/app-feature-x -> 13001
 * - release app-main, allocate /src/app-fix -> 13000
 */

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::probe::PortProbe;
use crate::errors::{DevportError, Result};
use crate::lock::LeaseLock;
use crate::store::{validate_workspace, PortAssignment, PortStore, PortTable};

/// Default first port of the allocation range
pub const DEFAULT_PORT_RANGE_START: u16 = 13000;

/// Default last port (inclusive) of the allocation range
pub const DEFAULT_PORT_RANGE_END: u16 = 13099;

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Validated range. Port 0 is never allocatable.
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 {
            return Err(DevportError::InvalidRange(
                "range must start at port 1 or above".to_string(),
            ));
        }
        if start > end {
            return Err(DevportError::InvalidRange(format!(
                "start {} is greater than end {}",
                start, end
            )));
        }
        Ok(PortRange { start, end })
    }

    /// Check if port is within this range
    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    /// Number of ports in the range
    pub fn len(&self) -> usize {
        (self.end as usize + 1).saturating_sub(self.start as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidate ports in allocation order (ascending)
    pub fn ports(&self) -> std::ops::RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        PortRange {
            start: DEFAULT_PORT_RANGE_START,
            end: DEFAULT_PORT_RANGE_END,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Assigns and releases workspace ports over an explicit store, lease and probe
pub struct PortAllocator {
    store: Arc<dyn PortStore>,
    lock: Arc<dyn LeaseLock>,
    probe: Arc<dyn PortProbe>,
    range: PortRange,
}

impl PortAllocator {
    pub fn new(
        store: Arc<dyn PortStore>,
        lock: Arc<dyn LeaseLock>,
        probe: Arc<dyn PortProbe>,
        range: PortRange,
    ) -> Self {
        PortAllocator {
            store,
            lock,
            probe,
            range,
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Allocate a port for a workspace
    ///
    /// # Arguments
    /// * `workspace` - Absolute path of the workspace (table key)
    /// * `repo` - Repository name recorded with the assignment
    /// * `branch` - Branch name recorded with the assignment
    ///
    /// # Returns
    /// The existing assignment if the workspace already has one, otherwise a
    /// new assignment on the lowest acceptable port.
    ///
    /// # Errors
    /// - `InvalidWorkspace` if the path is not absolute
    /// - `LockTimeout` if the table lease cannot be obtained
    /// - `PortRangeExhausted` if every port in range is reserved or bound
    pub fn allocate(&self, workspace: &Path, repo: &str, branch: &str) -> Result<PortAssignment> {
        validate_workspace(workspace)?;
        let _lease = self.lock.acquire()?;

        let mut table = self.store.load();

        // Existing assignments were probed when created
        if let Some(existing) = table.get(workspace) {
            debug!(workspace = %workspace.display(), port = existing.port, "Reusing assignment");
            return Ok(existing.clone());
        }

        for candidate in self.range.ports() {
            if let Some(holder) = table.reserved_by(candidate) {
                debug!(port = candidate, holder = %holder.workspace.display(), "Port reserved");
                continue;
            }

            if !self.probe.is_free(candidate) {
                continue;
            }

            let assignment = PortAssignment {
                port: candidate,
                workspace: workspace.to_path_buf(),
                repo: repo.to_string(),
                branch: branch.to_string(),
                started: Utc::now(),
            };
            table.insert(assignment.clone());
            self.store.save(&table)?;

            info!(
                workspace = %workspace.display(),
                port = candidate,
                repo,
                branch,
                "Port allocated"
            );
            return Ok(assignment);
        }

        Err(DevportError::PortRangeExhausted {
            start: self.range.start,
            end: self.range.end,
        })
    }

    /// Release a workspace's port allocation
    ///
    /// # Returns
    /// true if released, false if the workspace had no allocation
    pub fn release(&self, workspace: &Path) -> Result<bool> {
        let _lease = self.lock.acquire()?;

        let mut table = self.store.load();
        match table.remove(workspace) {
            Some(removed) => {
                self.store.save(&table)?;
                info!(workspace = %workspace.display(), port = removed.port, "Port released");
                Ok(true)
            }
            None => {
                debug!(workspace = %workspace.display(), "Nothing to release");
                Ok(false)
            }
        }
    }

    /// Snapshot of every assignment. Takes no lease; may be stale by the time
    /// the caller looks at it.
    pub fn list(&self) -> PortTable {
        self.store.load()
    }

    /// Current assignment for one workspace, read without a lease
    pub fn get(&self, workspace: &Path) -> Option<PortAssignment> {
        self.store.load().get(workspace).cloned()
    }
}
