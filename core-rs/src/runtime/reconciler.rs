//! Stored-port vs. bound-port reconciliation
//!
//! A container may end up on a different host port than the one allocated
//! (a collaborator passed a different `-p`, or the runtime remapped it). The
//! runtime is the ground truth once a container runs; the reconciler moves the
//! table entry to match.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ContainerRuntime, DEFAULT_WORKSPACE_LABEL};
use crate::errors::{DevportError, Result};
use crate::lock::LeaseLock;
use crate::store::{validate_workspace, PortStore};

/// Result of one `reconcile` pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Runtime gave no usable answer; stored assignment left alone
    Unknown,
    /// Container found but the workspace holds no allocation
    NotAllocated,
    InSync(u16),
    Corrected { from: u16, to: u16 },
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Unknown => write!(f, "actual port unknown"),
            ReconcileOutcome::NotAllocated => write!(f, "no allocation"),
            ReconcileOutcome::InSync(port) => write!(f, "in sync on {}", port),
            ReconcileOutcome::Corrected { from, to } => write!(f, "corrected {} -> {}", from, to),
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn PortStore>,
    lock: Arc<dyn LeaseLock>,
    runtime: Arc<dyn ContainerRuntime>,
    label_key: String,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn PortStore>,
        lock: Arc<dyn LeaseLock>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Reconciler {
            store,
            lock,
            runtime,
            label_key: DEFAULT_WORKSPACE_LABEL.to_string(),
        }
    }

    /// Label whose value is the workspace path
    pub fn with_label_key(mut self, label_key: impl Into<String>) -> Self {
        self.label_key = label_key.into();
        self
    }

    /// First host port published by the workspace's running container
    ///
    /// Best-effort: a missing container, an unavailable runtime or output
    /// of an unexpected shape all give `None`.
    pub fn query_actual_port(&self, workspace: &Path) -> Option<u16> {
        match self.try_query_actual_port(workspace) {
            Ok(port) => port,
            Err(e) => {
                warn!(workspace = %workspace.display(), error = %e, "Runtime query failed");
                None
            }
        }
    }

    fn try_query_actual_port(&self, workspace: &Path) -> Result<Option<u16>> {
        let label_value = workspace.to_string_lossy();
        let ids = self
            .runtime
            .list_containers_by_label(&self.label_key, &label_value)?;

        let Some(id) = ids.first() else {
            debug!(workspace = %workspace.display(), "No running container");
            return Ok(None);
        };
        if ids.len() > 1 {
            debug!(
                workspace = %workspace.display(),
                count = ids.len(),
                container = %id,
                "Several containers match; using the first"
            );
        }

        let bindings = self.runtime.inspect_port_bindings(id)?;
        Ok(bindings.first().map(|b| b.host_port))
    }

    /// Point the workspace's stored assignment at `actual_port`
    ///
    /// Only `port` changes; `repo`, `branch` and `started` are kept. If
    /// another workspace holds `actual_port`, its reservation is removed and
    /// it gets a fresh port on its next `allocate`.
    ///
    /// # Returns
    /// true if the workspace had an assignment, false (no-op) otherwise
    pub fn update(&self, workspace: &Path, actual_port: u16) -> Result<bool> {
        validate_workspace(workspace)?;
        Ok(self.replace_port(workspace, actual_port)?.is_some())
    }

    /// Query the runtime and correct the stored port if it drifted
    pub fn reconcile(&self, workspace: &Path) -> Result<ReconcileOutcome> {
        validate_workspace(workspace)?;

        let Some(actual) = self.query_actual_port(workspace) else {
            return Ok(ReconcileOutcome::Unknown);
        };

        Ok(match self.replace_port(workspace, actual)? {
            None => ReconcileOutcome::NotAllocated,
            Some(previous) if previous == actual => ReconcileOutcome::InSync(actual),
            Some(previous) => ReconcileOutcome::Corrected {
                from: previous,
                to: actual,
            },
        })
    }

    /// Returns the port stored before the change, `None` if no entry
    fn replace_port(&self, workspace: &Path, actual_port: u16) -> Result<Option<u16>> {
        if actual_port == 0 {
            return Err(DevportError::InvalidRange(
                "port 0 cannot be assigned".to_string(),
            ));
        }

        let _lease = self.lock.acquire()?;
        let mut table = self.store.load();

        let Some(previous) = table.get(workspace).map(|entry| entry.port) else {
            debug!(workspace = %workspace.display(), "No allocation to update");
            return Ok(None);
        };
        if previous == actual_port {
            return Ok(Some(previous));
        }

        // The runtime cannot have bound the port for two containers, so any
        // other reservation on it is stale. Drop it to keep ports unique.
        let holder = table
            .reserved_by(actual_port)
            .map(|other| other.workspace.clone());
        if let Some(holder) = holder {
            table.remove(&holder);
            warn!(
                workspace = %workspace.display(),
                port = actual_port,
                evicted = %holder.display(),
                "Bound port was reserved by another workspace; dropped that reservation"
            );
        }

        if let Some(entry) = table.get_mut(workspace) {
            entry.port = actual_port;
        }
        self.store.save(&table)?;

        info!(
            workspace = %workspace.display(),
            from = previous,
            to = actual_port,
            "Stored port corrected"
        );
        Ok(Some(previous))
    }
}
