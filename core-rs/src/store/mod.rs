/**
 * store module
 * Durable workspace -> port assignment table
 *
 * File format (ports.json):
 * ```json
 * {
 *   "/home/me/src/app-feature-x": {
 *     "port": 13000,
 *     "repo": "app",
 *     "branch": "feature-x",
 *     "started": "2026-10-14T09:12:44.120391Z"
 *   }
 * }
 * ```
 *
 * The workspace path is the key and is not repeated inside the value.
 */

pub mod json_store;
pub mod memory;

pub use json_store::JsonPortStore;
pub use memory::MemoryPortStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{DevportError, Result};

/// Workspaces are keyed by absolute path; anything else cannot be a stable key.
pub fn validate_workspace(workspace: &Path) -> Result<()> {
    if workspace.as_os_str().is_empty() || !workspace.is_absolute() {
        return Err(DevportError::InvalidWorkspace(format!(
            "workspace must be an absolute path, got '{}'",
            workspace.display()
        )));
    }
    // Keys are strings; lossy conversion would merge distinct paths
    if workspace.to_str().is_none() {
        return Err(DevportError::InvalidWorkspace(format!(
            "workspace path is not valid UTF-8: '{}'",
            workspace.display()
        )));
    }
    Ok(())
}

/// One workspace's reserved port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    pub port: u16,
    /// Populated from the table key on load
    #[serde(skip)]
    pub workspace: PathBuf,
    pub repo: String,
    pub branch: String,
    pub started: DateTime<Utc>,
}

impl PortAssignment {
    pub fn new(
        workspace: impl Into<PathBuf>,
        port: u16,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        PortAssignment {
            port,
            workspace: workspace.into(),
            repo: repo.into(),
            branch: branch.into(),
            started: Utc::now(),
        }
    }
}

/// Whole-table snapshot, keyed by workspace path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortTable {
    entries: BTreeMap<String, PortAssignment>,
}

fn workspace_key(workspace: &Path) -> String {
    workspace.to_string_lossy().into_owned()
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, workspace: &Path) -> Option<&PortAssignment> {
        self.entries.get(&workspace_key(workspace))
    }

    pub fn get_mut(&mut self, workspace: &Path) -> Option<&mut PortAssignment> {
        self.entries.get_mut(&workspace_key(workspace))
    }

    /// Insert or replace the entry for `assignment.workspace`
    pub fn insert(&mut self, assignment: PortAssignment) -> Option<PortAssignment> {
        self.entries
            .insert(workspace_key(&assignment.workspace), assignment)
    }

    pub fn remove(&mut self, workspace: &Path) -> Option<PortAssignment> {
        self.entries.remove(&workspace_key(workspace))
    }

    /// Entry currently holding `port`, if any
    pub fn reserved_by(&self, port: u16) -> Option<&PortAssignment> {
        self.entries.values().find(|a| a.port == port)
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved_by(port).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assignments ordered by workspace path
    pub fn iter(&self) -> impl Iterator<Item = &PortAssignment> {
        self.entries.values()
    }

    /// Every reserved port, ascending
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.entries.values().map(|a| a.port).collect();
        ports.sort_unstable();
        ports
    }

    /// Restore each assignment's `workspace` from its key after deserializing
    pub(crate) fn rehydrate(&mut self) {
        for (key, assignment) in self.entries.iter_mut() {
            assignment.workspace = PathBuf::from(key);
        }
    }
}

/// Persistence for the port table
///
/// `load` never fails: an absent or unreadable backing document is an empty
/// table. `save` replaces the whole document.
pub trait PortStore: Send + Sync {
    fn load(&self) -> PortTable;

    fn save(&self, table: &PortTable) -> Result<()>;
}
