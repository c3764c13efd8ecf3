//! JSON file store with atomic whole-file replace

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::{PortStore, PortTable};
use crate::errors::{DevportError, Result};

/// Port table persisted as one JSON document
#[derive(Debug, Clone)]
pub struct JsonPortStore {
    path: PathBuf,
}

impl JsonPortStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonPortStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read, distinguishing "absent" (empty table) from
    /// "present but unusable" (`StoreCorrupt`).
    pub fn read_table(&self) -> Result<PortTable> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No port table yet");
                return Ok(PortTable::new());
            }
            Err(e) => {
                return Err(DevportError::StoreCorrupt(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut table: PortTable = serde_json::from_str(&content).map_err(|e| {
            DevportError::StoreCorrupt(format!("invalid JSON in {}: {}", self.path.display(), e))
        })?;
        table.rehydrate();
        Ok(table)
    }

    fn temp_path(&self, dir: &Path) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ports.json".to_string());
        dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
    }
}

impl PortStore for JsonPortStore {
    fn load(&self) -> PortTable {
        match self.read_table() {
            Ok(table) => table,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Treating port table as empty");
                PortTable::new()
            }
        }
    }

    fn save(&self, table: &PortTable) -> Result<()> {
        let mut json = serde_json::to_string_pretty(table)?;
        json.push('\n');

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // Same directory as the target so the rename stays on one filesystem
        let temp_path = self.temp_path(&dir);
        let written = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .and_then(|mut file| {
                file.write_all(json.as_bytes())?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&temp_path, &self.path));

        if let Err(e) = written {
            fs::remove_file(&temp_path).ok();
            return Err(e.into());
        }

        debug!(path = %self.path.display(), entries = table.len(), "Port table saved");
        Ok(())
    }
}
