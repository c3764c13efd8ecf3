//! In-memory store for tests and embedding

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{PortStore, PortTable};
use crate::errors::Result;

#[derive(Debug, Default)]
pub struct MemoryPortStore {
    table: Mutex<PortTable>,
    saves: AtomicUsize,
}

impl MemoryPortStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: PortTable) -> Self {
        MemoryPortStore {
            table: Mutex::new(table),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PortStore for MemoryPortStore {
    fn load(&self) -> PortTable {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, table: &PortTable) -> Result<()> {
        *self.table.lock().unwrap_or_else(|e| e.into_inner()) = table.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
