//! In-process lease for tests and embedding

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{Lease, LeaseLock, LeaseRelease};
use crate::errors::{DevportError, Result};

#[derive(Default)]
struct Slot {
    held: Mutex<bool>,
    freed: Condvar,
}

/// `LeaseLock` without a filesystem. Clones share the same slot.
#[derive(Clone)]
pub struct MemoryLock {
    name: String,
    slot: Arc<Slot>,
    wait_budget: Duration,
}

impl MemoryLock {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryLock {
            name: name.into(),
            slot: Arc::new(Slot::default()),
            wait_budget: super::dir_lock::DEFAULT_WAIT_BUDGET,
        }
    }

    pub fn with_wait_budget(mut self, wait_budget: Duration) -> Self {
        self.wait_budget = wait_budget;
        self
    }

    pub fn is_held(&self) -> bool {
        *self.slot.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LeaseLock for MemoryLock {
    fn acquire(&self) -> Result<Lease> {
        let started = Instant::now();
        let held = self.slot.held.lock().unwrap_or_else(|e| e.into_inner());
        let (mut held, _) = self
            .slot
            .freed
            .wait_timeout_while(held, self.wait_budget, |held| *held)
            .unwrap_or_else(|e| e.into_inner());

        if *held {
            return Err(DevportError::LockTimeout {
                resource: self.resource(),
                waited: started.elapsed(),
            });
        }
        *held = true;

        Ok(Lease::new(MemoryLease {
            slot: self.slot.clone(),
        }))
    }

    fn resource(&self) -> String {
        format!("memory:{}", self.name)
    }
}

struct MemoryLease {
    slot: Arc<Slot>,
}

impl LeaseRelease for MemoryLease {
    fn release(self: Box<Self>) {
        let mut held = self.slot.held.lock().unwrap_or_else(|e| e.into_inner());
        *held = false;
        self.slot.freed.notify_one();
    }
}
