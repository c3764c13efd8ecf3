/**
 * lock module
 * Advisory, single-host leases guarding the port table
 *
 * A lease is held for the duration of one mutation (allocate, release,
 * update). Release happens exactly once, when the `Lease` guard goes out of
 * scope, whatever path the caller takes out of the critical section.
 */

pub mod dir_lock;
pub mod memory;

pub use dir_lock::{DirLock, LockOptions};
pub use memory::MemoryLock;

use crate::errors::Result;

/// Something a `Lease` hands its slot back to.
pub trait LeaseRelease: Send {
    fn release(self: Box<Self>);
}

/// Mutual exclusion over a single named resource.
///
/// Implementations are not reentrant: a second `acquire` from the same owner
/// waits like any other contender.
pub trait LeaseLock: Send + Sync {
    /// Block until the lease is obtained or the implementation's wait budget
    /// runs out (`DevportError::LockTimeout`).
    fn acquire(&self) -> Result<Lease>;

    /// Human-readable name of the guarded resource, for logs and errors.
    fn resource(&self) -> String;
}

/// Held lease. Dropping it releases the underlying slot.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct Lease {
    releaser: Option<Box<dyn LeaseRelease>>,
}

impl Lease {
    pub fn new(releaser: impl LeaseRelease + 'static) -> Self {
        Lease {
            releaser: Some(Box::new(releaser)),
        }
    }

    /// Release now instead of at end of scope.
    pub fn release(mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release();
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release();
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("held", &self.releaser.is_some())
            .finish()
    }
}
