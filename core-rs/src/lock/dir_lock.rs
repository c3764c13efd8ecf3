//! Directory-based lease with stale-holder recovery
//!
//! `create_dir` is atomic create-if-absent on every filesystem we care about,
//! so the marker directory itself is the lock. Its mtime is the lease start.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use super::{Lease, LeaseLock, LeaseRelease};
use crate::errors::{DevportError, Result};

/// Default age after which a held lease is presumed abandoned
pub const DEFAULT_MAX_LEASE_AGE: Duration = Duration::from_secs(10);

/// Default sleep between contended attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Default total time `acquire` may block
pub const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(50);

/// Timing knobs for `DirLock`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub max_lease_age: Duration,
    pub retry_interval: Duration,
    pub wait_budget: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions {
            max_lease_age: DEFAULT_MAX_LEASE_AGE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            wait_budget: DEFAULT_WAIT_BUDGET,
        }
    }
}

/// What a failed `create_dir` found at the slot
enum SlotState {
    /// Holder looks alive, wait
    Held,
    /// Slot is gone or was reclaimed, retry immediately
    Contested,
}

/// Lease backed by a marker directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirLock {
    path: PathBuf,
    options: LockOptions,
}

impl DirLock {
    /// Lock guarding `resource_path`: the marker lives at `<resource_path>.lock`.
    ///
    /// # Example
    /// ```no_run
    /// use devport_core::lock::{DirLock, LeaseLock};
    ///
    /// let lock = DirLock::for_resource("/home/me/.cache/devport/ports.json");
    /// let lease = lock.acquire()?;
    /// // ... mutate ports.json ...
    /// drop(lease);
    /// # Ok::<(), devport_core::DevportError>(())
    /// ```
    pub fn for_resource<P: AsRef<Path>>(resource_path: P) -> Self {
        let mut marker = resource_path.as_ref().as_os_str().to_owned();
        marker.push(".lock");
        DirLock {
            path: PathBuf::from(marker),
            options: LockOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    /// Marker directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> LockOptions {
        self.options
    }

    fn inspect_slot(&self) -> Result<SlotState> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            // Another contender released or reclaimed it between our
            // create attempt and the stat.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SlotState::Contested),
            Err(e) => return Err(e.into()),
        };

        // A clock step backwards makes the lease look younger, never stale.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age <= self.options.max_lease_age {
            return Ok(SlotState::Held);
        }

        if self.reclaim_if_unchanged(modified)? {
            warn!(
                path = %self.path.display(),
                age_ms = age.as_millis() as u64,
                "Reclaimed stale lease"
            );
        }
        Ok(SlotState::Contested)
    }

    /// Remove the marker only if its mtime is still `observed`
    ///
    /// Narrows the stat-then-remove window: a contender that already
    /// reclaimed and re-created the slot leaves a newer mtime, and that
    /// lease is kept. Two stats and a remove are still not atomic, so a
    /// replacement inside the same mtime tick can be lost.
    fn reclaim_if_unchanged(&self, observed: SystemTime) -> Result<bool> {
        match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(current) if current == observed => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl LeaseLock for DirLock {
    fn acquire(&self) -> Result<Lease> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let started = Instant::now();
        loop {
            match fs::create_dir(&self.path) {
                Ok(()) => {
                    debug!(
                        path = %self.path.display(),
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Lease acquired"
                    );
                    return Ok(Lease::new(DirLease {
                        path: self.path.clone(),
                    }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let SlotState::Contested = self.inspect_slot()? {
                        continue;
                    }
                    let waited = started.elapsed();
                    if waited >= self.options.wait_budget {
                        return Err(DevportError::LockTimeout {
                            resource: self.resource(),
                            waited,
                        });
                    }
                    thread::sleep(self.options.retry_interval);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn resource(&self) -> String {
        self.path.display().to_string()
    }
}

struct DirLease {
    path: PathBuf,
}

impl LeaseRelease for DirLease {
    fn release(self: Box<Self>) {
        // Staleness detection reclaims whatever we fail to remove here.
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to release lease");
            }
        } else {
            debug!(path = %self.path.display(), "Lease released");
        }
    }
}
