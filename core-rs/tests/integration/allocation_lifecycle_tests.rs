//! Integration tests for the allocation lifecycle
//!
//! Tests the full lifecycle against the real JSON store and directory lease:
//! - Allocation and idempotent re-allocation
//! - Release and reuse
//! - Range exhaustion
//! - Degraded reads of missing/corrupt tables

use devport_core::{
    DevportError, DirLock, FixedProbe, JsonPortStore, LeaseLock, LockOptions, PortAllocator,
    PortProbe, PortRange, PortStore, TcpBindProbe,
};
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn allocator(ports_file: &Path, range: PortRange, probe: Arc<dyn PortProbe>) -> PortAllocator {
    let lock = DirLock::for_resource(ports_file).with_options(LockOptions {
        wait_budget: Duration::from_secs(5),
        ..LockOptions::default()
    });
    PortAllocator::new(
        Arc::new(JsonPortStore::new(ports_file)),
        Arc::new(lock),
        probe,
        range,
    )
}

fn ws(root: &Path, name: &str) -> PathBuf {
    root.join("workspaces").join(name)
}

#[test]
fn test_complete_allocation_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("cache/devport/ports.json");
    let alloc = allocator(&ports_file, PortRange::default(), Arc::new(FixedProbe::all_free()));

    // 1. Nothing yet, and no table file
    assert!(alloc.list().is_empty());
    assert!(!ports_file.exists());

    // 2. First allocation creates the table lazily
    let main = alloc.allocate(&ws(temp_dir.path(), "app-main"), "app", "main").unwrap();
    assert_eq!(main.port, 13000);
    assert!(ports_file.exists());

    // 3. Second workspace gets the next port
    let feat = alloc.allocate(&ws(temp_dir.path(), "app-feat"), "app", "feat").unwrap();
    assert_eq!(feat.port, 13001);

    // 4. Idempotent re-allocation, table untouched
    let bytes_before = fs::read(&ports_file).unwrap();
    let main_again = alloc.allocate(&ws(temp_dir.path(), "app-main"), "app", "main").unwrap();
    assert_eq!(main_again, main);
    assert_eq!(fs::read(&ports_file).unwrap(), bytes_before);

    // 5. Release removes it from list
    assert!(alloc.release(&ws(temp_dir.path(), "app-main")).unwrap());
    let table = alloc.list();
    assert!(table.get(&ws(temp_dir.path(), "app-main")).is_none());
    assert_eq!(table.len(), 1);

    // 6. Released port is reused first
    let fix = alloc.allocate(&ws(temp_dir.path(), "app-fix"), "app", "fix").unwrap();
    assert_eq!(fix.port, 13000);

    // 7. No leftover lease marker
    assert!(!DirLock::for_resource(&ports_file).path().exists());
}

#[test]
fn test_persistence_across_handles() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");

    let first = {
        let alloc = allocator(&ports_file, PortRange::default(), Arc::new(FixedProbe::all_free()));
        alloc.allocate(&ws(temp_dir.path(), "a"), "app", "a").unwrap()
    };

    let alloc = allocator(&ports_file, PortRange::default(), Arc::new(FixedProbe::all_free()));
    assert_eq!(alloc.get(&ws(temp_dir.path(), "a")), Some(first));
}

#[test]
fn test_release_unknown_workspace_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    let alloc = allocator(&ports_file, PortRange::default(), Arc::new(FixedProbe::all_free()));

    assert!(!alloc.release(&ws(temp_dir.path(), "ghost")).unwrap());
    assert!(alloc.list().is_empty());
}

#[test]
fn test_exhausted_range_leaves_table_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    let range = PortRange::new(13000, 13002).unwrap();
    let alloc = allocator(&ports_file, range, Arc::new(FixedProbe::all_free()));

    for name in ["a", "b", "c"] {
        alloc.allocate(&ws(temp_dir.path(), name), "app", name).unwrap();
    }
    let bytes_before = fs::read(&ports_file).unwrap();

    let err = alloc.allocate(&ws(temp_dir.path(), "d"), "app", "d").unwrap_err();
    assert!(matches!(
        err,
        DevportError::PortRangeExhausted { start: 13000, end: 13002 }
    ));
    assert!(err.to_string().contains("13000-13002"));
    assert_eq!(fs::read(&ports_file).unwrap(), bytes_before);
}

#[test]
fn test_real_probe_skips_bound_port() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");

    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let bound = listener.local_addr().unwrap().port();
    let range = PortRange::new(bound, bound).unwrap();
    let alloc = allocator(&ports_file, range, Arc::new(TcpBindProbe));

    let err = alloc.allocate(&ws(temp_dir.path(), "a"), "app", "a").unwrap_err();
    assert!(matches!(err, DevportError::PortRangeExhausted { .. }));

    drop(listener);
    let assigned = alloc.allocate(&ws(temp_dir.path(), "a"), "app", "a").unwrap();
    assert_eq!(assigned.port, bound);
}

#[test]
fn test_list_on_corrupt_table_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    fs::write(&ports_file, "{\"half\": ").unwrap();

    let alloc = allocator(&ports_file, PortRange::default(), Arc::new(FixedProbe::all_free()));
    assert!(alloc.list().is_empty());

    // Next write heals it
    alloc.allocate(&ws(temp_dir.path(), "a"), "app", "a").unwrap();
    assert!(JsonPortStore::new(&ports_file).read_table().is_ok());
}

#[test]
fn test_allocate_waits_for_held_lease_then_times_out() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    let lock = DirLock::for_resource(&ports_file).with_options(LockOptions {
        max_lease_age: Duration::from_secs(60),
        retry_interval: Duration::from_millis(10),
        wait_budget: Duration::from_millis(150),
    });
    let alloc = PortAllocator::new(
        Arc::new(JsonPortStore::new(&ports_file)),
        Arc::new(lock.clone()),
        Arc::new(FixedProbe::all_free()),
        PortRange::default(),
    );

    let held = lock.acquire().unwrap();
    let err = alloc.allocate(&ws(temp_dir.path(), "a"), "app", "a").unwrap_err();
    assert!(matches!(err, DevportError::LockTimeout { .. }));
    assert!(JsonPortStore::new(&ports_file).load().is_empty());

    held.release();
    assert!(alloc.allocate(&ws(temp_dir.path(), "a"), "app", "a").is_ok());
}
