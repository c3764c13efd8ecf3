// Port Table Contract Tests
//
// The JSON table is read by other tools (shell prompts, editor plugins,
// older devport builds). Its shape and write discipline MUST NEVER BREAK.

use devport_core::{
    DirLock, FixedProbe, FixedRuntime, JsonPortStore, LeaseLock, PortAllocator, PortRange,
    PortStore, Reconciler,
};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn allocator(ports_file: &Path) -> PortAllocator {
    PortAllocator::new(
        Arc::new(JsonPortStore::new(ports_file)),
        Arc::new(DirLock::for_resource(ports_file)),
        Arc::new(FixedProbe::all_free()),
        PortRange::default(),
    )
}

/// WHY: On disk the table is `{ "<workspace>": { port, repo, branch, started } }`
/// REASON: External scripts do `jq '.["/path/to/ws"].port' ports.json`
/// BREAKS: Every consumer that is not this crate
/// SACRIFICES: If this fails, you renamed or nested a field consumers read
#[test]
fn on_disk_shape_is_keyed_by_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    let workspace = temp_dir.path().join("app-main");

    allocator(&ports_file).allocate(&workspace, "app", "main").unwrap();

    let doc: Value = serde_json::from_str(&fs::read_to_string(&ports_file).unwrap()).unwrap();
    let map = doc.as_object().unwrap();
    assert_eq!(map.len(), 1);

    let key = workspace.to_string_lossy().to_string();
    let entry = map.get(&key).unwrap().as_object().unwrap();

    let mut fields: Vec<&str> = entry.keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["branch", "port", "repo", "started"]);

    assert_eq!(entry["port"], 13000);
    assert_eq!(entry["repo"], "app");
    assert_eq!(entry["branch"], "main");
    // RFC 3339 timestamp
    assert!(chrono::DateTime::parse_from_rfc3339(entry["started"].as_str().unwrap()).is_ok());
}

/// WHY: Saves replace the file atomically and leave no temp files behind
/// REASON: A reader racing a writer must see the old or the new table, never half
/// BREAKS: Concurrent `list` calls see truncated JSON and report no reservations
/// SACRIFICES: If this fails, readers occasionally "lose" every allocation
#[test]
fn saves_leave_only_the_table() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    let alloc = allocator(&ports_file);

    for name in ["a", "b", "c"] {
        alloc.allocate(&temp_dir.path().join(name), "app", name).unwrap();
    }
    alloc.release(&temp_dir.path().join("b")).unwrap();

    let entries: Vec<String> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["ports.json".to_string()]);
}

/// WHY: A corrupt or unreadable table reads as empty instead of failing
/// REASON: Listing is informational; a broken file must not break every command
/// BREAKS: One bad write would make `devport list` unusable until fixed by hand
/// SACRIFICES: If this fails, read paths start surfacing store errors to users
#[test]
fn corrupt_table_lists_empty() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");

    for garbage in ["", "not json", "[1, 2, 3]", "{\"/w\": {\"port\": \"high\"}}"] {
        fs::write(&ports_file, garbage).unwrap();
        assert!(allocator(&ports_file).list().is_empty(), "for {:?}", garbage);
    }
}

/// WHY: `update` changes only the port; repo, branch and started are kept
/// REASON: `started` dates when the workspace first got a port, not the last correction
/// BREAKS: Age-based cleanup scripts would treat every reconciled workspace as new
/// SACRIFICES: If this fails, reconciliation destroys allocation history
#[test]
fn update_changes_only_port() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    let workspace = temp_dir.path().join("ws");

    allocator(&ports_file).allocate(&workspace, "app", "feature").unwrap();
    let read_entry = || -> Value {
        let doc: Value = serde_json::from_str(&fs::read_to_string(&ports_file).unwrap()).unwrap();
        doc[&*workspace.to_string_lossy()].clone()
    };
    let before = read_entry();

    let lock: Arc<dyn LeaseLock> = Arc::new(DirLock::for_resource(&ports_file));
    let reconciler = Reconciler::new(
        Arc::new(JsonPortStore::new(&ports_file)),
        lock,
        Arc::new(FixedRuntime::new()),
    );
    assert!(reconciler.update(&workspace, 13055).unwrap());

    let after = read_entry();
    assert_eq!(after["port"], 13055);
    assert_eq!(after["repo"], before["repo"]);
    assert_eq!(after["branch"], before["branch"]);
    assert_eq!(after["started"], before["started"]);
}

/// WHY: Loading a table written by hand rehydrates workspace from the key
/// REASON: The key is the single source of the workspace path
/// BREAKS: Lookups by path after a reload return nothing
/// SACRIFICES: If this fails, every reload forgets who owns which port
#[test]
fn hand_written_table_loads() {
    let temp_dir = TempDir::new().unwrap();
    let ports_file = temp_dir.path().join("ports.json");
    fs::write(
        &ports_file,
        r#"{
  "/home/dev/app-main": {
    "port": 13004,
    "repo": "app",
    "branch": "main",
    "started": "2024-05-01T09:30:00Z"
  }
}"#,
    )
    .unwrap();

    let table = JsonPortStore::new(&ports_file).load();
    let entry = table.get(Path::new("/home/dev/app-main")).unwrap();
    assert_eq!(entry.port, 13004);
    assert_eq!(entry.workspace, Path::new("/home/dev/app-main"));

    // And the allocator respects it
    let next = allocator(&ports_file)
        .allocate(&temp_dir.path().join("other"), "app", "other")
        .unwrap();
    assert_eq!(next.port, 13000);
    assert!(allocator(&ports_file).list().is_reserved(13004));
}
