//! Tests for the maintenance worker
//!
//! These tests verify:
//! - No worker is started without interval hints
//! - Scheduled cleanup purges expired entries
//! - Scheduled compaction shrinks the file
//! - The worker exits when stopped or when the store closes

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stashkv::{Config, MaintenanceWorker, ManualClock, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    (temp_dir, path)
}

/// Poll `condition` until it holds or five seconds pass
fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// =============================================================================
// Worker Tests
// =============================================================================

#[test]
fn test_no_hints_no_worker() {
    let (_temp, path) = setup_temp_store();
    let store = Arc::new(Store::open_path(&path).unwrap());

    assert!(MaintenanceWorker::spawn(store).unwrap().is_none());
}

#[test]
fn test_scheduled_cleanup() {
    let (_temp, path) = setup_temp_store();
    let clock = ManualClock::new(1_000_000);
    let config = Config::builder()
        .path(&path)
        .cleanup_interval(Duration::from_millis(20))
        .clock(clock.clone())
        .build();
    let store = Arc::new(Store::open(config).unwrap());

    store.put("short", 1, Some(Duration::from_secs(5))).unwrap();
    store.put("long", 2, None).unwrap();

    let mut worker = MaintenanceWorker::spawn(Arc::clone(&store)).unwrap().unwrap();
    assert!(worker.is_running());

    clock.advance(Duration::from_secs(6));
    assert!(wait_for(|| store.len().unwrap() == 1));
    assert_eq!(store.get::<i64>("long").unwrap(), Some(2));

    worker.stop();
    assert!(!worker.is_running());
}

#[test]
fn test_scheduled_compaction() {
    let (_temp, path) = setup_temp_store();
    let config = Config::builder()
        .path(&path)
        .compaction_interval(Duration::from_millis(20))
        .build();
    let store = Arc::new(Store::open(config).unwrap());

    for i in 0..20i64 {
        store.put("same", i, None).unwrap();
    }
    let before = store.stats().unwrap().file_size;

    let _worker = MaintenanceWorker::spawn(Arc::clone(&store)).unwrap().unwrap();

    assert!(wait_for(|| store.stats().unwrap().file_size < before));
    assert_eq!(store.get::<i64>("same").unwrap(), Some(19));
}

#[test]
fn test_worker_exits_when_store_closes() {
    let (_temp, path) = setup_temp_store();
    let config = Config::builder()
        .path(&path)
        .cleanup_interval(Duration::from_millis(10))
        .build();
    let store = Arc::new(Store::open(config).unwrap());

    let worker = MaintenanceWorker::spawn(Arc::clone(&store)).unwrap().unwrap();
    store.close().unwrap();

    assert!(wait_for(|| !worker.is_running()));
}

#[test]
fn test_drop_stops_worker() {
    let (_temp, path) = setup_temp_store();
    let config = Config::builder()
        .path(&path)
        .cleanup_interval(Duration::from_secs(3600))
        .build();
    let store = Arc::new(Store::open(config).unwrap());

    let worker = MaintenanceWorker::spawn(Arc::clone(&store)).unwrap().unwrap();
    drop(worker);

    // The worker's clone of the store is gone once the thread has joined
    assert_eq!(Arc::strong_count(&store), 1);
}
