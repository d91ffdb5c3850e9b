//! No-mock end-to-end tests for the local activity dump store.
//!
//! Validates, against real temp directories:
//! - Capacity enforcement and LRU eviction across persists
//! - Byte-exact artifacts (plain and gzip) under their final names
//! - Startup reconciliation of pre-existing dumps
//! - Telemetry flush semantics, including under concurrent persists
//! - Cleanup observer notification before deletion

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use ad_common::{DumpMetadata, LocalStorageConfig, StorageFormat, StorageRequest};
use ad_storage::{
    gzip_decompress, CleanupObserver, DumpStorage, LocalStore, MemorySink, MetricsSink,
    METRIC_LOCAL_STORAGE_COUNT, METRIC_LOCAL_STORAGE_DELETED,
};
use proptest::prelude::*;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Helpers
// ============================================================================

fn json_config(root: &Path, capacity: usize) -> LocalStorageConfig {
    LocalStorageConfig::new(root.join("dumps"), capacity).with_formats(vec![StorageFormat::Json])
}

fn persist(store: &LocalStore, name: &str, data: &[u8]) -> PathBuf {
    let request = store.request(StorageFormat::Json);
    store
        .persist(&request, &mut DumpMetadata::new(name), data)
        .unwrap()
}

/// Create a dump file with a simulated age.
fn create_fake_dump(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, b"{\"fake\":true}").unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(age_secs);
    let ft = filetime::FileTime::from_system_time(mtime);
    filetime::set_file_times(&path, ft, ft).unwrap();
    path
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[derive(Default)]
struct RecordingObserver {
    notified: Mutex<Vec<Vec<PathBuf>>>,
}

impl CleanupObserver for RecordingObserver {
    fn on_local_storage_cleanup(&self, paths: &[PathBuf]) {
        self.notified.lock().unwrap().push(paths.to_vec());
    }
}

// ============================================================================
// Capacity and eviction
// ============================================================================

#[test]
fn capacity_two_third_persist_evicts_first() {
    let dir = tempdir().unwrap();
    let store = LocalStore::open(json_config(dir.path(), 2)).unwrap();

    let d1 = persist(&store, "d1", b"aaaaa");
    let d2 = persist(&store, "d2", b"bbbbb");
    let d3 = persist(&store, "d3", b"ccccc");

    assert_eq!(store.identities(), vec!["d2".to_string(), "d3".to_string()]);
    assert!(!d1.exists());
    assert!(d2.exists());
    assert!(d3.exists());
    assert_eq!(store.pending_deleted_count(), 1);
    assert_eq!(files_in(store.output_directory()), vec!["d2.json", "d3.json"]);
}

#[test]
fn capacity_n_plus_one_distinct_dumps() {
    let dir = tempdir().unwrap();
    let capacity = 5;
    let store = LocalStore::open(json_config(dir.path(), capacity)).unwrap();

    let paths: Vec<PathBuf> = (0..=capacity)
        .map(|i| persist(&store, &format!("dump-{}", i), b"payload"))
        .collect();

    assert_eq!(store.len(), capacity);
    assert!(!store.contains("dump-0"));
    assert!(!paths[0].exists());
    assert!(paths[1..].iter().all(|p| p.exists()));
    assert_eq!(store.pending_deleted_count(), 1);
}

#[test]
fn eviction_removes_every_format_of_a_dump() {
    let dir = tempdir().unwrap();
    let config = json_config(dir.path(), 1)
        .with_formats(vec![StorageFormat::Json, StorageFormat::Dot]);
    let store = LocalStore::open(config).unwrap();

    let mut dump = DumpMetadata::new("multi");
    let json = store
        .persist(&store.request(StorageFormat::Json), &mut dump, b"{}")
        .unwrap();
    let dot = store
        .persist(&store.request(StorageFormat::Dot), &mut dump, b"digraph {}")
        .unwrap();
    let gz_request =
        StorageRequest::local(store.output_directory(), StorageFormat::Json, true);
    let gz = store.persist(&gz_request, &mut dump, b"{}").unwrap();

    persist(&store, "next", b"{}");

    assert!(!json.exists());
    assert!(!dot.exists());
    assert!(!gz.exists());
    assert_eq!(store.pending_deleted_count(), 1);
    assert_eq!(files_in(store.output_directory()), vec!["next.json"]);
}

#[test]
fn observer_receives_evicted_paths() {
    let dir = tempdir().unwrap();
    let observer = Arc::new(RecordingObserver::default());
    let store = LocalStore::builder(json_config(dir.path(), 1))
        .cleanup_observer(observer.clone())
        .open()
        .unwrap();

    let first = persist(&store, "first", b"1");
    persist(&store, "second", b"2");

    let notified = observer.notified.lock().unwrap();
    assert_eq!(notified.as_slice(), &[vec![first]]);
}

// ============================================================================
// Artifact content
// ============================================================================

#[test]
fn persisted_bytes_are_identical() {
    let dir = tempdir().unwrap();
    let store = LocalStore::open(json_config(dir.path(), 3)).unwrap();
    let data: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();

    let path = persist(&store, "big", &data);

    assert_eq!(fs::read(&path).unwrap(), data);
    assert!(fs::metadata(&path).unwrap().permissions().readonly());
    assert!(!path.with_file_name("big.json.tmp").exists());
}

#[test]
fn compressed_persist_decompresses_to_input() {
    let dir = tempdir().unwrap();
    let store = LocalStore::open(json_config(dir.path(), 3).with_compression(true)).unwrap();
    let data = b"{\"syscalls\":[\"open\",\"execve\"]}".repeat(100);
    let mut dump = DumpMetadata::new("zipped");

    let path = store
        .persist(&store.request(StorageFormat::Json), &mut dump, &data)
        .unwrap();

    assert!(path.to_string_lossy().ends_with("zipped.json.gz"));
    let on_disk = fs::read(&path).unwrap();
    assert_eq!(dump.size, on_disk.len() as u64);
    assert_eq!(gzip_decompress(&on_disk).unwrap(), data);
}

// ============================================================================
// Startup reconciliation
// ============================================================================

#[test]
fn reconciliation_collapses_formats_into_one_dump() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("dumps");
    let plain = create_fake_dump(&out, "a.json", 600);
    let gz = create_fake_dump(&out, "a.json.gz", 60);

    let store = LocalStore::open(json_config(dir.path(), 5)).unwrap();

    assert_eq!(store.len(), 1);
    let set = store.artifacts("a").unwrap();
    assert_eq!(set.files, vec![plain, gz.clone()]);
    assert_eq!(
        set.last_modified,
        Some(fs::metadata(&gz).unwrap().modified().unwrap())
    );
}

#[test]
fn reconciliation_evicts_oldest_when_over_capacity() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("dumps");
    let oldest = create_fake_dump(&out, "old.json", 3 * 3600);
    let middle = create_fake_dump(&out, "mid.json", 2 * 3600);
    let newest = create_fake_dump(&out, "new.json", 3600);
    create_fake_dump(&out, "unrelated.txt", 10 * 3600);

    let store = LocalStore::open(json_config(dir.path(), 2)).unwrap();

    assert_eq!(store.reconciled().discovered, 3);
    assert_eq!(store.reconciled().evicted, 1);
    assert!(!oldest.exists());
    assert!(middle.exists());
    assert!(newest.exists());
    assert!(out.join("unrelated.txt").exists());
    assert_eq!(store.identities(), vec!["mid".to_string(), "new".to_string()]);

    // Reconciled dumps age out before new ones.
    persist(&store, "fresh", b"{}");
    assert!(!middle.exists());
    assert!(newest.exists());
}

#[test]
fn reopen_sees_previous_session_dumps() {
    let dir = tempdir().unwrap();
    {
        let store = LocalStore::open(json_config(dir.path(), 3)).unwrap();
        persist(&store, "s1", b"1");
        persist(&store, "s2", b"2");
    }

    let store = LocalStore::open(json_config(dir.path(), 3)).unwrap();
    let names: HashSet<String> = store.identities().into_iter().collect();
    assert_eq!(names, HashSet::from(["s1".to_string(), "s2".to_string()]));
    assert_eq!(store.pending_deleted_count(), 0);
}

#[test]
fn reopen_manages_formats_outside_configured_set() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("dumps");
    // Default formats are [profile]; json is written anyway.
    let config = LocalStorageConfig::new(&out, 1);
    assert!(!config.recognizes(StorageFormat::Json));

    let first = {
        let store = LocalStore::open(config.clone()).unwrap();
        persist(&store, "a", b"{}")
    };

    let store = LocalStore::open(config).unwrap();
    assert_eq!(store.reconciled().discovered, 1);
    assert_eq!(store.artifacts("a").unwrap().files, vec![first.clone()]);

    persist(&store, "b", b"{}");
    persist(&store, "c", b"{}");

    assert!(!first.exists());
    assert_eq!(store.len(), 1);
    assert_eq!(store.pending_deleted_count(), 2);
    assert_eq!(files_in(&out), vec!["c.json"]);
}

// ============================================================================
// Telemetry
// ============================================================================

#[test]
fn telemetry_twice_reports_then_zero() {
    let dir = tempdir().unwrap();
    let store = LocalStore::open(json_config(dir.path(), 1)).unwrap();
    persist(&store, "a", b"1");
    persist(&store, "b", b"2");

    let first = MemorySink::new();
    store.send_telemetry(&first);
    let second = MemorySink::new();
    store.send_telemetry(&second);

    assert_eq!(first.count_total(METRIC_LOCAL_STORAGE_DELETED), Some(1));
    assert_eq!(second.count_total(METRIC_LOCAL_STORAGE_DELETED), None);
    assert_eq!(second.gauge_value(METRIC_LOCAL_STORAGE_COUNT), Some(1.0));
}

#[test]
fn concurrent_flushes_never_lose_or_double_count() {
    let dir = tempdir().unwrap();
    let store = Arc::new(LocalStore::open(json_config(dir.path(), 2)).unwrap());
    let sink = Arc::new(MemorySink::new());
    let writers = 4;
    let per_writer = 25;

    let mut handles = Vec::new();
    for w in 0..writers {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let request = store.request(StorageFormat::Json);
            for i in 0..per_writer {
                let mut dump = DumpMetadata::new(format!("w{}-{}", w, i));
                store.persist(&request, &mut dump, b"{}").unwrap();
            }
        }));
    }
    let flusher = {
        let store = Arc::clone(&store);
        let sink = Arc::clone(&sink);
        thread::spawn(move || {
            for _ in 0..50 {
                store.send_telemetry(sink.as_ref() as &dyn MetricsSink);
                thread::yield_now();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    flusher.join().unwrap();
    store.send_telemetry(sink.as_ref());

    let total = (writers * per_writer) as i64;
    assert_eq!(store.len(), 2);
    assert_eq!(
        sink.count_total(METRIC_LOCAL_STORAGE_DELETED),
        Some(total - 2)
    );
    assert_eq!(files_in(store.output_directory()).len(), 2);
}

// ============================================================================
// Properties
// ============================================================================

fn persist_sequence(dir: &TempDir, capacity: usize, names: &[u8]) -> (LocalStore, u64) {
    let store = LocalStore::open(json_config(dir.path(), capacity)).unwrap();
    for n in names {
        persist(&store, &format!("d{}", n), b"x");
    }
    let deleted = store.pending_deleted_count();
    (store, deleted)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn retained_dumps_never_exceed_capacity(
        capacity in 1usize..5,
        names in proptest::collection::vec(0u8..8, 0..24),
    ) {
        let dir = tempdir().unwrap();
        let (store, deleted) = persist_sequence(&dir, capacity, &names);

        let distinct: HashSet<u8> = names.iter().copied().collect();
        prop_assert!(store.len() <= capacity);
        prop_assert_eq!(store.len(), distinct.len().min(capacity));
        prop_assert_eq!(files_in(store.output_directory()).len(), store.len());

        // Reference LRU: every eviction is one dump that left the index.
        let mut live: Vec<u8> = Vec::new();
        let mut expected_deleted = 0u64;
        for n in &names {
            if let Some(pos) = live.iter().position(|x| x == n) {
                live.remove(pos);
            } else if live.len() == capacity {
                live.remove(0);
                expected_deleted += 1;
            }
            live.push(*n);
        }
        let expected: Vec<String> = live.iter().map(|n| format!("d{}", n)).collect();
        prop_assert_eq!(store.identities(), expected);
        prop_assert_eq!(deleted, expected_deleted);
    }
}
