//! Tests for the segmented store
//!
//! These tests verify:
//! - Open/create and manifest bookkeeping
//! - Read-your-write across rotations
//! - Rotation threshold behavior
//! - Tombstone deletes (within and across segments)
//! - Restart recovery and orphan cleanup
//! - Recovery from a failed rotation
//! - Concurrent writers

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use segkv::config::{Config, SyncStrategy};
use segkv::{KvError, Manifest, SegmentedStore};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const TEST_MAX_SEGMENT_SIZE: u64 = 1 << 10;

fn setup_temp_store(max_segment_size: u64) -> (TempDir, SegmentedStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = SegmentedStore::open(temp_dir.path(), max_segment_size).unwrap();
    (temp_dir, store)
}

fn put_keys(store: &SegmentedStore, count: usize) {
    for i in 0..count {
        store
            .put(format!("key{}", i).as_bytes(), format!("value{}", i).as_bytes())
            .unwrap();
    }
}

fn assert_keys(store: &SegmentedStore, count: usize) {
    for i in 0..count {
        let value = store.get(format!("key{}", i).as_bytes()).unwrap();
        assert_eq!(value, format!("value{}", i).into_bytes(), "key{}", i);
    }
}

fn segment_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".db"))
        .collect();
    names.sort();
    names
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory_segment_and_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let store = SegmentedStore::open(&data_dir, TEST_MAX_SEGMENT_SIZE).unwrap();

    assert!(data_dir.join("segment-0.db").exists());
    assert!(data_dir.join("manifest.json").exists());
    assert_eq!(store.segment_count(), 1);

    let manifest = Manifest::load(&data_dir).unwrap();
    assert_eq!(manifest.segments, vec!["segment-0.db".to_string()]);
    assert_eq!(manifest.active_index, 0);
}

#[test]
fn test_open_with_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_segment_size(4096)
        .queue_capacity(8)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();

    let store = SegmentedStore::open_with_config(config).unwrap();
    store.put(b"k", b"v").unwrap();
    store.flush().unwrap();

    assert_eq!(store.max_segment_size(), 4096);
    assert_eq!(store.get(b"k").unwrap(), b"v".to_vec());
}

#[test]
fn test_open_fails_when_listed_segment_is_missing() {
    let temp_dir = TempDir::new().unwrap();
    let mut manifest = Manifest::default();
    manifest.push_segment("segment-3.db");
    manifest.save(temp_dir.path()).unwrap();

    let result = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE);
    assert!(matches!(result, Err(KvError::Manifest(_))));
}

// =============================================================================
// Put / Get Tests
// =============================================================================

#[test]
fn test_put_get() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    store.put(b"hello", b"world").unwrap();
    store.flush().unwrap();

    assert_eq!(store.get(b"hello").unwrap(), b"world".to_vec());
}

#[test]
fn test_get_missing_key() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    let err = store.get(b"missing").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_put_rejects_empty_value() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    assert!(matches!(
        store.put(b"key", b""),
        Err(KvError::InvalidArgument(_))
    ));
}

#[test]
fn test_close_makes_writes_durable() {
    let temp_dir = TempDir::new().unwrap();

    let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
    put_keys(&store, 10);
    store.close().unwrap();

    let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
    assert_keys(&store, 10);
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_fifty_keys_with_tiny_threshold() {
    let (_temp, store) = setup_temp_store(50);

    put_keys(&store, 50);
    store.flush().unwrap();

    assert!(store.segment_count() >= 2);
    assert_keys(&store, 50);
}

#[test]
fn test_fifty_keys_with_default_threshold() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    put_keys(&store, 50);
    store.flush().unwrap();

    assert!(store.segment_count() >= 2);
    assert_keys(&store, 50);
}

#[test]
fn test_rotated_segments_do_not_grow() {
    let (_temp, store) = setup_temp_store(200);

    put_keys(&store, 20);
    store.flush().unwrap();
    let before = store.segment_sizes().unwrap();
    assert!(before.len() >= 2);

    for i in 20..60 {
        store
            .put(format!("key{}", i).as_bytes(), format!("value{}", i).as_bytes())
            .unwrap();
    }
    store.flush().unwrap();
    let after = store.segment_sizes().unwrap();

    // Every segment that was already rotated out keeps its size
    for (old, new) in before[..before.len() - 1].iter().zip(after.iter()) {
        assert_eq!(old, new);
    }
    assert_keys(&store, 60);
}

#[test]
fn test_rotation_overshoots_by_at_most_one_record() {
    let (_temp, store) = setup_temp_store(100);

    put_keys(&store, 40);
    store.flush().unwrap();

    let sizes = store.segment_sizes().unwrap();
    for (_, size) in &sizes[..sizes.len() - 1] {
        assert!(*size >= 100);
        assert!(*size < 100 + 64);
    }
}

#[test]
fn test_rotation_names_and_manifest_stay_in_step() {
    let (temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    store.rotate().unwrap();
    store.rotate().unwrap();

    let expected = vec![
        "segment-0.db".to_string(),
        "segment-1.db".to_string(),
        "segment-2.db".to_string(),
    ];
    assert_eq!(store.segment_names(), expected);
    assert_eq!(Manifest::load(temp.path()).unwrap().segments, expected);
    assert_eq!(Manifest::load(temp.path()).unwrap().active_index, 2);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_within_segment() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    store.put(b"key", b"value").unwrap();
    store.delete(b"key").unwrap();

    assert!(matches!(store.get(b"key"), Err(KvError::NotFound)));
}

#[test]
fn test_delete_nonexistent_key() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    store.delete(b"nonexistent").unwrap();
    assert!(matches!(store.get(b"nonexistent"), Err(KvError::NotFound)));
}

#[test]
fn test_delete_shadows_value_in_older_segment() {
    let (temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    store.put(b"key", b"value").unwrap();
    store.rotate().unwrap();
    store.delete(b"key").unwrap();

    assert!(matches!(store.get(b"key"), Err(KvError::NotFound)));

    store.close().unwrap();
    let store = SegmentedStore::open(temp.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
    assert!(matches!(store.get(b"key"), Err(KvError::NotFound)));
}

#[test]
fn test_put_after_delete() {
    let (_temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);

    store.put(b"key", b"old").unwrap();
    store.delete(b"key").unwrap();
    store.put(b"key", b"new").unwrap();
    store.flush().unwrap();

    assert_eq!(store.get(b"key").unwrap(), b"new".to_vec());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_restores_segment_order() {
    let temp_dir = TempDir::new().unwrap();

    let names = {
        let store = SegmentedStore::open(temp_dir.path(), 100).unwrap();
        put_keys(&store, 30);
        store.put(b"key0", b"latest").unwrap();
        let names = store.segment_names();
        store.close().unwrap();
        names
    };
    assert!(names.len() >= 2);

    let store = SegmentedStore::open(temp_dir.path(), 100).unwrap();
    assert_eq!(store.segment_names(), names);
    assert_eq!(store.get(b"key0").unwrap(), b"latest".to_vec());
    for i in 1..30 {
        assert_eq!(
            store.get(format!("key{}", i).as_bytes()).unwrap(),
            format!("value{}", i).into_bytes()
        );
    }
}

#[test]
fn test_writes_after_reopen_go_to_new_ids() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
        store.rotate().unwrap();
        store.close().unwrap();
    }

    let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
    store.rotate().unwrap();

    assert_eq!(
        store.segment_names(),
        vec!["segment-0.db", "segment-1.db", "segment-2.db"]
    );
}

#[test]
fn test_open_sweeps_unreferenced_files() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
        store.put(b"key", b"value").unwrap();
        store.close().unwrap();
    }

    fs::write(temp_dir.path().join("segment-99.db"), b"orphan").unwrap();
    fs::write(temp_dir.path().join("merge-7.tmp"), b"partial").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), b"keep me").unwrap();

    let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();

    assert!(!temp_dir.path().join("segment-99.db").exists());
    assert!(!temp_dir.path().join("merge-7.tmp").exists());
    assert!(temp_dir.path().join("notes.txt").exists());
    assert_eq!(segment_files(temp_dir.path()), vec!["segment-0.db"]);
    assert_eq!(store.get(b"key").unwrap(), b"value".to_vec());
}

#[test]
fn test_open_refuses_segments_without_manifest() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = SegmentedStore::open(temp_dir.path(), 50).unwrap();
        put_keys(&store, 20);
        store.close().unwrap();
    }
    let before = segment_files(temp_dir.path());
    assert!(before.len() >= 2);

    fs::remove_file(temp_dir.path().join("manifest.json")).unwrap();

    let result = SegmentedStore::open(temp_dir.path(), 50);
    assert!(matches!(result, Err(KvError::Manifest(_))));

    // Nothing was swept or recreated
    assert_eq!(segment_files(temp_dir.path()), before);
    assert!(!temp_dir.path().join("manifest.json").exists());
}

#[test]
fn test_open_without_manifest_still_clears_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("merge-3.tmp"), b"partial").unwrap();

    let store = SegmentedStore::open(temp_dir.path(), TEST_MAX_SEGMENT_SIZE).unwrap();

    assert!(!temp_dir.path().join("merge-3.tmp").exists());
    assert_eq!(store.segment_names(), vec!["segment-0.db"]);
}

// =============================================================================
// Rotation Failure Tests
// =============================================================================

#[test]
fn test_failed_rotation_keeps_active_segment_writable() {
    let (temp, store) = setup_temp_store(TEST_MAX_SEGMENT_SIZE);
    store.put(b"a", b"1").unwrap();

    // A directory squatting on the next segment name makes the open fail
    let blocker = temp.path().join("segment-1.db");
    fs::create_dir(&blocker).unwrap();

    assert!(store.rotate().is_err());
    assert_eq!(store.segment_names(), vec!["segment-0.db"]);

    store.put(b"b", b"2").unwrap();
    store.delete(b"a").unwrap();
    assert_eq!(store.get(b"b").unwrap(), b"2".to_vec());
    assert!(store.get(b"a").unwrap_err().is_not_found());

    fs::remove_dir(&blocker).unwrap();
    store.rotate().unwrap();
    store.put(b"c", b"3").unwrap();

    assert_eq!(store.segment_names(), vec!["segment-0.db", "segment-1.db"]);
    assert_eq!(store.get(b"b").unwrap(), b"2".to_vec());
    assert_eq!(store.get(b"c").unwrap(), b"3".to_vec());
    store.close().unwrap();

    let store = SegmentedStore::open(temp.path(), TEST_MAX_SEGMENT_SIZE).unwrap();
    assert_eq!(store.get(b"b").unwrap(), b"2".to_vec());
    assert_eq!(store.get(b"c").unwrap(), b"3".to_vec());
    assert!(store.get(b"a").unwrap_err().is_not_found());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_rotate_consistently() {
    let (temp, store) = setup_temp_store(256);
    let store = Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}-key{}", t, i);
                    let value = format!("t{}-value{}", t, i);
                    store.put(key.as_bytes(), value.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    store.flush().unwrap();

    let names = store.segment_names();
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names.len(), store.segment_count());
    assert_eq!(Manifest::load(temp.path()).unwrap().segments, names);

    for t in 0..4 {
        for i in 0..100 {
            let key = format!("t{}-key{}", t, i);
            assert_eq!(
                store.get(key.as_bytes()).unwrap(),
                format!("t{}-value{}", t, i).into_bytes()
            );
        }
    }
}
