//! Tests for the manifest
//!
//! These tests verify:
//! - First-run load of a missing manifest
//! - Save/load persistence and overwrite
//! - Rejection of malformed or inconsistent files

use std::fs;

use segkv::manifest::{MANIFEST_FILENAME, MANIFEST_TMP_FILENAME};
use segkv::{KvError, Manifest};
use tempfile::TempDir;

#[test]
fn test_load_missing_manifest_is_empty() {
    let temp = TempDir::new().unwrap();

    let manifest = Manifest::load(temp.path()).unwrap();

    assert!(manifest.is_empty());
    assert_eq!(manifest.active_index, -1);
    assert_eq!(manifest.active_segment(), None);
}

#[test]
fn test_save_then_load() {
    let temp = TempDir::new().unwrap();
    let mut manifest = Manifest::default();
    manifest.push_segment("segment-0.db");
    manifest.push_segment("segment-1.db");

    manifest.save(temp.path()).unwrap();
    let loaded = Manifest::load(temp.path()).unwrap();

    assert_eq!(loaded, manifest);
    assert_eq!(loaded.active_index, 1);
    assert_eq!(loaded.active_segment(), Some("segment-1.db"));
}

#[test]
fn test_save_overwrites_and_leaves_no_tmp() {
    let temp = TempDir::new().unwrap();
    let mut manifest = Manifest::default();
    manifest.push_segment("segment-0.db");
    manifest.push_segment("segment-1.db");
    manifest.save(temp.path()).unwrap();

    manifest.replace_all("segment-2.db");
    manifest.save(temp.path()).unwrap();

    let loaded = Manifest::load(temp.path()).unwrap();
    assert_eq!(loaded.segments, vec!["segment-2.db".to_string()]);
    assert_eq!(loaded.active_index, 0);
    assert!(!temp.path().join(MANIFEST_TMP_FILENAME).exists());
}

#[test]
fn test_file_is_readable_json() {
    let temp = TempDir::new().unwrap();
    let mut manifest = Manifest::default();
    manifest.push_segment("segment-0.db");
    manifest.save(temp.path()).unwrap();

    let text = fs::read_to_string(temp.path().join(MANIFEST_FILENAME)).unwrap();

    assert!(text.contains("\"segments\""));
    assert!(text.contains("\"segment-0.db\""));
    assert!(text.contains("\"active_index\": 0"));
}

#[test]
fn test_load_invalid_json_fails() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(MANIFEST_FILENAME), b"{ not json").unwrap();

    assert!(matches!(Manifest::load(temp.path()), Err(KvError::Manifest(_))));
}

#[test]
fn test_load_inconsistent_active_index_fails() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(MANIFEST_FILENAME),
        br#"{"segments": ["segment-0.db", "segment-1.db"], "active_index": 0}"#,
    )
    .unwrap();

    assert!(matches!(Manifest::load(temp.path()), Err(KvError::Manifest(_))));
}
