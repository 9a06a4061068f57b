//! Persistence and recovery tests
//!
//! Tests verify:
//! - Snapshot round trips through close/open for both backends
//! - Universal open flags (truncate, no_create)
//! - Corruption detection, health reporting and salvage
//! - Database restoration from damaged files
//! - Flat record export/import and file maintenance

use std::fs;
use std::path::Path;

use helixkv::{OpenOptions, Store, StatusCode};

fn open_at(path: &Path, writable: bool, params: &str) -> Store {
    let store = Store::new();
    store
        .open_with_params(path.to_str().unwrap(), writable, params)
        .unwrap();
    store
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_tree_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");

    let store = open_at(&path, true, "");
    for i in 0..100u32 {
        store
            .set(format!("key{:03}", i).as_bytes(), format!("value{}", i).as_bytes(), false)
            .unwrap();
    }
    store.close().unwrap();
    assert!(path.exists());

    let reopened = open_at(&path, false, "");
    assert_eq!(reopened.count().unwrap(), 100);
    assert_eq!(reopened.get(b"key042").unwrap(), b"value42");
    assert!(reopened.is_ordered());
    assert!(reopened.is_healthy());
    reopened.close().unwrap();
}

#[test]
fn test_hash_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxh");

    let store = open_at(&path, true, "");
    store.set(b"a", b"1", false).unwrap();
    store.set(b"b", b"2", false).unwrap();
    store.close().unwrap();

    let reopened = open_at(&path, false, "");
    assert_eq!(reopened.count().unwrap(), 2);
    assert!(!reopened.is_ordered());
    reopened.close().unwrap();
}

#[test]
fn test_decimal_comparator_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");

    let store = open_at(&path, true, "comparator=decimal");
    store.set(b"9", b"nine", false).unwrap();
    store.set(b"10", b"ten", false).unwrap();
    store.set(b"2", b"two", false).unwrap();

    // Numeric order, not lexical
    assert_eq!(store.pop_first().unwrap().0, b"2");
    assert_eq!(store.pop_first().unwrap().0, b"9");
    assert_eq!(store.pop_first().unwrap().0, b"10");
    store.close().unwrap();

    // The comparator is recorded in the snapshot header
    let reopened = open_at(&path, true, "");
    reopened.set(b"9", b"nine", false).unwrap();
    reopened.set(b"10", b"ten", false).unwrap();
    assert_eq!(reopened.pop_first().unwrap().0, b"9");
    reopened.close().unwrap();
}

// =============================================================================
// Open Flag Tests
// =============================================================================

#[test]
fn test_truncate_discards_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");

    let store = open_at(&path, true, "");
    store.set(b"key", b"value", false).unwrap();
    store.close().unwrap();

    let truncated = open_at(&path, true, "truncate=true");
    assert_eq!(truncated.count().unwrap(), 0);
    truncated.close().unwrap();
}

#[test]
fn test_no_create_refuses_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.hxt");

    let store = Store::new();
    let err = store
        .open_with_params(path.to_str().unwrap(), true, "no_create=true")
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::System);
    assert!(!store.is_open());
}

#[test]
fn test_read_only_open_of_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.hxt");

    let store = Store::new();
    let err = store
        .open(path.to_str().unwrap(), false, &OpenOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::System);
}

#[test]
fn test_backend_class_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");

    let store = open_at(&path, true, "");
    store.set(b"a", b"1", false).unwrap();
    store.close().unwrap();

    let wrong = Store::new();
    let err = wrong
        .open_with_params(path.to_str().unwrap(), true, "backend=hash")
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::InvalidArgument);
}

// =============================================================================
// Corruption Tests
// =============================================================================

/// Write a store with 50 records and chop off the file's tail
fn truncated_snapshot(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("data.hxt");
    let store = open_at(&path, true, "");
    for i in 0..50u32 {
        store
            .set(format!("key{:02}", i).as_bytes(), b"payload-payload", false)
            .unwrap();
    }
    store.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();
    path
}

#[test]
fn test_damaged_snapshot_fails_strict_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = truncated_snapshot(dir.path());

    let store = Store::new();
    let err = store
        .open(path.to_str().unwrap(), true, &OpenOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::BrokenData);
}

#[test]
fn test_damaged_snapshot_salvaged_with_restore_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = truncated_snapshot(dir.path());

    let store = Store::new();
    store
        .open_with_params(path.to_str().unwrap(), true, "restore=true")
        .unwrap();
    assert!(store.is_open());
    assert!(!store.is_healthy());

    // Only the tail record is lost
    let count = store.count().unwrap();
    assert_eq!(count, 49);
    assert_eq!(store.get(b"key00").unwrap(), b"payload-payload");
    store.close().unwrap();
}

#[test]
fn test_garbage_file_is_not_a_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.hxt");
    fs::write(&path, b"this is not a snapshot at all").unwrap();

    let store = Store::new();
    let err = store
        .open(path.to_str().unwrap(), true, &OpenOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::BrokenData);
}

// =============================================================================
// Restoration Tests
// =============================================================================

#[test]
fn test_restore_database_from_damaged_file() {
    let dir = tempfile::tempdir().unwrap();
    let old_path = truncated_snapshot(dir.path());
    let new_path = dir.path().join("restored.hxt");

    Store::restore_database(&old_path, &new_path, "", -1).unwrap();

    let restored = open_at(&new_path, false, "");
    assert_eq!(restored.count().unwrap(), 49);
    assert!(restored.is_healthy());
    restored.close().unwrap();
}

#[test]
fn test_restore_database_with_explicit_class_and_offset() {
    let dir = tempfile::tempdir().unwrap();
    let old_path = dir.path().join("data.hxt");
    let store = open_at(&old_path, true, "");
    store.set(b"a", b"1", false).unwrap();
    store.set(b"b", b"2", false).unwrap();
    store.close().unwrap();

    let new_path = dir.path().join("restored.hxt");
    // A tiny end offset stops the scan before any record
    Store::restore_database(&old_path, &new_path, "tree", 10).unwrap();
    let restored = open_at(&new_path, false, "");
    assert_eq!(restored.count().unwrap(), 0);
    restored.close().unwrap();
}

// =============================================================================
// Flat Record Tests
// =============================================================================

#[test]
fn test_flat_record_export_import_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let flat_path = dir.path().join("dump.flat");

    let source = Store::new();
    source.open("", true, &OpenOptions::default()).unwrap();
    source.set(b"a", b"1", false).unwrap();
    source.set(b"b", b"2", false).unwrap();
    source.set(&[0x00, 0xFF], &[0xAB], false).unwrap();
    source.export_to_flat_records(&flat_path).unwrap();

    let dest = Store::new();
    dest.open_with_params("", true, "backend=hash").unwrap();
    dest.import_from_flat_records(&flat_path).unwrap();
    assert_eq!(dest.count().unwrap(), 3);
    assert_eq!(dest.get(b"a").unwrap(), b"1");
    assert_eq!(dest.get(&[0x00, 0xFF]).unwrap(), [0xAB]);
}

#[test]
fn test_corrupt_flat_record_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let flat_path = dir.path().join("dump.flat");

    let source = Store::new();
    source.open("", true, &OpenOptions::default()).unwrap();
    source.set(b"key", b"value", false).unwrap();
    source.export_to_flat_records(&flat_path).unwrap();

    // Flip a payload byte: the checksum no longer matches
    let mut bytes = fs::read(&flat_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&flat_path, &bytes).unwrap();

    let dest = Store::new();
    dest.open("", true, &OpenOptions::default()).unwrap();
    let err = dest.import_from_flat_records(&flat_path).unwrap_err();
    assert_eq!(err.code(), StatusCode::BrokenData);
}

#[test]
fn test_export_keys_as_lines() {
    let dir = tempfile::tempdir().unwrap();
    let lines_path = dir.path().join("keys.txt");

    let store = Store::new();
    store.open("", true, &OpenOptions::default()).unwrap();
    store.set(b"alpha", b"1", false).unwrap();
    store.set(b"beta", b"2", false).unwrap();
    store.export_keys_as_lines(&lines_path).unwrap();

    let text = fs::read_to_string(&lines_path).unwrap();
    assert_eq!(text, "alpha\nbeta\n");
}

// =============================================================================
// File Maintenance Tests
// =============================================================================

#[test]
fn test_synchronize_persists_without_closing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");

    let store = open_at(&path, true, "");
    store.set(b"key", b"value", false).unwrap();
    store.synchronize(true).unwrap();

    // The snapshot on disk already carries the record
    let observer = open_at(&path, false, "");
    assert_eq!(observer.get(b"key").unwrap(), b"value");
    observer.close().unwrap();
    store.close().unwrap();
}

#[test]
fn test_copy_file_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");
    let copy_path = dir.path().join("copy.hxt");

    let store = open_at(&path, true, "");
    store.set(b"key", b"value", false).unwrap();
    store.copy_file_data(&copy_path, false).unwrap();
    store.close().unwrap();

    let copy = open_at(&copy_path, false, "");
    assert_eq!(copy.get(b"key").unwrap(), b"value");
    copy.close().unwrap();
}

#[test]
fn test_file_size_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.hxt");

    let store = open_at(&path, true, "");
    store.set(b"key", b"value", false).unwrap();
    store.synchronize(false).unwrap();

    assert!(store.file_size().unwrap() > 0);
    assert_eq!(store.file_path().unwrap(), path);
    store.close().unwrap();
}

#[test]
fn test_rebuild_keeps_records_and_cursors_degrade_gracefully() {
    let store = Store::new();
    store.open("", true, &OpenOptions::default()).unwrap();
    for i in 0..20u32 {
        store.set(format!("key{:02}", i).as_bytes(), b"x", false).unwrap();
    }

    let mut cursor = store.make_cursor();
    cursor.jump(b"key10").unwrap();

    assert!(!store.should_be_rebuilt().unwrap());
    store.rebuild().unwrap();
    assert_eq!(store.count().unwrap(), 20);

    // The cursor stays usable after a rebuild
    assert_eq!(cursor.get_key().unwrap(), b"key10");
    store.remove(b"key10").unwrap();
    cursor.next().unwrap();
    assert_eq!(cursor.get_key().unwrap(), b"key11");
}

// =============================================================================
// Parameter String Tests
// =============================================================================

#[test]
fn test_parameter_string_parsing() {
    let params = helixkv::config::parse_params("a=1,,b=2,novalue,b=3");
    assert_eq!(params.len(), 2);
    assert_eq!(params["a"], "1");
    // Last duplicate wins; empty and '='-less segments are ignored
    assert_eq!(params["b"], "3");
}

#[test]
fn test_options_builder() {
    let options = OpenOptions::builder()
        .truncate(true)
        .no_create(true)
        .param("backend", "tree")
        .build();
    assert!(options.truncate);
    assert!(options.no_create);
    assert_eq!(options.param("backend"), Some("tree"));
}

#[test]
fn test_universal_flags_lifted_from_params() {
    let options = OpenOptions::from_params("truncate=true,no_lock=1,backend=hash");
    assert!(options.truncate);
    assert!(options.no_lock);
    assert!(!options.no_wait);
    assert_eq!(options.param("backend"), Some("hash"));
    assert_eq!(options.param("truncate"), None);
}
