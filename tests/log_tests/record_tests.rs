//! Tests for log records and the record log
//!
//! These tests verify:
//! - Frame serialization for value records and tombstones
//! - CRC32 corruption detection and malformed bodies
//! - Append / positioned read / replay on a real file
//! - File header creation and validation

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use stashkv::log::{Record, RecordLog, FILE_HEADER_SIZE, FRAME_HEADER_SIZE, MAGIC};
use stashkv::StashError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    (temp_dir, path)
}

fn value_record(key: &str, value: &str) -> Record {
    Record::put(
        key.as_bytes().to_vec(),
        0x04,
        value.as_bytes().to_vec(),
        1_700_000_000_000,
        None,
    )
}

// =============================================================================
// Frame Tests
// =============================================================================

#[test]
fn test_frame_value_record() {
    let record = Record::put(b"hello".to_vec(), 0x04, b"world".to_vec(), 1_000, Some(5_000));

    let frame = record.serialize().unwrap();
    assert_eq!(frame.len(), record.frame_len());

    let recovered = Record::deserialize(&frame).unwrap();
    assert_eq!(recovered, record);
    assert_eq!(recovered.expires_at(), Some(6_000));
}

#[test]
fn test_frame_tombstone() {
    let record = Record::tombstone(b"gone".to_vec(), 42);

    let recovered = Record::deserialize(&record.serialize().unwrap()).unwrap();
    assert!(recovered.tombstone);
    assert!(recovered.value.is_empty());
    assert_eq!(recovered.ttl_ms, None);
}

#[test]
fn test_frame_empty_key_and_value() {
    let record = Record::put(vec![], 0x00, vec![], 0, None);
    assert_eq!(Record::deserialize(&record.serialize().unwrap()).unwrap(), record);
}

#[test]
fn test_crc_corruption_detected() {
    let mut frame = value_record("key", "value").serialize().unwrap();
    let last = frame.len() - 10;
    frame[last] ^= 0xff;

    assert!(matches!(
        Record::deserialize(&frame),
        Err(StashError::CorruptRecord(_))
    ));
}

#[test]
fn test_truncated_frame_detected() {
    let frame = value_record("key", "value").serialize().unwrap();

    assert!(Record::deserialize(&frame[..FRAME_HEADER_SIZE - 1]).is_err());
    assert!(Record::deserialize(&frame[..frame.len() - 1]).is_err());
}

#[test]
fn test_invalid_tombstone_flag_detected() {
    let frame = value_record("key", "value").serialize().unwrap();

    // Rewrite the flag byte and fix the CRC so only the body check can fail
    let mut body = frame[FRAME_HEADER_SIZE..].to_vec();
    let flag = body.len() - 1;
    body[flag] = 7;

    let mut forged = Vec::new();
    forged.extend_from_slice(&(body.len() as u32).to_le_bytes());
    forged.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    forged.extend_from_slice(&body);

    assert!(matches!(
        Record::deserialize(&forged),
        Err(StashError::CorruptRecord(_))
    ));
}

// =============================================================================
// Record Log Tests
// =============================================================================

#[test]
fn test_open_creates_file_with_header() {
    let (_temp, path) = setup_temp_log();

    let log = RecordLog::open(&path).unwrap();
    assert!(log.is_empty());
    assert_eq!(log.len(), FILE_HEADER_SIZE);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], MAGIC);
}

#[test]
fn test_append_and_read_at() {
    let (_temp, path) = setup_temp_log();
    let mut log = RecordLog::open(&path).unwrap();

    let first = value_record("a", "1");
    let second = value_record("b", "2");

    let off1 = log.append(&first).unwrap();
    let off2 = log.append(&second).unwrap();

    assert_eq!(off1, FILE_HEADER_SIZE);
    assert_eq!(off2, off1 + first.frame_len() as u64);
    assert_eq!(log.read_at(off2).unwrap(), second);
    assert_eq!(log.read_at(off1).unwrap(), first);
}

#[test]
fn test_replay_in_log_order() {
    let (_temp, path) = setup_temp_log();
    let mut log = RecordLog::open(&path).unwrap();

    for i in 0..5 {
        log.append(&value_record(&format!("key{}", i), "v")).unwrap();
    }

    let keys: Vec<Vec<u8>> = log
        .replay()
        .unwrap()
        .map(|item| item.unwrap().1.key)
        .collect();
    assert_eq!(keys.len(), 5);
    assert_eq!(keys[0], b"key0".to_vec());
    assert_eq!(keys[4], b"key4".to_vec());
}

#[test]
fn test_reopen_appends_after_existing_records() {
    let (_temp, path) = setup_temp_log();

    let end = {
        let mut log = RecordLog::open(&path).unwrap();
        log.append(&value_record("a", "1")).unwrap();
        log.len()
    };

    let mut log = RecordLog::open(&path).unwrap();
    assert_eq!(log.len(), end);
    assert_eq!(log.append(&value_record("b", "2")).unwrap(), end);
    assert_eq!(log.replay().unwrap().count(), 2);
}

#[test]
fn test_create_replaces_existing_file() {
    let (_temp, path) = setup_temp_log();

    {
        let mut log = RecordLog::open(&path).unwrap();
        log.append(&value_record("a", "1")).unwrap();
    }

    let log = RecordLog::create(&path).unwrap();
    assert!(log.is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), FILE_HEADER_SIZE);
}

#[test]
fn test_read_past_end_is_corrupt_record() {
    let (_temp, path) = setup_temp_log();
    let mut log = RecordLog::open(&path).unwrap();
    log.append(&value_record("a", "1")).unwrap();

    assert!(matches!(
        log.read_at(log.len()),
        Err(StashError::CorruptRecord(_))
    ));
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_bad_magic_is_corrupt_log() {
    let (_temp, path) = setup_temp_log();
    fs::write(&path, b"NOPE\x01\x00").unwrap();

    assert!(matches!(
        RecordLog::open(&path),
        Err(StashError::CorruptLog(_))
    ));
}

#[test]
fn test_unknown_version_is_corrupt_log() {
    let (_temp, path) = setup_temp_log();
    let mut header = MAGIC.to_vec();
    header.extend_from_slice(&99u16.to_le_bytes());
    fs::write(&path, header).unwrap();

    assert!(matches!(
        RecordLog::open(&path),
        Err(StashError::CorruptLog(_))
    ));
}

#[test]
fn test_torn_header_is_reinitialised() {
    let (_temp, path) = setup_temp_log();
    {
        let mut file = OpenOptions::new().create(true).write(true).open(&path).unwrap();
        file.write_all(&MAGIC[..3]).unwrap();
    }

    let log = RecordLog::open(&path).unwrap();
    assert!(log.is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), FILE_HEADER_SIZE);
}
