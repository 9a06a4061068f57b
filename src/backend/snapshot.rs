//! Snapshot persistence
//!
//! The on-disk form of a backend: a small header followed by one framed,
//! CRC-guarded record per key. Loading is strict (any damage is BrokenData);
//! restoration re-scans the same file leniently, resynchronizing on the
//! record magic and keeping whatever still verifies.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────┬───────────┬───────────────┬──────────────────────────┐
//! │ Magic (8)    │ Class (1) │ Comparator(1) │ Records ...              │
//! └──────────────┴───────────┴───────────────┴──────────────────────────┘
//!
//! Record: 0xA5 (1) + len (4, BE) + bincode(SnapshotRecord)
//! ```

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HelixError, Result};

/// File magic for snapshot files
const SNAPSHOT_MAGIC: &[u8; 8] = b"HLXSNAP1";

/// Marker byte preceding every record frame
const RECORD_MAGIC: u8 = 0xA5;

/// Header size: magic + class id + comparator id
const HEADER_SIZE: usize = 10;

/// Frame prefix size: magic byte + 4-byte length
const FRAME_PREFIX: usize = 5;

/// Maximum serialized record size (16 MB), guards the lenient scanner
/// against garbage lengths
const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// One persisted record
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    /// CRC32 over key then value
    crc: u32,

    /// Record key
    key: Vec<u8>,

    /// Record value
    value: Vec<u8>,
}

impl SnapshotRecord {
    fn new(key: &[u8], value: &[u8]) -> Self {
        Self {
            crc: record_crc(key, value),
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    fn verify(&self) -> bool {
        self.crc == record_crc(&self.key, &self.value)
    }
}

/// Compute the CRC32 of a record's key and value
fn record_crc(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Decoded snapshot header
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    /// Backend class identifier
    pub class_id: u8,

    /// Key comparator identifier
    pub comparator_id: u8,
}

// =============================================================================
// Writing
// =============================================================================

/// Write a snapshot of records to `path`
///
/// The snapshot is written to a sibling temp file and renamed into place so
/// an interrupted save never clobbers the previous snapshot. With
/// `sync_hard` the file is fsynced before the rename.
pub fn write_snapshot_file<'a>(
    path: &Path,
    class_id: u8,
    comparator_id: u8,
    records: impl Iterator<Item = (&'a [u8], &'a [u8])>,
    sync_hard: bool,
) -> Result<()> {
    let tmp_path = path.with_extension("tmp");

    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        // Header
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&[class_id, comparator_id])?;

        // Records
        for (key, value) in records {
            let record = SnapshotRecord::new(key, value);
            let body = bincode::serialize(&record)
                .map_err(|e| HelixError::System(format!("snapshot encode failed: {}", e)))?;
            writer.write_all(&[RECORD_MAGIC])?;
            writer.write_all(&(body.len() as u32).to_be_bytes())?;
            writer.write_all(&body)?;
        }

        writer.flush()?;
        if sync_hard {
            writer.get_ref().sync_all()?;
        }
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

// =============================================================================
// Reading
// =============================================================================

/// Load a snapshot strictly
///
/// Any framing damage, CRC mismatch or trailing garbage is BrokenData.
pub fn read_snapshot_file(path: &Path) -> Result<(SnapshotHeader, Vec<(Vec<u8>, Vec<u8>)>)> {
    let data = fs::read(path)?;
    let header = parse_header(&data)?;

    let mut records = Vec::new();
    let mut pos = HEADER_SIZE;
    while pos < data.len() {
        let (record, next) = parse_record(&data, pos)
            .ok_or_else(|| HelixError::BrokenData(format!("damaged record at offset {}", pos)))?;
        records.push((record.key, record.value));
        pos = next;
    }
    Ok((header, records))
}

/// Scan a possibly-broken snapshot leniently
///
/// Skips forward to the next record magic after any damage and keeps every
/// record that still verifies, up to `end_offset` bytes (`<= 0` reads the
/// whole file).
pub fn scan_snapshot_file(
    path: &Path,
    end_offset: i64,
) -> Result<(SnapshotHeader, Vec<(Vec<u8>, Vec<u8>)>)> {
    let data = fs::read(path)?;
    let header = parse_header(&data)?;

    let limit = if end_offset <= 0 {
        data.len()
    } else {
        data.len().min(end_offset as usize)
    };

    let mut records = Vec::new();
    let mut pos = HEADER_SIZE;
    let mut skipped = 0usize;
    while pos < limit {
        match parse_record(&data[..limit], pos) {
            Some((record, next)) => {
                records.push((record.key, record.value));
                pos = next;
            }
            None => {
                skipped += 1;
                pos += 1;
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(
            "snapshot scan of {} skipped {} damaged bytes, salvaged {} records",
            path.display(),
            skipped,
            records.len()
        );
    }
    Ok((header, records))
}

/// Validate the file magic and read the header
fn parse_header(data: &[u8]) -> Result<SnapshotHeader> {
    if data.len() < HEADER_SIZE || &data[..8] != SNAPSHOT_MAGIC {
        return Err(HelixError::BrokenData("not a snapshot file".to_string()));
    }
    Ok(SnapshotHeader {
        class_id: data[8],
        comparator_id: data[9],
    })
}

/// Try to parse one record frame at `pos`; None if the frame is damaged
fn parse_record(data: &[u8], pos: usize) -> Option<(SnapshotRecord, usize)> {
    if pos + FRAME_PREFIX > data.len() || data[pos] != RECORD_MAGIC {
        return None;
    }
    let len = u32::from_be_bytes([data[pos + 1], data[pos + 2], data[pos + 3], data[pos + 4]])
        as usize;
    if len > MAX_RECORD_SIZE {
        return None;
    }
    let start = pos + FRAME_PREFIX;
    let end = start.checked_add(len)?;
    if end > data.len() {
        return None;
    }
    let record: SnapshotRecord = bincode::deserialize(&data[start..end]).ok()?;
    if !record.verify() {
        return None;
    }
    Some((record, end))
}
