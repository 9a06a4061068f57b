//! Flat record files
//!
//! A sequential container of binary records with no index, used as a
//! migration conduit between stores and foreign tools.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────┐
//! │Magic (1) │ Len (4)  │ CRC (4)  │         Data            │
//! └──────────┴──────────┴──────────┴─────────────────────────┘
//! ```
//!
//! Lengths and checksums are big-endian. A store exports each record as a
//! key frame followed by a value frame.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};

use crate::error::{HelixError, Result};

/// Marker byte opening every frame
const FRAME_MAGIC: u8 = 0xDD;

/// Frame header size: magic + length + checksum
const FRAME_HEADER: usize = 9;

/// Maximum frame payload size (16 MB)
const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Writer
// =============================================================================

/// Appends framed records to a flat file
pub struct FlatRecordWriter {
    writer: BufWriter<File>,
}

impl FlatRecordWriter {
    /// Create (truncate) a flat record file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one record
    pub fn write_record(&mut self, data: &[u8]) -> Result<()> {
        if data.len() as u64 > MAX_FRAME_SIZE as u64 {
            return Err(HelixError::InvalidArgument(format!(
                "record too large: {} bytes (max {})",
                data.len(),
                MAX_FRAME_SIZE
            )));
        }
        let mut frame = BytesMut::with_capacity(FRAME_HEADER + data.len());
        frame.put_u8(FRAME_MAGIC);
        frame.put_u32(data.len() as u32);
        frame.put_u32(crc32fast::hash(data));
        frame.put_slice(data);
        self.writer.write_all(&frame)?;
        Ok(())
    }

    /// Flush buffered frames and sync the file
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reads framed records back from a flat file
pub struct FlatRecordReader {
    reader: BufReader<File>,
}

impl FlatRecordReader {
    /// Open a flat record file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Read the next record; None at a clean end of file
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; FRAME_HEADER];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        if header[0] != FRAME_MAGIC {
            return Err(HelixError::BrokenData(
                "flat record frame magic mismatch".to_string(),
            ));
        }
        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let crc = u32::from_be_bytes([header[5], header[6], header[7], header[8]]);
        if len > MAX_FRAME_SIZE {
            return Err(HelixError::BrokenData(format!(
                "flat record length out of range: {}",
                len
            )));
        }

        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                HelixError::BrokenData("flat record truncated".to_string())
            } else {
                HelixError::from(e)
            }
        })?;

        if crc32fast::hash(&data) != crc {
            return Err(HelixError::BrokenData(
                "flat record checksum mismatch".to_string(),
            ));
        }
        Ok(Some(data))
    }

    /// Read the next key/value record pair; None at a clean end of file
    pub fn read_pair(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let key = match self.read_record()? {
            Some(key) => key,
            None => return Ok(None),
        };
        let value = self.read_record()?.ok_or_else(|| {
            HelixError::BrokenData("flat record file ends with a dangling key".to_string())
        })?;
        Ok(Some((key, value)))
    }
}
