//! Secondary index
//!
//! A derived multi-valued mapping (key → set of values) built on the ordered
//! store: each association is one physical record whose key is a
//! length-prefixed (key, value) pair, ordered by the pair-aware comparator.
//! Adding the same pair twice lands on the same physical record, which is
//! what makes `add` idempotent.

use crate::config::OpenOptions;
use crate::error::{HelixError, Result};
use crate::store::{Cursor, Store};

/// Encode an association as a single physical key
///
/// Layout: BE u32 length of `key`, then `key`, then `value`.
pub fn encode_pair(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(4 + key.len() + value.len());
    encoded.extend_from_slice(&(key.len() as u32).to_be_bytes());
    encoded.extend_from_slice(key);
    encoded.extend_from_slice(value);
    encoded
}

/// Split a physical key back into its (key, value) association
pub fn decode_pair(encoded: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    if encoded.len() < 4 {
        return Err(HelixError::BrokenData(
            "pair key shorter than its length prefix".to_string(),
        ));
    }
    let len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
    if encoded.len() - 4 < len {
        return Err(HelixError::BrokenData(
            "pair key length prefix out of range".to_string(),
        ));
    }
    Ok((encoded[4..4 + len].to_vec(), encoded[4 + len..].to_vec()))
}

/// Secondary index over (key, value) associations
pub struct Index {
    store: Store,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    /// Create an index in the closed state
    pub fn new() -> Self {
        Self { store: Store::new() }
    }

    /// Open the index
    ///
    /// The underlying store is pinned to the ordered tree backend with the
    /// pair comparator; other options pass through unchanged.
    pub fn open(&self, path: &str, writable: bool, options: &OpenOptions) -> Result<()> {
        let mut options = options.clone();
        options
            .params
            .insert("backend".to_string(), "tree".to_string());
        options
            .params
            .insert("comparator".to_string(), "pair".to_string());
        self.store.open(path, writable, &options)
    }

    /// Close the index
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    // =========================================================================
    // Associations
    // =========================================================================

    /// Check whether an exact (key, value) association exists
    pub fn contains(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        self.store.contains(&encode_pair(key, value))
    }

    /// Add an association; re-adding an existing pair is a no-op success
    pub fn add(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.set(&encode_pair(key, value), b"", true)
    }

    /// Remove an exact association; NotFound when the pair is absent
    pub fn remove(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.remove(&encode_pair(key, value))
    }

    /// All values associated with a key, in ascending value order
    ///
    /// `max` bounds the result; 0 means unlimited.
    pub fn get_values(&self, key: &[u8], max: usize) -> Result<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        let mut cursor = self.store.make_cursor();
        // The empty value is the least pair for this key
        cursor.jump(&encode_pair(key, b""))?;
        while let Ok((encoded, _)) = cursor.get() {
            let (found_key, value) = decode_pair(&encoded)?;
            if found_key != key {
                break;
            }
            values.push(value);
            if max != 0 && values.len() >= max {
                break;
            }
            cursor.next()?;
        }
        Ok(values)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Number of associations
    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    /// Remove all associations
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    /// Rebuild the underlying store
    pub fn rebuild(&self) -> Result<()> {
        self.store.rebuild()
    }

    /// Persist the underlying store
    pub fn synchronize(&self, hard: bool) -> Result<()> {
        self.store.synchronize(hard)
    }

    /// True while the index is open
    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// True while the index accepts mutations
    pub fn is_writable(&self) -> bool {
        self.store.is_writable()
    }

    /// Create a cursor over the associations
    pub fn make_cursor(&self) -> IndexCursor<'_> {
        IndexCursor {
            cursor: self.store.make_cursor(),
        }
    }
}

/// A cursor over an index's associations, yielding decoded (key, value) pairs
pub struct IndexCursor<'a> {
    cursor: Cursor<'a>,
}

impl IndexCursor<'_> {
    /// Move to the first association
    pub fn first(&mut self) -> Result<()> {
        self.cursor.first()
    }

    /// Move to the last association
    pub fn last(&mut self) -> Result<()> {
        self.cursor.last()
    }

    /// Move to the association at or after (key, value)
    pub fn jump(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.cursor.jump(&encode_pair(key, value))
    }

    /// Move one association forward
    pub fn next(&mut self) -> Result<()> {
        self.cursor.next()
    }

    /// Move one association backward
    pub fn previous(&mut self) -> Result<()> {
        self.cursor.previous()
    }

    /// Read the current association without moving
    pub fn get(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let (encoded, _) = self.cursor.get()?;
        decode_pair(&encoded)
    }
}
