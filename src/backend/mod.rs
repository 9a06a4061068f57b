//! Storage backends
//!
//! The store core is backend-agnostic: everything about how records are
//! physically kept lives behind the [`Backend`] trait. Two engines are
//! bundled:
//! - [`TreeBackend`]: ordered, comparator-aware (range and boundary cursor
//!   operations available)
//! - [`HashBackend`]: unordered, with a deterministic hash-order traversal
//!
//! ## Responsibilities
//! - Point operations (get/set/remove/clear)
//! - Boundary navigation for cursors
//! - Snapshot persistence and diagnostics

mod hash;
mod snapshot;
mod tree;

pub use hash::HashBackend;
pub use snapshot::{read_snapshot_file, scan_snapshot_file, SnapshotHeader};
pub use tree::TreeBackend;

use std::cmp::Ordering;
use std::path::Path;

use crate::error::{HelixError, Result};

// =============================================================================
// Key Comparators
// =============================================================================

/// Pluggable total order over keys for ordered backends
///
/// The comparator defines both ordering and key identity: two keys that
/// compare equal occupy the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyComparator {
    /// Plain byte-wise lexical order
    #[default]
    Lexical,

    /// Order by the decimal integer expression at the head of the key
    Decimal,

    /// Order by (first, second) of a length-prefixed pair encoding,
    /// comparing each part lexically
    PairLexical,
}

impl KeyComparator {
    /// Resolve a comparator from an open parameter value
    pub fn from_param(name: &str) -> Result<Self> {
        match name {
            "lexical" => Ok(KeyComparator::Lexical),
            "decimal" => Ok(KeyComparator::Decimal),
            "pair" => Ok(KeyComparator::PairLexical),
            other => Err(HelixError::InvalidArgument(format!(
                "unknown comparator: {}",
                other
            ))),
        }
    }

    /// Identifier persisted in snapshot headers
    pub fn id(self) -> u8 {
        match self {
            KeyComparator::Lexical => 0,
            KeyComparator::Decimal => 1,
            KeyComparator::PairLexical => 2,
        }
    }

    /// Inverse of [`KeyComparator::id`]
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(KeyComparator::Lexical),
            1 => Ok(KeyComparator::Decimal),
            2 => Ok(KeyComparator::PairLexical),
            other => Err(HelixError::BrokenData(format!(
                "unknown comparator id: {}",
                other
            ))),
        }
    }

    /// Human-readable name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            KeyComparator::Lexical => "lexical",
            KeyComparator::Decimal => "decimal",
            KeyComparator::PairLexical => "pair",
        }
    }

    /// Compare two keys under this order
    pub fn compare(self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            KeyComparator::Lexical => a.cmp(b),
            KeyComparator::Decimal => decimal_head(a)
                .cmp(&decimal_head(b))
                .then_with(|| strip_decimal_head(a).cmp(strip_decimal_head(b))),
            KeyComparator::PairLexical => {
                let (ak, av) = split_pair(a);
                let (bk, bv) = split_pair(b);
                ak.cmp(bk).then_with(|| av.cmp(bv))
            }
        }
    }
}

/// Parse the optionally signed decimal integer at the head of a key
fn decimal_head(key: &[u8]) -> i128 {
    let mut value: i128 = 0;
    let mut negative = false;
    let mut digits = key;
    if let Some((&b'-', rest)) = key.split_first() {
        negative = true;
        digits = rest;
    }
    for &b in digits {
        if !b.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i128);
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Bytes after the decimal head, used as a tiebreaker for distinct spellings
fn strip_decimal_head(key: &[u8]) -> &[u8] {
    let mut idx = 0;
    if key.first() == Some(&b'-') {
        idx = 1;
    }
    while idx < key.len() && key[idx].is_ascii_digit() {
        idx += 1;
    }
    &key[idx..]
}

/// Split a length-prefixed pair key into (first, second)
///
/// A key too short to carry its prefix degrades to (whole key, empty), which
/// keeps the order total for foreign data.
fn split_pair(key: &[u8]) -> (&[u8], &[u8]) {
    if key.len() < 4 {
        return (key, &[]);
    }
    let len = u32::from_be_bytes([key[0], key[1], key[2], key[3]]) as usize;
    if key.len() - 4 < len {
        return (key, &[]);
    }
    (&key[4..4 + len], &key[4 + len..])
}

// =============================================================================
// Backend Classes
// =============================================================================

/// The bundled backend engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendClass {
    Tree,
    Hash,
}

impl BackendClass {
    /// Class name, as accepted by the `backend=` open parameter
    pub fn name(self) -> &'static str {
        match self {
            BackendClass::Tree => "tree",
            BackendClass::Hash => "hash",
        }
    }

    /// Identifier persisted in snapshot headers
    pub fn id(self) -> u8 {
        match self {
            BackendClass::Tree => 1,
            BackendClass::Hash => 2,
        }
    }

    /// Inverse of [`BackendClass::id`]
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(BackendClass::Tree),
            2 => Ok(BackendClass::Hash),
            other => Err(HelixError::BrokenData(format!(
                "unknown backend class id: {}",
                other
            ))),
        }
    }

    /// Parse an explicit class selector
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "tree" => Ok(BackendClass::Tree),
            "hash" => Ok(BackendClass::Hash),
            other => Err(HelixError::InvalidArgument(format!(
                "unknown backend class: {}",
                other
            ))),
        }
    }

    /// Infer the class from the file naming convention
    /// `store.hxt` → Tree, `store.hxh` → Hash
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "hxt" => Some(BackendClass::Tree),
            "hxh" => Some(BackendClass::Hash),
            _ => None,
        }
    }
}

/// Resolve the backend class for an open call
///
/// An explicit `backend=` parameter wins; otherwise the path extension
/// decides; an in-memory store (no path) defaults to the ordered tree.
pub fn resolve_class(path: Option<&Path>, explicit: Option<&str>) -> Result<BackendClass> {
    if let Some(name) = explicit {
        return BackendClass::from_name(name);
    }
    match path {
        Some(p) => BackendClass::from_path(p).ok_or_else(|| {
            HelixError::InvalidArgument(format!(
                "cannot infer backend class from path: {}",
                p.display()
            ))
        }),
        None => Ok(BackendClass::Tree),
    }
}

/// Construct an empty backend of the given class
pub fn create_backend(class: BackendClass, comparator: KeyComparator) -> Box<dyn Backend> {
    match class {
        BackendClass::Tree => Box::new(TreeBackend::new(comparator)),
        BackendClass::Hash => Box::new(HashBackend::new()),
    }
}

// =============================================================================
// Backend Contract
// =============================================================================

/// The physical storage engine behind a store
///
/// Implementations are plain data structures: the store core provides all
/// locking, so mutators take `&mut self` and the trait stays object-safe.
pub trait Backend: Send + Sync {
    /// Engine class of this backend
    fn class(&self) -> BackendClass;

    /// True if keys have a total order usable for range operations
    fn is_ordered(&self) -> bool;

    /// The comparator in effect (ordered backends only; hash backends
    /// report the default)
    fn comparator(&self) -> KeyComparator;

    /// Number of records
    fn count(&self) -> usize;

    /// Read a record value
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Insert or replace a record
    fn set(&mut self, key: &[u8], value: Vec<u8>);

    /// Delete a record, returning the removed value
    fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>>;

    /// Delete all records
    fn clear(&mut self);

    // -------------------------------------------------------------------------
    // Navigation (backend-defined order for unordered engines)
    // -------------------------------------------------------------------------

    /// Least key in traversal order
    fn first_key(&self) -> Option<Vec<u8>>;

    /// Greatest key in traversal order
    fn last_key(&self) -> Option<Vec<u8>>;

    /// Least key strictly above (or at, if inclusive) the pivot
    fn seek_upper(&self, key: &[u8], inclusive: bool) -> Option<Vec<u8>>;

    /// Greatest key strictly below (or at, if inclusive) the pivot
    fn seek_lower(&self, key: &[u8], inclusive: bool) -> Option<Vec<u8>>;

    /// Visit every record in traversal order; return false from the callback
    /// to stop early
    fn each(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool);

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Rebuild internal structures in place
    fn rebuild(&mut self);

    /// True if a rebuild would improve the layout
    fn should_be_rebuilt(&self) -> bool;

    /// Persist a snapshot of all records to the given file; with `sync_hard`
    /// the data is fsynced before the snapshot is swapped into place
    fn save(&self, path: &Path, sync_hard: bool) -> Result<()>;

    /// Diagnostic properties as (name, value) pairs
    fn inspect(&self) -> Vec<(String, String)>;
}
