//! Ordered tree backend
//!
//! BTreeMap-based engine with a pluggable key comparator. The comparator
//! defines both ordering and key identity: keys comparing equal occupy the
//! same slot.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

use crate::error::Result;

use super::snapshot::write_snapshot_file;
use super::{Backend, BackendClass, KeyComparator};

/// Map key carrying the comparator it is ordered by
///
/// All keys in one tree share the same comparator; storing it per key keeps
/// the `Ord` impl self-contained.
#[derive(Debug, Clone)]
struct CmpKey {
    bytes: Vec<u8>,
    cmp: KeyComparator,
}

impl CmpKey {
    fn new(bytes: &[u8], cmp: KeyComparator) -> Self {
        Self {
            bytes: bytes.to_vec(),
            cmp,
        }
    }
}

impl PartialEq for CmpKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp.compare(&self.bytes, &other.bytes) == Ordering::Equal
    }
}

impl Eq for CmpKey {}

impl PartialOrd for CmpKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CmpKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp.compare(&self.bytes, &other.bytes)
    }
}

/// Ordered in-memory backend
pub struct TreeBackend {
    /// Records in comparator order
    records: BTreeMap<CmpKey, Vec<u8>>,

    /// Order over keys
    comparator: KeyComparator,
}

impl TreeBackend {
    /// Create an empty tree
    pub fn new(comparator: KeyComparator) -> Self {
        Self {
            records: BTreeMap::new(),
            comparator,
        }
    }

    /// Create a tree preloaded with records
    pub fn with_records(
        comparator: KeyComparator,
        records: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    ) -> Self {
        let mut backend = Self::new(comparator);
        for (key, value) in records {
            backend.set(&key, value);
        }
        backend
    }

    fn key(&self, bytes: &[u8]) -> CmpKey {
        CmpKey::new(bytes, self.comparator)
    }
}

impl Backend for TreeBackend {
    fn class(&self) -> BackendClass {
        BackendClass::Tree
    }

    fn is_ordered(&self) -> bool {
        true
    }

    fn comparator(&self) -> KeyComparator {
        self.comparator
    }

    fn count(&self) -> usize {
        self.records.len()
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.records.get(&self.key(key)).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.records.insert(self.key(key), value);
    }

    fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.records.remove(&self.key(key))
    }

    fn clear(&mut self) {
        self.records.clear();
    }

    fn first_key(&self) -> Option<Vec<u8>> {
        self.records.keys().next().map(|k| k.bytes.clone())
    }

    fn last_key(&self) -> Option<Vec<u8>> {
        self.records.keys().next_back().map(|k| k.bytes.clone())
    }

    fn seek_upper(&self, key: &[u8], inclusive: bool) -> Option<Vec<u8>> {
        let pivot = self.key(key);
        let lower = if inclusive {
            Bound::Included(pivot)
        } else {
            Bound::Excluded(pivot)
        };
        self.records
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(k, _)| k.bytes.clone())
    }

    fn seek_lower(&self, key: &[u8], inclusive: bool) -> Option<Vec<u8>> {
        let pivot = self.key(key);
        let upper = if inclusive {
            Bound::Included(pivot)
        } else {
            Bound::Excluded(pivot)
        };
        self.records
            .range((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, _)| k.bytes.clone())
    }

    fn each(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool) {
        for (key, value) in &self.records {
            if !f(&key.bytes, value) {
                break;
            }
        }
    }

    fn rebuild(&mut self) {
        // BTreeMap keeps itself balanced; rebuilding re-packs the nodes
        let records = std::mem::take(&mut self.records);
        self.records = records.into_iter().collect();
    }

    fn should_be_rebuilt(&self) -> bool {
        false
    }

    fn save(&self, path: &Path, sync_hard: bool) -> Result<()> {
        write_snapshot_file(
            path,
            self.class().id(),
            self.comparator.id(),
            self.records
                .iter()
                .map(|(k, v)| (k.bytes.as_slice(), v.as_slice())),
            sync_hard,
        )
    }

    fn inspect(&self) -> Vec<(String, String)> {
        vec![
            ("class".to_string(), self.class().name().to_string()),
            ("count".to_string(), self.records.len().to_string()),
            ("ordered".to_string(), "true".to_string()),
            ("comparator".to_string(), self.comparator.name().to_string()),
        ]
    }
}
