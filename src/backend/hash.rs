//! Unordered hash backend
//!
//! HashMap-based engine. Cursor traversal still needs a stable,
//! backend-defined order, so navigation works over `(hash(key), key)` pairs
//! computed with a fixed-key hasher; the order is deterministic but
//! meaningless, which is exactly what an unordered engine promises.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::error::Result;

use super::snapshot::write_snapshot_file;
use super::{Backend, BackendClass, KeyComparator};

/// Unordered in-memory backend
pub struct HashBackend {
    records: HashMap<Vec<u8>, Vec<u8>>,
}

/// Traversal rank of a key: hash first, key bytes as tiebreaker
fn rank(key: &[u8]) -> (u64, &[u8]) {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish(), key)
}

impl HashBackend {
    /// Create an empty hash backend
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Create a hash backend preloaded with records
    pub fn with_records(records: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Keys sorted into traversal order
    fn ordered_keys(&self) -> Vec<&Vec<u8>> {
        let mut keys: Vec<&Vec<u8>> = self.records.keys().collect();
        keys.sort_by(|a, b| rank(a).cmp(&rank(b)));
        keys
    }
}

impl Default for HashBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HashBackend {
    fn class(&self) -> BackendClass {
        BackendClass::Hash
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn comparator(&self) -> KeyComparator {
        KeyComparator::Lexical
    }

    fn count(&self) -> usize {
        self.records.len()
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.records.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.records.insert(key.to_vec(), value);
    }

    fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.records.remove(key)
    }

    fn clear(&mut self) {
        self.records.clear();
    }

    fn first_key(&self) -> Option<Vec<u8>> {
        self.records
            .keys()
            .min_by(|a, b| rank(a).cmp(&rank(b)))
            .cloned()
    }

    fn last_key(&self) -> Option<Vec<u8>> {
        self.records
            .keys()
            .max_by(|a, b| rank(a).cmp(&rank(b)))
            .cloned()
    }

    fn seek_upper(&self, key: &[u8], inclusive: bool) -> Option<Vec<u8>> {
        let pivot = rank(key);
        self.records
            .keys()
            .filter(|k| {
                let r = rank(k);
                if inclusive {
                    r >= pivot
                } else {
                    r > pivot
                }
            })
            .min_by(|a, b| rank(a).cmp(&rank(b)))
            .cloned()
    }

    fn seek_lower(&self, key: &[u8], inclusive: bool) -> Option<Vec<u8>> {
        let pivot = rank(key);
        self.records
            .keys()
            .filter(|k| {
                let r = rank(k);
                if inclusive {
                    r <= pivot
                } else {
                    r < pivot
                }
            })
            .max_by(|a, b| rank(a).cmp(&rank(b)))
            .cloned()
    }

    fn each(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool) {
        for key in self.ordered_keys() {
            let value = &self.records[key];
            if !f(key, value) {
                break;
            }
        }
    }

    fn rebuild(&mut self) {
        // Re-bucket into a fresh table sized to the live record count
        let records = std::mem::take(&mut self.records);
        self.records = records.into_iter().collect();
    }

    fn should_be_rebuilt(&self) -> bool {
        // A table with far more capacity than records wants re-bucketing
        self.records.capacity() > 64 && self.records.capacity() > self.records.len() * 4
    }

    fn save(&self, path: &Path, sync_hard: bool) -> Result<()> {
        // Snapshot records in traversal order so saves are byte-stable
        let keys = self.ordered_keys();
        write_snapshot_file(
            path,
            self.class().id(),
            self.comparator().id(),
            keys.iter()
                .map(|k| (k.as_slice(), self.records[k.as_slice()].as_slice())),
            sync_hard,
        )
    }

    fn inspect(&self) -> Vec<(String, String)> {
        vec![
            ("class".to_string(), self.class().name().to_string()),
            ("count".to_string(), self.records.len().to_string()),
            ("ordered".to_string(), "false".to_string()),
            ("capacity".to_string(), self.records.capacity().to_string()),
        ]
    }
}
