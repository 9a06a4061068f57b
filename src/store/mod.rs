//! Record store
//!
//! The core keyed collection that coordinates a pluggable backend behind a
//! uniform, thread-safe operation surface.
//!
//! ## Responsibilities
//! - Lifecycle (closed → open → closed) with writable and health flags
//! - Point, batch and composite record operations
//! - Atomicity: every single-key mutation and the multi-key
//!   compare-and-exchange run as one indivisible step
//! - Snapshot persistence, export conduits, diagnostics, key search
//!
//! ## Concurrency Model: Shared Readers / Exclusive Mutators
//!
//! - **Reads** (get/contains/count/search/...): shared lock, fully parallel
//! - **Mutations** (set/remove/CAS/rekey/...): exclusive lock, serialized;
//!   holding the exclusive lock for the whole read-modify-write makes each
//!   mutator linearizable with respect to every other operation
//! - `open`/`close` swap the backend in and out under the exclusive lock

mod cursor;

pub use cursor::Cursor;

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::backend::{
    self, Backend, BackendClass, KeyComparator, SnapshotHeader,
};
use crate::config::OpenOptions;
use crate::error::{join_status, HelixError, Result};
use crate::flat::{FlatRecordReader, FlatRecordWriter};
use crate::search::{search_keys, SearchMode};

/// Sentinel increment delta that reads the counter without creating or
/// changing the record
pub const INCREMENT_NOOP: i64 = i64::MIN;

/// Operand of a compare-and-exchange call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasValue {
    /// As expectation: the record must not exist.
    /// As desire: remove the record.
    Absent,

    /// As expectation: any existing value matches (the record must exist).
    /// As desire: leave the record unchanged.
    Any,

    /// As expectation: the record must hold exactly these bytes.
    /// As desire: store these bytes.
    Value(Vec<u8>),
}

impl CasValue {
    /// Whether the current state of a record satisfies this expectation
    fn matches(&self, current: Option<&[u8]>) -> bool {
        match self {
            CasValue::Absent => current.is_none(),
            CasValue::Any => current.is_some(),
            CasValue::Value(v) => current == Some(v.as_slice()),
        }
    }
}

/// Outcome of processing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// Leave the record as it is
    Noop,

    /// Store a new value for the record
    Set(Vec<u8>),

    /// Delete the record
    Remove,
}

/// Mutable state behind the store's lock
struct Inner {
    /// Attached backend; None while closed
    backend: Option<Box<dyn Backend>>,

    /// Whether mutations are allowed
    writable: bool,

    /// False after any detected corruption
    healthy: bool,

    /// Backing snapshot file; None for in-memory stores
    path: Option<PathBuf>,
}

/// The record store
///
/// Constructed closed; all operations other than [`Store::open`] fail with a
/// precondition error until a backend is attached.
pub struct Store {
    inner: RwLock<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a store in the closed state
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                backend: None,
                writable: false,
                healthy: true,
                path: None,
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the store
    ///
    /// An empty `path` opens a purely in-memory store. Otherwise the backend
    /// class comes from the `backend=` parameter or the path extension
    /// (`.hxt` tree, `.hxh` hash), and an existing snapshot is loaded unless
    /// `truncate` is set. A damaged snapshot fails the open with BrokenData
    /// unless `restore=true` is passed, in which case the store opens with
    /// whatever records could be salvaged and reports unhealthy.
    pub fn open(&self, path: &str, writable: bool, options: &OpenOptions) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if inner.backend.is_some() {
            return Err(HelixError::Precondition("store is already open".to_string()));
        }

        let file_path = if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        };
        let class = backend::resolve_class(file_path.as_deref(), options.param("backend"))?;
        let comparator = match options.param("comparator") {
            Some(name) => Some(KeyComparator::from_param(name)?),
            None => None,
        };

        let mut healthy = true;
        let backend: Box<dyn Backend> = match &file_path {
            Some(p) if p.exists() && !options.truncate => {
                let (header, records, salvaged) =
                    load_snapshot(p, options.param("restore") == Some("true"))?;
                if salvaged {
                    healthy = false;
                }
                if BackendClass::from_id(header.class_id)? != class {
                    return Err(HelixError::InvalidArgument(format!(
                        "backend class mismatch for {}",
                        p.display()
                    )));
                }
                let comparator =
                    comparator.unwrap_or(KeyComparator::from_id(header.comparator_id)?);
                build_backend(class, comparator, records)
            }
            Some(p) => {
                if options.no_create || !writable {
                    return Err(HelixError::System(format!(
                        "database file does not exist: {}",
                        p.display()
                    )));
                }
                backend::create_backend(class, comparator.unwrap_or_default())
            }
            None => backend::create_backend(class, comparator.unwrap_or_default()),
        };

        tracing::debug!(
            "opened {} store ({}, writable={}, healthy={})",
            backend.class().name(),
            file_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "in-memory".to_string()),
            writable,
            healthy
        );

        inner.backend = Some(backend);
        inner.writable = writable;
        inner.healthy = healthy;
        inner.path = file_path;
        Ok(())
    }

    /// Open with a parameter string, `"key1=value1,key2=value2"`
    pub fn open_with_params(&self, path: &str, writable: bool, params: &str) -> Result<()> {
        self.open(path, writable, &OpenOptions::from_params(params))
    }

    /// Close the store
    ///
    /// A writable, file-backed store persists its snapshot first. Closing a
    /// closed store is a precondition error.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = match inner.backend.take() {
            Some(b) => b,
            None => {
                return Err(HelixError::Precondition("store is not open".to_string()));
            }
        };
        if inner.writable {
            if let Some(path) = &inner.path {
                backend.save(path, false)?;
            }
        }
        tracing::debug!("closed store");
        inner.writable = false;
        inner.healthy = true;
        inner.path = None;
        Ok(())
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Check whether a record exists
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        Ok(backend.get(key).is_some())
    }

    /// Get the value of a record
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        backend.get(key).ok_or(HelixError::NotFound)
    }

    /// Get the values of several records; keys without a record are simply
    /// absent from the result
    pub fn get_multi(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = backend.get(key) {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Set the value of a record
    ///
    /// With `overwrite=false` an existing record is left untouched and the
    /// call reports a duplication error.
    pub fn set(&self, key: &[u8], value: &[u8], overwrite: bool) -> Result<()> {
        self.mutate_record(key, |current| {
            if current.is_some() && !overwrite {
                (
                    RecordAction::Noop,
                    Err(HelixError::Duplication(lossy(key))),
                )
            } else {
                (RecordAction::Set(value.to_vec()), Ok(()))
            }
        })?
    }

    /// Set the value of a record, returning the prior value atomically with
    /// the same write (None if the record was absent)
    pub fn set_and_get(
        &self,
        key: &[u8],
        value: &[u8],
        overwrite: bool,
    ) -> Result<Option<Vec<u8>>> {
        self.mutate_record(key, |current| {
            if current.is_some() && !overwrite {
                (
                    RecordAction::Noop,
                    Err(HelixError::Duplication(lossy(key))),
                )
            } else {
                let prior = current.map(<[u8]>::to_vec);
                (RecordAction::Set(value.to_vec()), Ok(prior))
            }
        })?
    }

    /// Set several records
    ///
    /// Each entry follows the single-record rules independently: every valid
    /// entry is applied and the first error is reported.
    pub fn set_multi(&self, records: &[(Vec<u8>, Vec<u8>)], overwrite: bool) -> Result<()> {
        let mut status = Ok(());
        for (key, value) in records {
            join_status(&mut status, self.set(key, value, overwrite));
        }
        status
    }

    /// Remove a record
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.mutate_record(key, |current| {
            if current.is_some() {
                (RecordAction::Remove, Ok(()))
            } else {
                (RecordAction::Noop, Err(HelixError::NotFound))
            }
        })?
    }

    /// Remove a record, returning the removed value atomically
    pub fn remove_and_get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.mutate_record(key, |current| match current {
            Some(value) => (RecordAction::Remove, Ok(value.to_vec())),
            None => (RecordAction::Noop, Err(HelixError::NotFound)),
        })?
    }

    /// Remove several records; every present record is removed and the first
    /// missing key is reported
    pub fn remove_multi(&self, keys: &[Vec<u8>]) -> Result<()> {
        let mut status = Ok(());
        for key in keys {
            join_status(&mut status, self.remove(key));
        }
        status
    }

    /// Append to a record's value
    ///
    /// An absent record is created with the value alone; otherwise the new
    /// value is `old + delim + value`, replaced atomically.
    pub fn append(&self, key: &[u8], value: &[u8], delim: &[u8]) -> Result<()> {
        self.mutate_record(key, |current| {
            let next = match current {
                Some(old) => {
                    let mut joined = Vec::with_capacity(old.len() + delim.len() + value.len());
                    joined.extend_from_slice(old);
                    joined.extend_from_slice(delim);
                    joined.extend_from_slice(value);
                    joined
                }
                None => value.to_vec(),
            };
            (RecordAction::Set(next), Ok(()))
        })?
    }

    /// Append to several records with a shared delimiter
    pub fn append_multi(&self, records: &[(Vec<u8>, Vec<u8>)], delim: &[u8]) -> Result<()> {
        let mut status = Ok(());
        for (key, value) in records {
            join_status(&mut status, self.append(key, value, delim));
        }
        status
    }

    // =========================================================================
    // Conditional and Arithmetic Operations
    // =========================================================================

    /// Atomically replace the record if its current state matches the
    /// expectation
    ///
    /// On mismatch nothing changes and the call reports Infeasible. This is
    /// the store's compare-and-swap primitive; it is linearizable with
    /// respect to every other mutator of the same key.
    pub fn compare_exchange(
        &self,
        key: &[u8],
        expected: &CasValue,
        desired: &CasValue,
    ) -> Result<()> {
        self.compare_exchange_and_get(key, expected, desired)
            .map(|_| ())
    }

    /// Compare-and-exchange returning the pre-operation value on success
    pub fn compare_exchange_and_get(
        &self,
        key: &[u8],
        expected: &CasValue,
        desired: &CasValue,
    ) -> Result<Option<Vec<u8>>> {
        self.mutate_record(key, |current| {
            if !expected.matches(current) {
                return (
                    RecordAction::Noop,
                    Err(HelixError::Infeasible(lossy(key))),
                );
            }
            let prior = current.map(<[u8]>::to_vec);
            let action = match desired {
                CasValue::Absent => RecordAction::Remove,
                CasValue::Any => RecordAction::Noop,
                CasValue::Value(v) => RecordAction::Set(v.clone()),
            };
            (action, Ok(prior))
        })?
    }

    /// Atomically exchange a fixed set of records, all or nothing
    ///
    /// Every expectation is evaluated against the current state first; if any
    /// fails, no key changes and the call reports Infeasible. Only when all
    /// hold is every desired change applied as one indivisible step.
    pub fn compare_exchange_multi(
        &self,
        expected: &[(Vec<u8>, CasValue)],
        desired: &[(Vec<u8>, CasValue)],
    ) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;

        for (key, expectation) in expected {
            let current = backend.get(key);
            if !expectation.matches(current.as_deref()) {
                return Err(HelixError::Infeasible(lossy(key)));
            }
        }
        for (key, desire) in desired {
            match desire {
                CasValue::Absent => {
                    backend.remove(key);
                }
                CasValue::Any => {}
                CasValue::Value(v) => backend.set(key, v.clone()),
            }
        }
        Ok(())
    }

    /// Atomically add to a counter record
    ///
    /// The value is an 8-byte big-endian signed integer, created from `init`
    /// when absent. Arithmetic wraps. The [`INCREMENT_NOOP`] delta reads the
    /// counter without creating or changing anything. Returns the resulting
    /// value.
    pub fn increment(&self, key: &[u8], inc: i64, init: i64) -> Result<i64> {
        self.mutate_record(key, |current| {
            let base = match current {
                Some(raw) => match <[u8; 8]>::try_from(raw) {
                    Ok(bytes) => i64::from_be_bytes(bytes),
                    Err(_) => {
                        return (
                            RecordAction::Noop,
                            Err(HelixError::BrokenData(format!(
                                "counter record is {} bytes, expected 8",
                                raw.len()
                            ))),
                        )
                    }
                },
                None => init,
            };
            if inc == INCREMENT_NOOP {
                return (RecordAction::Noop, Ok(base));
            }
            let next = base.wrapping_add(inc);
            (RecordAction::Set(next.to_be_bytes().to_vec()), Ok(next))
        })?
    }

    // =========================================================================
    // Record Processing
    // =========================================================================

    /// Apply an arbitrary function to one record under the store's atomicity
    /// guarantee
    ///
    /// The function sees the key and the current value (None when absent) and
    /// decides the record's fate. This is the general form of the conditional
    /// and arithmetic operations above. With `writable=false` the record is
    /// only inspected; a non-Noop action is then a precondition error.
    pub fn process<F>(&self, key: &[u8], writable: bool, f: F) -> Result<()>
    where
        F: FnOnce(&[u8], Option<&[u8]>) -> RecordAction,
    {
        if writable {
            self.mutate_record(key, |current| (f(key, current), Ok(())))?
        } else {
            let guard = self.inner.read();
            let backend = require_open(&guard)?;
            let current = backend.get(key);
            match f(key, current.as_deref()) {
                RecordAction::Noop => Ok(()),
                _ => Err(HelixError::Precondition(
                    "record mutation requires writable processing".to_string(),
                )),
            }
        }
    }

    /// Process a fixed set of records as one atomic unit
    pub fn process_multi<F>(&self, keys: &[Vec<u8>], f: F) -> Result<()>
    where
        F: FnMut(&[u8], Option<&[u8]>) -> RecordAction,
    {
        let mut f = f;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;
        for key in keys {
            let current = backend.get(key);
            match f(key, current.as_deref()) {
                RecordAction::Noop => {}
                RecordAction::Set(value) => backend.set(key, value),
                RecordAction::Remove => {
                    backend.remove(key);
                }
            }
        }
        Ok(())
    }

    /// Process every record as one atomic unit
    pub fn process_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> RecordAction,
    {
        let mut f = f;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;

        // Actions are decided over a stable view, then applied
        let mut records = Vec::with_capacity(backend.count());
        backend.each(&mut |key, value| {
            records.push((key.to_vec(), value.to_vec()));
            true
        });
        for (key, value) in records {
            match f(&key, &value) {
                RecordAction::Noop => {}
                RecordAction::Set(next) => backend.set(&key, next),
                RecordAction::Remove => {
                    backend.remove(&key);
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Atomically move (or copy) a record to a new key
    ///
    /// No observer ever sees an intermediate state: the transition from the
    /// old-key state to the new-key state is a single step under the
    /// exclusive lock.
    pub fn rekey(&self, old_key: &[u8], new_key: &[u8], overwrite: bool, copying: bool) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;

        let value = backend.get(old_key).ok_or(HelixError::NotFound)?;
        if !overwrite && new_key != old_key && backend.get(new_key).is_some() {
            return Err(HelixError::Duplication(lossy(new_key)));
        }
        if !copying {
            backend.remove(old_key);
        }
        backend.set(new_key, value);
        Ok(())
    }

    /// Atomically read and remove the first record
    ///
    /// "First" is the least key on ordered backends and the backend-defined
    /// first record otherwise.
    pub fn pop_first(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;

        let key = backend.first_key().ok_or(HelixError::NotFound)?;
        let value = backend.remove(&key).ok_or(HelixError::NotFound)?;
        Ok((key, value))
    }

    /// Append a record keyed by a timestamp
    ///
    /// The key is the big-endian encoding of `wtime` (seconds, at 10ns
    /// resolution); a negative `wtime` takes the wall clock. A colliding key
    /// is incremented until a free slot is found.
    pub fn push_last(&self, value: &[u8], wtime: f64) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;

        let seconds = if wtime < 0.0 {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| HelixError::System(format!("wall clock error: {}", e)))?
                .as_secs_f64()
        } else {
            wtime
        };
        let mut key_int = (seconds * 1e8) as u64;
        loop {
            let key = key_int.to_be_bytes();
            if backend.get(&key).is_none() {
                backend.set(&key, value.to_vec());
                return Ok(());
            }
            key_int = key_int.wrapping_add(1);
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Number of records
    pub fn count(&self) -> Result<usize> {
        let guard = self.inner.read();
        Ok(require_open(&guard)?.count())
    }

    /// Remove all records
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        writable_backend(inner)?.clear();
        Ok(())
    }

    /// Rebuild the backend's internal structures
    ///
    /// Cursors survive a rebuild but a removed current record reads as
    /// NotFound afterwards; they are invalidated-safe, not guaranteed-stable.
    pub fn rebuild(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        writable_backend(inner)?.rebuild();
        Ok(())
    }

    /// True if a rebuild would improve the backend's layout
    pub fn should_be_rebuilt(&self) -> Result<bool> {
        let guard = self.inner.read();
        Ok(require_open(&guard)?.should_be_rebuilt())
    }

    /// Persist the current state to the backing file
    ///
    /// With `hard` the data is fsynced. A no-op for in-memory or read-only
    /// stores.
    pub fn synchronize(&self, hard: bool) -> Result<()> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        if !guard.writable {
            return Ok(());
        }
        match &guard.path {
            Some(path) => backend.save(path, hard),
            None => Ok(()),
        }
    }

    /// Copy the backing file to another path, synchronizing first
    pub fn copy_file_data(&self, dest: &Path, sync_hard: bool) -> Result<()> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        let path = guard.path.as_ref().ok_or_else(|| {
            HelixError::Precondition("store has no backing file".to_string())
        })?;
        if guard.writable {
            backend.save(path, sync_hard)?;
        }
        fs::copy(path, dest)?;
        Ok(())
    }

    /// Copy every record into another open, writable store
    pub fn export(&self, dest: &Store) -> Result<()> {
        if std::ptr::eq(self, dest) {
            return Err(HelixError::InvalidArgument(
                "cannot export a store into itself".to_string(),
            ));
        }
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        let mut status = Ok(());
        backend.each(&mut |key, value| {
            if let Err(e) = dest.set(key, value, true) {
                status = Err(e);
                return false;
            }
            true
        });
        status
    }

    /// Write every record to a flat record file (key frame, then value frame)
    pub fn export_to_flat_records(&self, path: &Path) -> Result<()> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        let mut writer = FlatRecordWriter::create(path)?;
        let mut status = Ok(());
        backend.each(&mut |key, value| {
            let result = writer
                .write_record(key)
                .and_then(|()| writer.write_record(value));
            if let Err(e) = result {
                status = Err(e);
                return false;
            }
            true
        });
        status?;
        writer.finish()
    }

    /// Load records from a flat record file as one atomic unit
    pub fn import_from_flat_records(&self, path: &Path) -> Result<()> {
        let mut reader = FlatRecordReader::open(path)?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;
        while let Some((key, value)) = reader.read_pair()? {
            backend.set(&key, value);
        }
        Ok(())
    }

    /// Write every key as a line of text
    pub fn export_keys_as_lines(&self, path: &Path) -> Result<()> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        let mut status = Ok(());
        backend.each(&mut |key, _value| {
            let result = writer
                .write_all(key)
                .and_then(|()| writer.write_all(b"\n"));
            if let Err(e) = result {
                status = Err(HelixError::from(e));
                return false;
            }
            true
        });
        status?;
        writer.flush()?;
        Ok(())
    }

    /// Diagnostic properties of the store and its backend
    pub fn inspect(&self) -> Result<HashMap<String, String>> {
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        let mut props: HashMap<String, String> = backend.inspect().into_iter().collect();
        props.insert(
            "path".to_string(),
            guard
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );
        props.insert("writable".to_string(), guard.writable.to_string());
        props.insert("healthy".to_string(), guard.healthy.to_string());
        Ok(props)
    }

    // =========================================================================
    // Flags and Accessors
    // =========================================================================

    /// True while the store is open
    pub fn is_open(&self) -> bool {
        self.inner.read().backend.is_some()
    }

    /// True while the store is open and accepts mutations
    pub fn is_writable(&self) -> bool {
        let guard = self.inner.read();
        guard.backend.is_some() && guard.writable
    }

    /// True while the store is open and no corruption has been detected
    pub fn is_healthy(&self) -> bool {
        let guard = self.inner.read();
        guard.backend.is_some() && guard.healthy
    }

    /// True if the backend's keys have a usable total order
    pub fn is_ordered(&self) -> bool {
        let guard = self.inner.read();
        guard.backend.as_ref().map(|b| b.is_ordered()).unwrap_or(false)
    }

    /// Path of the backing file
    pub fn file_path(&self) -> Result<PathBuf> {
        let guard = self.inner.read();
        require_open(&guard)?;
        guard
            .path
            .clone()
            .ok_or_else(|| HelixError::Precondition("store has no backing file".to_string()))
    }

    /// Size of the backing file in bytes
    pub fn file_size(&self) -> Result<u64> {
        let guard = self.inner.read();
        require_open(&guard)?;
        let path = guard.path.as_ref().ok_or_else(|| {
            HelixError::Precondition("store has no backing file".to_string())
        })?;
        Ok(fs::metadata(path)?.len())
    }

    // =========================================================================
    // Search and Cursors
    // =========================================================================

    /// Scan keys with a pattern
    ///
    /// `mode` is one of the search collaborator's modes (`contain`, `begin`,
    /// `end`, `regex`, `edit`, `editbin`, `containcase`, `containword`,
    /// `containcaseword`, `upper`, `upperinc`, `lower`, `lowerinc`);
    /// `capacity` bounds the result (0 = unlimited).
    pub fn search(&self, mode: &str, pattern: &[u8], capacity: usize) -> Result<Vec<Vec<u8>>> {
        let parsed: SearchMode = mode.parse()?;
        let guard = self.inner.read();
        let backend = require_open(&guard)?;
        search_keys(backend, parsed, pattern, capacity)
    }

    /// Create a cursor over this store
    ///
    /// The cursor borrows the store; any number of cursors may coexist with
    /// each other and with direct mutators.
    pub fn make_cursor(&self) -> Cursor<'_> {
        Cursor::new(self)
    }

    // =========================================================================
    // Restoration
    // =========================================================================

    /// Rebuild a healthy snapshot from a possibly-broken one
    ///
    /// Scans `old_path` leniently up to `end_offset` bytes (`<= 0` =
    /// unlimited), keeping every record that still verifies, and writes a
    /// fresh snapshot to `new_path`. The backend class comes from
    /// `class_name` when non-empty, else the old path's extension, else the
    /// damaged file's own header.
    pub fn restore_database(
        old_path: &Path,
        new_path: &Path,
        class_name: &str,
        end_offset: i64,
    ) -> Result<()> {
        let (header, records) = backend::scan_snapshot_file(old_path, end_offset)?;
        let class = if !class_name.is_empty() {
            BackendClass::from_name(class_name)?
        } else {
            match BackendClass::from_path(old_path) {
                Some(c) => c,
                None => BackendClass::from_id(header.class_id)?,
            }
        };
        let comparator =
            KeyComparator::from_id(header.comparator_id).unwrap_or_default();
        tracing::info!(
            "restoring {} salvaged records from {} into {}",
            records.len(),
            old_path.display(),
            new_path.display()
        );
        let backend = build_backend(class, comparator, records);
        backend.save(new_path, true)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Run a read-modify-write of one record under the exclusive lock
    ///
    /// Single place where every single-key mutation funnels through, which is
    /// what makes them all linearizable against each other.
    fn mutate_record<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(Option<&[u8]>) -> (RecordAction, R),
    ) -> Result<R> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;
        let current = backend.get(key);
        let (action, result) = f(current.as_deref());
        match action {
            RecordAction::Noop => {}
            RecordAction::Set(value) => backend.set(key, value),
            RecordAction::Remove => {
                backend.remove(key);
            }
        }
        Ok(result)
    }
}

// =============================================================================
// Lock-Side Helpers
// =============================================================================

/// Borrow the backend for reading, or fail with a precondition error
fn require_open(inner: &Inner) -> Result<&dyn Backend> {
    match &inner.backend {
        Some(b) => Ok(b.as_ref()),
        None => Err(HelixError::Precondition("store is not open".to_string())),
    }
}

/// Borrow the backend for mutation, or fail with a precondition error
fn writable_backend(inner: &mut Inner) -> Result<&mut dyn Backend> {
    let writable = inner.writable;
    match inner.backend.as_mut() {
        None => Err(HelixError::Precondition("store is not open".to_string())),
        Some(_) if !writable => {
            Err(HelixError::Precondition("store is read-only".to_string()))
        }
        Some(b) => Ok(b.as_mut()),
    }
}

/// Load a snapshot, optionally salvaging a damaged file
///
/// Returns the header, the records and whether a lenient salvage was needed.
fn load_snapshot(
    path: &Path,
    allow_restore: bool,
) -> Result<(SnapshotHeader, Vec<(Vec<u8>, Vec<u8>)>, bool)> {
    match backend::read_snapshot_file(path) {
        Ok((header, records)) => Ok((header, records, false)),
        Err(e @ HelixError::BrokenData(_)) if allow_restore => {
            tracing::warn!("snapshot {} is damaged ({}), salvaging", path.display(), e);
            let (header, records) = backend::scan_snapshot_file(path, -1)?;
            Ok((header, records, true))
        }
        Err(e) => Err(e),
    }
}

/// Construct a backend of the given class preloaded with records
fn build_backend(
    class: BackendClass,
    comparator: KeyComparator,
    records: Vec<(Vec<u8>, Vec<u8>)>,
) -> Box<dyn Backend> {
    match class {
        BackendClass::Tree => Box::new(crate::backend::TreeBackend::with_records(
            comparator, records,
        )),
        BackendClass::Hash => Box::new(crate::backend::HashBackend::with_records(records)),
    }
}

/// Render a key for diagnostics
fn lossy(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
