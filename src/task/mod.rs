//! Asynchronous execution façade
//!
//! Offloads store operations onto a bounded worker pool and hands back a
//! future per submission.
//!
//! ## Responsibilities
//! - Own the worker pool and the shared FIFO work queue
//! - Mirror every store operation as a non-blocking submission
//! - Drain all queued and in-flight work before shutdown (a barrier, not a
//!   cancellation: once enqueued, an operation runs to completion)
//!
//! ```text
//! caller ──submit──▶ ┌─────────────┐      ┌──────────┐
//!                    │ FIFO queue  │─────▶│ worker 0 │──┐
//!   Future ◀─────────│ (crossbeam) │─────▶│ worker N │──┼──▶ shared Store
//!                    └─────────────┘      └──────────┘  │
//!        ◀───────────────── result deposited ◀──────────┘
//! ```

mod future;

pub use future::Future;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use crate::error::Result;
use crate::store::{CasValue, Store};

/// A queued unit of work
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Worker-pool façade over a shared [`Store`]
///
/// The store must outlive the pool's shutdown, which the `Arc` guarantees.
/// Execution interleaving between distinct keys is exactly as concurrent
/// direct calls would be; only the queue itself is FIFO.
pub struct AsyncStore {
    store: Arc<Store>,
    queue: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncStore {
    /// Start a pool of `num_workers` (at least one) over the given store
    pub fn new(store: Arc<Store>, num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let (tx, rx) = channel::unbounded::<Task>();

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let rx = rx.clone();
            workers.push(thread::spawn(move || {
                tracing::debug!("worker {} started", id);
                while let Ok(task) = rx.recv() {
                    task();
                }
                tracing::debug!("worker {} stopped", id);
            }));
        }

        Self {
            store,
            queue: Some(tx),
            workers,
        }
    }

    /// The store this pool executes against
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Enqueue an operation and return its future without blocking
    fn submit<T, F>(&self, op: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> T + Send + 'static,
    {
        let (future, promise) = Future::pair();
        let store = Arc::clone(&self.store);
        let task: Task = Box::new(move || promise.fulfill(op(&store)));
        if let Some(queue) = &self.queue {
            if queue.send(task).is_err() {
                // Channel gone means the pool died; dropping the task
                // abandons the promise and the future fails loudly
                tracing::warn!("submission dropped: worker pool is gone");
            }
        }
        future
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Get the value of a record
    pub fn get(&self, key: &[u8]) -> Future<Result<Vec<u8>>> {
        let key = key.to_vec();
        self.submit(move |store| store.get(&key))
    }

    /// Get the values of several records
    pub fn get_multi(&self, keys: &[Vec<u8>]) -> Future<Result<HashMap<Vec<u8>, Vec<u8>>>> {
        let keys = keys.to_vec();
        self.submit(move |store| store.get_multi(&keys))
    }

    /// Set the value of a record
    pub fn set(&self, key: &[u8], value: &[u8], overwrite: bool) -> Future<Result<()>> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.submit(move |store| store.set(&key, &value, overwrite))
    }

    /// Set several records
    pub fn set_multi(
        &self,
        records: &[(Vec<u8>, Vec<u8>)],
        overwrite: bool,
    ) -> Future<Result<()>> {
        let records = records.to_vec();
        self.submit(move |store| store.set_multi(&records, overwrite))
    }

    /// Remove a record
    pub fn remove(&self, key: &[u8]) -> Future<Result<()>> {
        let key = key.to_vec();
        self.submit(move |store| store.remove(&key))
    }

    /// Remove several records
    pub fn remove_multi(&self, keys: &[Vec<u8>]) -> Future<Result<()>> {
        let keys = keys.to_vec();
        self.submit(move |store| store.remove_multi(&keys))
    }

    /// Append to a record's value
    pub fn append(&self, key: &[u8], value: &[u8], delim: &[u8]) -> Future<Result<()>> {
        let key = key.to_vec();
        let value = value.to_vec();
        let delim = delim.to_vec();
        self.submit(move |store| store.append(&key, &value, &delim))
    }

    /// Append to several records
    pub fn append_multi(
        &self,
        records: &[(Vec<u8>, Vec<u8>)],
        delim: &[u8],
    ) -> Future<Result<()>> {
        let records = records.to_vec();
        let delim = delim.to_vec();
        self.submit(move |store| store.append_multi(&records, &delim))
    }

    // =========================================================================
    // Conditional and Structural Operations
    // =========================================================================

    /// Compare-and-exchange one record
    pub fn compare_exchange(
        &self,
        key: &[u8],
        expected: CasValue,
        desired: CasValue,
    ) -> Future<Result<()>> {
        let key = key.to_vec();
        self.submit(move |store| store.compare_exchange(&key, &expected, &desired))
    }

    /// All-or-nothing exchange over a fixed key set
    pub fn compare_exchange_multi(
        &self,
        expected: Vec<(Vec<u8>, CasValue)>,
        desired: Vec<(Vec<u8>, CasValue)>,
    ) -> Future<Result<()>> {
        self.submit(move |store| store.compare_exchange_multi(&expected, &desired))
    }

    /// Atomically add to a counter record
    pub fn increment(&self, key: &[u8], inc: i64, init: i64) -> Future<Result<i64>> {
        let key = key.to_vec();
        self.submit(move |store| store.increment(&key, inc, init))
    }

    /// Atomically move (or copy) a record to a new key
    pub fn rekey(
        &self,
        old_key: &[u8],
        new_key: &[u8],
        overwrite: bool,
        copying: bool,
    ) -> Future<Result<()>> {
        let old_key = old_key.to_vec();
        let new_key = new_key.to_vec();
        self.submit(move |store| store.rekey(&old_key, &new_key, overwrite, copying))
    }

    /// Atomically read and remove the first record
    pub fn pop_first(&self) -> Future<Result<(Vec<u8>, Vec<u8>)>> {
        self.submit(|store| store.pop_first())
    }

    /// Append a record keyed by a timestamp
    pub fn push_last(&self, value: &[u8], wtime: f64) -> Future<Result<()>> {
        let value = value.to_vec();
        self.submit(move |store| store.push_last(&value, wtime))
    }

    // =========================================================================
    // Maintenance Operations
    // =========================================================================

    /// Remove all records
    pub fn clear(&self) -> Future<Result<()>> {
        self.submit(|store| store.clear())
    }

    /// Rebuild the backend's internal structures
    pub fn rebuild(&self) -> Future<Result<()>> {
        self.submit(|store| store.rebuild())
    }

    /// Persist the current state to the backing file
    pub fn synchronize(&self, hard: bool) -> Future<Result<()>> {
        self.submit(move |store| store.synchronize(hard))
    }

    /// Copy the backing file to another path
    pub fn copy_file_data(&self, dest: PathBuf, sync_hard: bool) -> Future<Result<()>> {
        self.submit(move |store| store.copy_file_data(&dest, sync_hard))
    }

    /// Copy every record into another open, writable store
    pub fn export(&self, dest: Arc<Store>) -> Future<Result<()>> {
        self.submit(move |store| store.export(&dest))
    }

    /// Write every record to a flat record file
    pub fn export_to_flat_records(&self, path: PathBuf) -> Future<Result<()>> {
        self.submit(move |store| store.export_to_flat_records(&path))
    }

    /// Load records from a flat record file
    pub fn import_from_flat_records(&self, path: PathBuf) -> Future<Result<()>> {
        self.submit(move |store| store.import_from_flat_records(&path))
    }

    /// Scan keys with a pattern
    pub fn search(
        &self,
        mode: &str,
        pattern: &[u8],
        capacity: usize,
    ) -> Future<Result<Vec<Vec<u8>>>> {
        let mode = mode.to_string();
        let pattern = pattern.to_vec();
        self.submit(move |store| store.search(&mode, &pattern, capacity))
    }
}

impl Drop for AsyncStore {
    /// Shutdown barrier: close the queue, then join every worker
    ///
    /// Workers finish everything already enqueued before they observe the
    /// closed channel, so no accepted operation is abandoned.
    fn drop(&mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!("worker pool drained and joined");
    }
}
