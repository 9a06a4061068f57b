//! Async façade tests
//!
//! Tests verify:
//! - Non-blocking submission with future resolution
//! - Out-of-order awaiting
//! - Wait with and without timeout
//! - Shared-store atomicity under many workers
//! - Drain-before-shutdown semantics

use std::sync::Arc;

use helixkv::{AsyncStore, CasValue, HelixError, OpenOptions, Store, StatusCode};

/// Open a writable in-memory store behind an Arc
fn shared_store() -> Arc<Store> {
    let store = Store::new();
    store.open("", true, &OpenOptions::default()).unwrap();
    Arc::new(store)
}

// =============================================================================
// Submission Tests
// =============================================================================

#[test]
fn test_set_then_get_resolve_in_order() {
    let store = shared_store();
    // One worker keeps queue order and execution order identical
    let pool = AsyncStore::new(Arc::clone(&store), 1);

    let set_future = pool.set(b"k", b"v", true);
    let get_future = pool.get(b"k");

    // Awaited out of submission order
    let value = get_future.get().unwrap();
    assert_eq!(value, b"v");
    set_future.get().unwrap();
}

#[test]
fn test_error_statuses_travel_through_futures() {
    let store = shared_store();
    let pool = AsyncStore::new(store, 2);

    let missing = pool.get(b"missing").get();
    assert!(matches!(missing, Err(HelixError::NotFound)));

    pool.set(b"k", b"v", true).get().unwrap();
    let duplication = pool.set(b"k", b"other", false).get();
    assert_eq!(duplication.unwrap_err().code(), StatusCode::Duplication);
}

#[test]
fn test_wait_is_repeatable_and_reports_completion() {
    let store = shared_store();
    let pool = AsyncStore::new(store, 1);

    let future = pool.set(b"k", b"v", true);
    assert!(future.wait(-1.0));
    // Non-consuming: waiting again still reports done
    assert!(future.wait(0.0));
    assert!(future.wait(5.0));
    future.get().unwrap();
}

#[test]
fn test_wait_timeout_on_slow_queue() {
    let store = shared_store();
    let pool = AsyncStore::new(Arc::clone(&store), 1);

    // Occupy the only worker with a long queue of work
    for i in 0..200u32 {
        pool.set(format!("key{}", i).as_bytes(), b"x", true);
    }
    let last = pool.increment(b"done", 1, 0);
    // Zero timeout polls; eventually an unbounded wait succeeds
    let _ = last.wait(0.0);
    assert!(last.wait(-1.0));
    assert_eq!(last.get().unwrap(), 1);
}

// =============================================================================
// Operation Mirror Tests
// =============================================================================

#[test]
fn test_mirrored_operations_inherit_store_semantics() {
    let store = shared_store();
    let pool = AsyncStore::new(Arc::clone(&store), 2);

    pool.set_multi(
        &[(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())],
        true,
    )
    .get()
    .unwrap();

    let found = pool
        .get_multi(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
        .get()
        .unwrap();
    assert_eq!(found.len(), 2);

    pool.append(b"a", b"x", b"-").get().unwrap();
    assert_eq!(store.get(b"a").unwrap(), b"1-x");

    pool.compare_exchange(
        b"b",
        CasValue::Value(b"2".to_vec()),
        CasValue::Value(b"20".to_vec()),
    )
    .get()
    .unwrap();
    assert_eq!(store.get(b"b").unwrap(), b"20");

    pool.rekey(b"b", b"renamed", true, false).get().unwrap();
    assert_eq!(store.get(b"renamed").unwrap(), b"20");

    pool.remove(b"renamed").get().unwrap();
    assert!(!store.contains(b"renamed").unwrap());

    let keys = pool.search("begin", b"a", 0).get().unwrap();
    assert_eq!(keys, vec![b"a".to_vec()]);
}

#[test]
fn test_pop_first_and_push_last_via_pool() {
    let store = shared_store();
    let pool = AsyncStore::new(store, 2);

    pool.push_last(b"queued", 2.0).get().unwrap();
    let (key, value) = pool.pop_first().get().unwrap();
    assert_eq!(key, 200_000_000u64.to_be_bytes());
    assert_eq!(value, b"queued");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_increments_are_atomic() {
    let store = shared_store();
    let pool = AsyncStore::new(Arc::clone(&store), 8);

    let futures: Vec<_> = (0..500).map(|_| pool.increment(b"counter", 1, 0)).collect();
    for future in futures {
        future.get().unwrap();
    }
    assert_eq!(store.increment(b"counter", 0, 0).unwrap(), 500);
}

#[test]
fn test_compare_exchange_multi_is_atomic_across_workers() {
    let store = shared_store();
    store.set(b"left", b"10", true).unwrap();
    store.set(b"right", b"0", true).unwrap();
    let pool = AsyncStore::new(Arc::clone(&store), 4);

    // Many conflicting transfers race; exactly one can win
    let futures: Vec<_> = (0..8)
        .map(|_| {
            pool.compare_exchange_multi(
                vec![
                    (b"left".to_vec(), CasValue::Value(b"10".to_vec())),
                    (b"right".to_vec(), CasValue::Value(b"0".to_vec())),
                ],
                vec![
                    (b"left".to_vec(), CasValue::Value(b"0".to_vec())),
                    (b"right".to_vec(), CasValue::Value(b"10".to_vec())),
                ],
            )
        })
        .collect();

    let wins = futures
        .into_iter()
        .filter(|f| f.wait(-1.0))
        .map(|f| f.get())
        .filter(Result::is_ok)
        .count();
    assert_eq!(wins, 1);
    assert_eq!(store.get(b"left").unwrap(), b"0");
    assert_eq!(store.get(b"right").unwrap(), b"10");
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_drop_drains_queued_work() {
    let store = shared_store();
    {
        let pool = AsyncStore::new(Arc::clone(&store), 2);
        for i in 0..300u32 {
            pool.set(format!("key{}", i).as_bytes(), b"x", true);
        }
        // Shutdown is a barrier: every accepted submission runs to completion
    }
    assert_eq!(store.count().unwrap(), 300);
}

#[test]
fn test_store_usable_after_pool_shutdown() {
    let store = shared_store();
    {
        let pool = AsyncStore::new(Arc::clone(&store), 2);
        pool.set(b"k", b"v", true).get().unwrap();
    }
    assert_eq!(store.get(b"k").unwrap(), b"v");
    store.set(b"k2", b"v2", true).unwrap();
}
