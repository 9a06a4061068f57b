//! Store cursors
//!
//! A cursor is a stateful position over a store. The position is anchored to
//! a key, not to backend internals, so a record removed by another actor
//! degrades deterministically: positional reads report NotFound and movement
//! re-seeks past the vanished key. Any number of cursors may run alongside
//! each other and direct mutators.

use crate::error::{HelixError, Result};

use super::{require_open, writable_backend, Store};

/// Logical position of a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pos {
    /// Fresh cursor, not yet pointed anywhere
    Unpositioned,

    /// Anchored at a key
    At(Vec<u8>),

    /// Ran off the end (or found no match); not an error in itself
    Exhausted,
}

/// A stateful position over a [`Store`]
///
/// Borrowing the store ties the cursor's lifetime to it, which is the
/// ownership discipline the contract asks callers to keep.
pub struct Cursor<'a> {
    store: &'a Store,
    pos: Pos,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(store: &'a Store) -> Self {
        Self {
            store,
            pos: Pos::Unpositioned,
        }
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Move to the first record
    ///
    /// Succeeds even on an empty store, landing in the exhausted state.
    pub fn first(&mut self) -> Result<()> {
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        self.pos = match backend.first_key() {
            Some(key) => Pos::At(key),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    /// Move to the last record (ordered backends only)
    pub fn last(&mut self) -> Result<()> {
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        if !backend.is_ordered() {
            return Err(HelixError::NotImplemented(
                "last requires an ordered backend".to_string(),
            ));
        }
        self.pos = match backend.last_key() {
            Some(key) => Pos::At(key),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    /// Move to a key
    ///
    /// On ordered backends this lands on the key itself or the least key
    /// above it (lower-bound semantics). On unordered backends an absent key
    /// is an error and the cursor is exhausted.
    pub fn jump(&mut self, key: &[u8]) -> Result<()> {
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        if backend.is_ordered() {
            self.pos = match backend.seek_upper(key, true) {
                Some(found) => Pos::At(found),
                None => Pos::Exhausted,
            };
            Ok(())
        } else if backend.get(key).is_some() {
            self.pos = Pos::At(key.to_vec());
            Ok(())
        } else {
            self.pos = Pos::Exhausted;
            Err(HelixError::NotFound)
        }
    }

    /// Move to the greatest key below (or at, if inclusive) the pivot
    /// (ordered backends only)
    pub fn jump_lower(&mut self, key: &[u8], inclusive: bool) -> Result<()> {
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        if !backend.is_ordered() {
            return Err(HelixError::NotImplemented(
                "jump_lower requires an ordered backend".to_string(),
            ));
        }
        self.pos = match backend.seek_lower(key, inclusive) {
            Some(found) => Pos::At(found),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    /// Move to the least key above (or at, if inclusive) the pivot
    /// (ordered backends only)
    pub fn jump_upper(&mut self, key: &[u8], inclusive: bool) -> Result<()> {
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        if !backend.is_ordered() {
            return Err(HelixError::NotImplemented(
                "jump_upper requires an ordered backend".to_string(),
            ));
        }
        self.pos = match backend.seek_upper(key, inclusive) {
            Some(found) => Pos::At(found),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    /// Move one record forward
    ///
    /// Fails if the cursor holds no position; running off the end parks the
    /// cursor in the exhausted state, which is not an error.
    pub fn next(&mut self) -> Result<()> {
        let anchor = self.anchor()?;
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        self.pos = match backend.seek_upper(&anchor, false) {
            Some(key) => Pos::At(key),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    /// Move one record backward
    pub fn previous(&mut self) -> Result<()> {
        let anchor = self.anchor()?;
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        self.pos = match backend.seek_lower(&anchor, false) {
            Some(key) => Pos::At(key),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read the current record without moving
    pub fn get(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let anchor = self.anchor()?;
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        let value = backend.get(&anchor).ok_or(HelixError::NotFound)?;
        Ok((anchor, value))
    }

    /// Read the current record's key
    pub fn get_key(&self) -> Result<Vec<u8>> {
        self.get().map(|(key, _)| key)
    }

    /// Read the current record's value
    pub fn get_value(&self) -> Result<Vec<u8>> {
        self.get().map(|(_, value)| value)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Atomically replace the value of the current record
    pub fn set(&mut self, value: &[u8]) -> Result<()> {
        let anchor = self.anchor()?;
        let mut guard = self.store.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;
        if backend.get(&anchor).is_none() {
            return Err(HelixError::NotFound);
        }
        backend.set(&anchor, value.to_vec());
        Ok(())
    }

    /// Atomically delete the current record and advance
    ///
    /// The cursor moves to the following record (or exhausts), so forward
    /// traversal can continue.
    pub fn remove(&mut self) -> Result<()> {
        let anchor = self.anchor()?;
        let mut guard = self.store.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;
        if backend.remove(&anchor).is_none() {
            return Err(HelixError::NotFound);
        }
        self.pos = match backend.seek_upper(&anchor, false) {
            Some(key) => Pos::At(key),
            None => Pos::Exhausted,
        };
        Ok(())
    }

    /// Atomically read the current record and advance
    ///
    /// One fused step instead of separate get + next, shrinking the window a
    /// concurrent writer could slip into.
    pub fn step(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let anchor = self.anchor()?;
        let guard = self.store.inner.read();
        let backend = require_open(&guard)?;
        let value = backend.get(&anchor).ok_or(HelixError::NotFound)?;
        self.pos = match backend.seek_upper(&anchor, false) {
            Some(key) => Pos::At(key),
            None => Pos::Exhausted,
        };
        Ok((anchor, value))
    }

    /// Atomically read and remove the first record
    ///
    /// Fused jump-to-first + read + remove; the cursor lands on the record
    /// that becomes first afterwards.
    pub fn pop_first(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut guard = self.store.inner.write();
        let inner = &mut *guard;
        let backend = writable_backend(inner)?;
        let key = backend.first_key().ok_or(HelixError::NotFound)?;
        let value = backend.remove(&key).ok_or(HelixError::NotFound)?;
        self.pos = match backend.first_key() {
            Some(next) => Pos::At(next),
            None => Pos::Exhausted,
        };
        Ok((key, value))
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// The anchored key, or NotFound when the cursor holds no position
    fn anchor(&self) -> Result<Vec<u8>> {
        match &self.pos {
            Pos::At(key) => Ok(key.clone()),
            Pos::Unpositioned | Pos::Exhausted => Err(HelixError::NotFound),
        }
    }
}
