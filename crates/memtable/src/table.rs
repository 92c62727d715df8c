//! The ordered table behind [`Memtable`](crate::Memtable).
//!
//! A `BTreeMap` keyed by arena views: `put` and `delete` copy the caller's
//! bytes into the table's own arena first, so the stored views stay valid no
//! matter what the caller does with its buffers. Any ordered structure with
//! logarithmic insert/lookup would do; the std B-tree keeps this crate free
//! of hand-rolled node plumbing.

use std::collections::BTreeMap;
use std::ops::Bound;

use arena::Arena;

use crate::slice::RawSlice;
use crate::{Lookup, StoreError, ValueKind, ValueRef};

/// Rough per-entry cost of the tree itself (node storage, ordering
/// metadata), counted on top of the arena bytes.
const ENTRY_OVERHEAD_BYTES: usize = 64;

#[derive(Clone, Copy)]
struct StoredValue {
    kind: ValueKind,
    value: RawSlice,
}

/// Ordered key → (kind, value) mapping over arena-owned bytes.
pub struct SortedTable {
    map: BTreeMap<RawSlice, StoredValue>,
    arena: Arena,
}

impl SortedTable {
    pub fn new() -> Self {
        SortedTable {
            map: BTreeMap::new(),
            arena: Arena::new(),
        }
    }

    /// Inserts or replaces `key` with a live value.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key, `AllocationFailed` when the arena
    /// cannot back the copies.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        let key = self
            .arena
            .alloc_bytes(key)
            .ok_or(StoreError::AllocationFailed("memtable key bytes"))?;
        let value = self
            .arena
            .alloc_bytes(value)
            .ok_or(StoreError::AllocationFailed("memtable value bytes"))?;
        self.map.insert(
            RawSlice::from_slice(key),
            StoredValue {
                kind: ValueKind::Data,
                value: RawSlice::from_slice(value),
            },
        );
        Ok(())
    }

    /// Records a delete for `key`, creating the entry if it was absent. A
    /// later [`put`](SortedTable::put) reinstates live data.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        let key = self
            .arena
            .alloc_bytes(key)
            .ok_or(StoreError::AllocationFailed("memtable tombstone key"))?;
        self.map.insert(
            RawSlice::from_slice(key),
            StoredValue {
                kind: ValueKind::Tombstone,
                value: RawSlice::EMPTY,
            },
        );
        Ok(())
    }

    /// Point lookup. `Lookup::Miss` means the key is absent from this table
    /// entirely — a tombstone is reported as such, not as a miss.
    pub fn get(&self, key: &[u8]) -> Lookup<'_> {
        let probe = RawSlice::from_slice(key);
        match self.map.get(&probe) {
            None => Lookup::Miss,
            Some(stored) => match stored.kind {
                ValueKind::Tombstone => Lookup::Tombstone,
                // SAFETY: the value bytes live in `self.arena`, which lives
                // as long as `self`.
                ValueKind::Data => Lookup::Value(unsafe { stored.value.as_slice() }),
            },
        }
    }

    /// Arena bytes plus an estimate of the tree's own overhead.
    pub fn approximate_bytes_used(&self) -> usize {
        self.arena.bytes_used() + self.map.len() * ENTRY_OVERHEAD_BYTES
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Cursor over the table in ascending key order, tombstones included.
    pub fn iter(&self) -> TableIter<'_> {
        TableIter {
            table: self,
            current: None,
        }
    }
}

impl Default for SortedTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered cursor over a [`SortedTable`].
///
/// Starts unpositioned; call [`seek_to_first`](TableIter::seek_to_first) or
/// [`seek`](TableIter::seek) before reading. `key`/`value` views borrow the
/// table and stay valid for the table's lifetime (the arena never moves
/// them).
pub struct TableIter<'t> {
    table: &'t SortedTable,
    current: Option<(RawSlice, StoredValue)>,
}

impl<'t> TableIter<'t> {
    /// Positions at the smallest key, or invalid if the table is empty.
    pub fn seek_to_first(&mut self) {
        self.current = self.table.map.iter().next().map(|(k, v)| (*k, *v));
    }

    /// Positions at the first key `>= target`, or invalid past the end.
    pub fn seek(&mut self, target: &[u8]) {
        let probe = RawSlice::from_slice(target);
        self.current = self
            .table
            .map
            .range((Bound::Included(probe), Bound::Unbounded))
            .next()
            .map(|(k, v)| (*k, *v));
    }

    /// Advances to the next key; a no-op when already invalid.
    pub fn next(&mut self) {
        let Some((current_key, _)) = self.current else {
            return;
        };
        self.current = self
            .table
            .map
            .range((Bound::Excluded(current_key), Bound::Unbounded))
            .next()
            .map(|(k, v)| (*k, *v));
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// In-memory iteration cannot fail; this exists for parity with the
    /// SSTable cursor so callers can treat the two alike.
    pub fn status(&self) -> Result<(), &StoreError> {
        Ok(())
    }

    /// Current key; empty when the cursor is invalid.
    pub fn key(&self) -> &'t [u8] {
        match &self.current {
            // SAFETY: key bytes live in the table's arena, alive for 't.
            Some((key, _)) => unsafe { key.as_slice() },
            None => &[],
        }
    }

    /// Current entry; an empty tombstone when the cursor is invalid.
    pub fn value(&self) -> ValueRef<'t> {
        match &self.current {
            Some((_, stored)) => ValueRef {
                kind: stored.kind,
                // SAFETY: value bytes live in the table's arena, alive for 't.
                bytes: unsafe { stored.value.as_slice() },
            },
            None => ValueRef {
                kind: ValueKind::Tombstone,
                bytes: &[],
            },
        }
    }
}
