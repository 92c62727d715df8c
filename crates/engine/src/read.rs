//! Read path: one resolver over all layers, with two user-facing flavors.

use arena::Arena;
use memtable::{Lookup, StoreError};
use sstable::SstReader;

use crate::Db;

/// Where the resolver found the key. Memtable hits borrow the engine's own
/// arenas and must be copied out before they cross the API boundary;
/// SSTable hits are already in the caller's sink arena.
enum Hit<'db, 'a> {
    Mem(&'db [u8]),
    Sst(&'a [u8]),
    Tombstone,
    Miss,
}

impl Db {
    /// Point lookup, returning an owned copy of the value.
    ///
    /// `Ok(None)` covers both "never written" and "deleted" — tombstones do
    /// not escape this boundary.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        // SSTable hits need somewhere to land; a throwaway arena serves as
        // the sink and dies with this call.
        let sink = Arena::new();
        match self.lookup(key, &sink)? {
            Hit::Mem(value) => Ok(Some(value.to_vec())),
            Hit::Sst(value) => Ok(Some(value.to_vec())),
            Hit::Tombstone | Hit::Miss => Ok(None),
        }
    }

    /// Point lookup placing the value in the caller's arena.
    ///
    /// The returned view borrows only `arena`, never the engine's internal
    /// memtables or any reader's block buffer, so it stays valid for as long
    /// as the caller keeps the arena, including across later writes, flushes,
    /// or dropping the `Db` itself.
    pub fn get_in<'a>(&self, key: &[u8], arena: &'a Arena) -> Result<Option<&'a [u8]>, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        match self.lookup(key, arena)? {
            // Already copied into the caller's arena by the reader.
            Hit::Sst(value) => Ok(Some(value)),
            // Memtable memory belongs to a table the engine may rotate and
            // drop; copy before returning.
            Hit::Mem(value) => {
                let copied = arena
                    .alloc_bytes(value)
                    .ok_or(StoreError::AllocationFailed("value copy into caller arena"))?;
                Ok(Some(copied))
            }
            Hit::Tombstone | Hit::Miss => Ok(None),
        }
    }

    /// The single source of truth for layered resolution: active memtable,
    /// then the immutable one, then L0 files newest to oldest. The first
    /// value or tombstone wins; errors from any layer propagate.
    fn lookup<'db, 'a>(&'db self, key: &[u8], sink: &'a Arena) -> Result<Hit<'db, 'a>, StoreError> {
        match self.active.get(key) {
            Lookup::Value(value) => return Ok(Hit::Mem(value)),
            Lookup::Tombstone => return Ok(Hit::Tombstone),
            Lookup::Miss => {}
        }

        if let Some(immutable) = &self.immutable {
            match immutable.get(key) {
                Lookup::Value(value) => return Ok(Hit::Mem(value)),
                Lookup::Tombstone => return Ok(Hit::Tombstone),
                Lookup::Miss => {}
            }
        }

        for path in &self.l0 {
            let mut reader = SstReader::open(path)?;
            match reader.get_in(key, sink)? {
                Lookup::Value(value) => return Ok(Hit::Sst(value)),
                Lookup::Tombstone => return Ok(Hit::Tombstone),
                Lookup::Miss => {}
            }
        }

        Ok(Hit::Miss)
    }
}
