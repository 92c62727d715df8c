//! Write path: `put`, `delete`, and the synchronous `flush`.

use std::mem;

use memtable::{Memtable, StoreError};
use sstable::{SstWriter, SstWriterOptions};

use crate::Db;

impl Db {
    /// Inserts or replaces a key. Flushes afterwards if the active memtable
    /// has reached the threshold.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key, `AllocationFailed` if the
    /// memtable arena cannot grow, `Io` if a triggered flush fails.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.active.put(key, value)?;
        self.maybe_flush()
    }

    /// Records a delete for `key`. The tombstone shadows any value for the
    /// same key in older layers, whether or not the key currently exists.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.active.delete(key)?;
        self.maybe_flush()
    }

    fn maybe_flush(&mut self) -> Result<(), StoreError> {
        if self.active.approximate_bytes_used() >= self.flush_threshold {
            self.flush()
        } else {
            Ok(())
        }
    }

    /// Rotates the active memtable out and serializes it to a new SSTable.
    ///
    /// The rotation happens even when the memtable is empty, so the caller
    /// always ends up with a fresh active table, but an empty table writes
    /// no file. On a write failure the rotated table is discarded (its data
    /// is lost; there is no WAL to replay) and the engine stays consistent
    /// with the fresh active memtable in place.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.immutable.is_some() {
            return Err(StoreError::Io(std::io::Error::other(
                "a flush is already in progress",
            )));
        }
        // Build the replacement first, then swap: no observable state is
        // touched until the new table exists.
        self.immutable = Some(mem::replace(&mut self.active, Memtable::new()));
        let result = self.write_immutable();
        self.immutable = None;
        result
    }

    fn write_immutable(&mut self) -> Result<(), StoreError> {
        let Some(immutable) = self.immutable.as_ref() else {
            return Ok(());
        };
        if immutable.is_empty() {
            log::debug!("flush of empty memtable, no sstable written");
            return Ok(());
        }

        let name = Db::sstable_file_name(self.next_file_id);
        let path = self.dir.join(name);
        let mut writer = SstWriter::new(SstWriterOptions::default())?;
        writer.write_memtable(&path, immutable)?;

        log::info!(
            "flushed memtable to {} ({} entries, ~{} bytes)",
            path.display(),
            immutable.len(),
            immutable.approximate_bytes_used()
        );
        self.l0.insert(0, path);
        self.next_file_id += 1;
        Ok(())
    }
}
