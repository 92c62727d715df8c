//! Forward iteration over the records of one SSTable.

use std::ops::Range;

use memtable::{StoreError, ValueKind, ValueRef};

use crate::format;
use crate::reader::SstReader;

struct CurrentRecord {
    key: Range<usize>,
    kind: ValueKind,
    value: Range<usize>,
}

/// A forward cursor over one SSTable, in on-disk (ascending key) order.
///
/// The current record is held as spans into the reader's decoded block
/// buffer, so `key()`/`value()` views are invalidated by the next
/// [`next`](SstIterator::next) or [`seek`](SstIterator::seek). Errors are
/// sticky: once corruption is hit, the cursor stays invalid and
/// [`status`](SstIterator::status) reports what happened.
pub struct SstIterator<'r> {
    reader: &'r mut SstReader,
    /// File offset of the currently loaded block.
    block_offset: u64,
    /// Header plus payload bytes of that block on disk.
    block_disk_len: u64,
    /// Parse offset of the next record within the decoded block.
    next_record: usize,
    current: Option<CurrentRecord>,
    error: Option<StoreError>,
}

impl<'r> SstIterator<'r> {
    pub(crate) fn new(reader: &'r mut SstReader) -> Self {
        SstIterator {
            reader,
            block_offset: 0,
            block_disk_len: 0,
            next_record: 0,
            current: None,
            error: None,
        }
    }

    /// Positions at the first record in the file; invalid if the file is
    /// empty. Clears any previous error.
    pub fn seek_to_first(&mut self) {
        self.error = None;
        self.load_block_at(0);
    }

    /// Positions at the first record whose key is `>= target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.seek_to_first();
        while self.valid() && self.key() < target {
            self.next();
        }
    }

    /// Advances one record, crossing into the next block when the current
    /// one is exhausted. A no-op when the cursor is already invalid.
    pub fn next(&mut self) {
        if !self.valid() {
            return;
        }
        self.parse_next_record();
        if self.current.is_none() && self.error.is_none() {
            // Clean end of block: continue with the one behind it.
            self.load_block_at(self.block_offset + self.block_disk_len);
        }
    }

    pub fn valid(&self) -> bool {
        self.current.is_some() && self.error.is_none()
    }

    /// Current key; empty when the cursor is invalid.
    pub fn key(&self) -> &[u8] {
        match &self.current {
            Some(current) => &self.reader.block()[current.key.clone()],
            None => &[],
        }
    }

    /// Current entry; an empty tombstone when the cursor is invalid.
    pub fn value(&self) -> ValueRef<'_> {
        match &self.current {
            Some(current) => ValueRef {
                kind: current.kind,
                bytes: &self.reader.block()[current.value.clone()],
            },
            None => ValueRef {
                kind: ValueKind::Tombstone,
                bytes: &[],
            },
        }
    }

    /// The first error this cursor ran into, if any.
    pub fn status(&self) -> Result<(), &StoreError> {
        match &self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Loads the block at `offset` and positions at its first record,
    /// skipping any empty decoded blocks. Invalid at end-of-file.
    fn load_block_at(&mut self, mut offset: u64) {
        self.current = None;
        loop {
            match self.reader.load_block(offset) {
                Err(err) => {
                    self.error = Some(err);
                    return;
                }
                Ok(None) => return,
                Ok(Some(disk_len)) => {
                    self.block_offset = offset;
                    self.block_disk_len = disk_len;
                    self.next_record = 0;
                    if self.reader.block().is_empty() {
                        // No records in here; a block always advances the
                        // offset by at least its header, so this terminates.
                        offset += disk_len;
                        continue;
                    }
                    self.parse_next_record();
                    return;
                }
            }
        }
    }

    fn parse_next_record(&mut self) {
        match format::parse_record(self.reader.block(), self.next_record) {
            Err(err) => {
                self.error = Some(err);
                self.current = None;
            }
            Ok(None) => self.current = None,
            Ok(Some(record)) => {
                self.next_record = record.end;
                self.current = Some(CurrentRecord {
                    key: record.key,
                    kind: record.kind,
                    value: record.value,
                });
            }
        }
    }
}
