//! # Engine — the EbbKV database facade
//!
//! Ties the `arena`, `memtable`, and `sstable` crates into a single-node,
//! single-threaded LSM store.
//!
//! ```text
//! put / delete ──► active memtable ──(threshold)──► flush
//!                                                     │
//!                                                     ▼
//!                                            NNNNNN.sst (L0, newest first)
//!
//! get ──► active memtable ─► immutable memtable ─► L0 newest → oldest
//!              (first definitive answer wins; tombstones count)
//! ```
//!
//! ## Write path
//!
//! Mutations land in the active memtable; once its approximate footprint
//! reaches the flush threshold, the table is rotated into the immutable slot
//! and synchronously serialized to a fresh SSTable whose path is prepended
//! to the L0 list.
//!
//! ## Read path
//!
//! One resolver consults the layers newest-first and stops at the first
//! value or tombstone. Tombstones anywhere translate to a plain miss
//! (`Ok(None)`) at this boundary — they never escape to callers.
//!
//! ## Durability
//!
//! There is no write-ahead log: a flush that fails loses that memtable's
//! data and the engine keeps running with a fresh one. Dropping the `Db`
//! makes a best-effort flush of whatever is still buffered.

mod read;
mod write;

use std::fmt;
use std::path::{Path, PathBuf};

use memtable::Memtable;

pub use arena::Arena;
pub use memtable::{Lookup, StoreError, ValueKind};

/// An open EbbKV database: one data directory, two memtable slots, and the
/// list of L0 SSTables produced by flushes.
pub struct Db {
    dir: PathBuf,
    /// Memtable byte-size threshold that triggers a flush.
    flush_threshold: usize,
    /// Id used for the next SSTable file name; starts at 1 and is bumped
    /// past any ids already present in the directory.
    next_file_id: u64,
    active: Memtable,
    /// Holds the memtable being flushed. In this synchronous design it is
    /// only occupied for the duration of a `flush` call.
    immutable: Option<Memtable>,
    /// SSTable paths, newest first.
    l0: Vec<PathBuf>,
}

impl Db {
    /// Opens (or creates) a database under `dir`.
    ///
    /// The directory is created if absent; a path that exists but is not a
    /// directory is an I/O error. Existing `NNNNNN.sst` files are picked up
    /// newest-first and the file-id counter is set past the largest one, so
    /// a reopened database keeps reading its old tables and never reuses a
    /// file name. Anything else in the directory is ignored.
    pub fn open<P: AsRef<Path>>(dir: P, flush_threshold: usize) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() {
            if !dir.is_dir() {
                return Err(StoreError::Io(std::io::Error::other(format!(
                    "{} exists and is not a directory",
                    dir.display()
                ))));
            }
        } else {
            std::fs::create_dir_all(&dir)?;
        }

        let mut tables: Vec<(u64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if let Some(id) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_sstable_file_name)
            {
                tables.push((id, path));
            }
        }
        tables.sort_by(|a, b| b.0.cmp(&a.0));

        let next_file_id = tables.first().map_or(1, |(id, _)| id + 1);
        let l0: Vec<PathBuf> = tables.into_iter().map(|(_, path)| path).collect();

        log::info!(
            "opened database at {} ({} sstables, next file id {})",
            dir.display(),
            l0.len(),
            next_file_id
        );

        Ok(Db {
            dir,
            flush_threshold,
            next_file_id,
            active: Memtable::new(),
            immutable: None,
            l0,
        })
    }

    /// The directory this database lives in.
    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Adjusts the flush trigger. Useful for tests and runtime tuning.
    pub fn set_flush_threshold(&mut self, threshold: usize) {
        self.flush_threshold = threshold;
    }

    /// Number of L0 SSTables currently visible to reads.
    pub fn l0_sstable_count(&self) -> usize {
        self.l0.len()
    }

    pub(crate) fn sstable_file_name(id: u64) -> String {
        format!("{id:06}.sst")
    }
}

/// Parses `NNNNNN.sst` (zero-padded decimal) into its id; anything else is
/// not an SSTable of ours.
fn parse_sstable_file_name(name: &str) -> Option<u64> {
    let id = name.strip_suffix(".sst")?;
    if id.len() != 6 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("dir", &self.dir)
            .field("flush_threshold", &self.flush_threshold)
            .field("next_file_id", &self.next_file_id)
            .field("memtable_entries", &self.active.len())
            .field("memtable_bytes", &self.active.approximate_bytes_used())
            .field("flush_in_progress", &self.immutable.is_some())
            .field("l0_sstable_count", &self.l0.len())
            .finish()
    }
}

/// Best-effort flush on drop.
///
/// Without a WAL, whatever sits in the active memtable would be lost;
/// flushing here saves it when possible. Errors are ignored — `Drop` cannot
/// propagate them.
impl Drop for Db {
    fn drop(&mut self) {
        if !self.active.is_empty() {
            let _ = self.flush();
        }
    }
}

#[cfg(test)]
mod tests;
