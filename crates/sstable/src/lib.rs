//! # SSTable — sorted, immutable on-disk tables
//!
//! When a memtable fills up, the engine serializes it into an SSTable:
//! a *write-once, read-many* file that is never modified after creation.
//!
//! ## File layout
//!
//! An SSTable is a bare concatenation of self-describing blocks — no footer,
//! no top-level index, no checksums:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ BLOCK 0                                                   │
//! │                                                           │
//! │ uncompressed_len (u32 LE)                                 │
//! │ on_disk_len      (u32 LE)  == uncompressed_len if raw     │
//! │ flag             (u8)      0x00 raw, 0x01 zstd            │
//! │ payload          (on_disk_len bytes)                      │
//! ├───────────────────────────────────────────────────────────┤
//! │ BLOCK 1 ...                                               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each decoded payload is a packed run of records, sorted by key:
//!
//! ```text
//! key_len (u32 LE) | key | kind (u8) | value_len (u32 LE) | value
//! ```
//!
//! Tombstones are records with kind `0x01` and a zero value length. A block
//! payload ends exactly at its uncompressed size; a trailing partial record
//! is corruption. An empty SSTable is a zero-byte file, though the writer
//! never produces one (an empty memtable writes nothing).
//!
//! The writer compresses each block with zstd and keeps the compressed
//! payload only when it is strictly smaller than the input, so
//! `on_disk_len <= uncompressed_len` always holds and incompressible data
//! costs nothing extra to read back.

mod format;
mod iterator;
mod reader;
mod writer;

pub use format::{BlockHeader, BLOCK_HEADER_BYTES, DEFAULT_BLOCK_BYTES, FLAG_UNCOMPRESSED, FLAG_ZSTD};
pub use iterator::SstIterator;
pub use reader::SstReader;
pub use writer::{SstWriter, SstWriterOptions};

#[cfg(test)]
mod tests;
