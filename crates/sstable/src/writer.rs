//! Serializes one memtable into a block-framed SSTable file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use memtable::{Memtable, StoreError};
use zstd::bulk::Compressor;

use crate::format::{self, BlockHeader, DEFAULT_BLOCK_BYTES, FLAG_UNCOMPRESSED, FLAG_ZSTD};

/// Writer configuration. The defaults match what the engine uses for flushes:
/// compression on, a light level, 4 KiB target blocks.
#[derive(Clone, Copy, Debug)]
pub struct SstWriterOptions {
    pub compression: bool,
    pub level: i32,
    /// Target uncompressed block size; `0` falls back to the default.
    pub block_bytes: usize,
}

impl Default for SstWriterOptions {
    fn default() -> Self {
        SstWriterOptions {
            compression: true,
            level: 1,
            block_bytes: DEFAULT_BLOCK_BYTES,
        }
    }
}

/// Streams the records of a memtable into framed blocks on disk.
///
/// The zstd context and both block buffers are reused across blocks (and
/// across files, if the writer is kept around).
pub struct SstWriter {
    compressor: Option<Compressor<'static>>,
    block_bytes: usize,
    /// Uncompressed records accumulating toward the next block.
    block: Vec<u8>,
    /// Compressed output scratch.
    scratch: Vec<u8>,
}

impl SstWriter {
    /// # Errors
    ///
    /// `Io` when compression is requested and the zstd context cannot be
    /// created.
    pub fn new(options: SstWriterOptions) -> Result<Self, StoreError> {
        let compressor = if options.compression {
            Some(Compressor::new(options.level)?)
        } else {
            None
        };
        let block_bytes = if options.block_bytes == 0 {
            DEFAULT_BLOCK_BYTES
        } else {
            options.block_bytes
        };
        Ok(SstWriter {
            compressor,
            block_bytes,
            block: Vec::new(),
            scratch: Vec::new(),
        })
    }

    /// Writes every entry of `memtable`, tombstones included, to a new file
    /// at `path`, in ascending key order.
    ///
    /// An empty memtable writes nothing and creates no file, so directory
    /// scans never see zero-byte tables. On an I/O error the partially
    /// written file is left behind for the caller to abandon.
    pub fn write_memtable(&mut self, path: &Path, memtable: &Memtable) -> Result<(), StoreError> {
        if memtable.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        self.block.clear();

        let mut cursor = memtable.iter();
        cursor.seek_to_first();
        while cursor.valid() {
            let entry = cursor.value();
            format::append_record(&mut self.block, cursor.key(), entry.kind, entry.bytes)?;
            cursor.next();
            // Flush on reaching the target size, and flush the remainder once
            // the cursor is exhausted.
            if self.block.len() >= self.block_bytes || !cursor.valid() {
                self.flush_block(&mut file)?;
            }
        }

        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn flush_block(&mut self, file: &mut File) -> Result<(), StoreError> {
        let uncompressed_len = self.block.len() as u32;
        let mut flag = FLAG_UNCOMPRESSED;
        let mut payload: &[u8] = &self.block;

        if let Some(compressor) = self.compressor.as_mut() {
            if !self.block.is_empty() {
                self.scratch.clear();
                self.scratch
                    .reserve(zstd::zstd_safe::compress_bound(self.block.len()));
                match compressor.compress_to_buffer(&self.block, &mut self.scratch) {
                    // Compressed output only pays off when strictly smaller;
                    // otherwise the raw bytes go out and the reader skips the
                    // decompressor entirely.
                    Ok(n) if n < self.block.len() => {
                        flag = FLAG_ZSTD;
                        payload = &self.scratch[..n];
                    }
                    Ok(_) => {}
                    Err(err) => {
                        log::warn!("zstd compression failed, storing block uncompressed: {err}");
                    }
                }
            }
        }

        format::write_block_header(
            file,
            BlockHeader {
                uncompressed_len,
                on_disk_len: payload.len() as u32,
                flag,
            },
        )?;
        file.write_all(payload)?;
        self.block.clear();
        Ok(())
    }
}
