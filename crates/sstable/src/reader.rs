//! Point lookups over a single SSTable file, plus the block-loading
//! machinery the iterator shares.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use arena::Arena;
use memtable::{Lookup, StoreError, ValueKind};
use zstd::bulk::Decompressor;

use crate::format::{self, BLOCK_HEADER_BYTES, FLAG_UNCOMPRESSED, FLAG_ZSTD};
use crate::iterator::SstIterator;

/// Reads one SSTable file.
///
/// The reader owns its file handle, a zstd decompression context, and one
/// reusable buffer holding the most recently decoded block. Views into that
/// buffer are only valid until the next block load, which is why both getter
/// flavors copy the value out into a caller-owned sink before returning.
pub struct SstReader {
    /// Kept for error messages.
    path: PathBuf,
    file: File,
    file_size: u64,
    decompressor: Decompressor<'static>,
    /// Decoded bytes of the most recently loaded block.
    block: Vec<u8>,
    /// Raw on-disk payload scratch, reused across loads.
    scratch: Vec<u8>,
}

impl SstReader {
    /// Opens an SSTable and measures it. A zero-byte file opens fine and
    /// simply misses every lookup.
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be opened (including when it does not
    /// exist) or the zstd context cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        let decompressor = Decompressor::new()?;
        Ok(SstReader {
            path,
            file,
            file_size,
            decompressor,
            block: Vec::new(),
            scratch: Vec::new(),
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The decoded payload of the most recently loaded block.
    pub(crate) fn block(&self) -> &[u8] {
        &self.block
    }

    /// Loads and decodes the block at `offset` into the internal buffer.
    ///
    /// Returns the block's total on-disk size (header included) so callers
    /// can advance to the next one, or `Ok(None)` at clean end-of-file.
    /// A header or payload cut short by the end of the file is `Corruption`,
    /// as is any decompression mismatch; an unknown flag is `NotSupported`.
    pub(crate) fn load_block(&mut self, offset: u64) -> Result<Option<u64>, StoreError> {
        if offset >= self.file_size {
            self.block.clear();
            return Ok(None);
        }
        self.file.seek(SeekFrom::Start(offset))?;

        let mut header_buf = [0u8; BLOCK_HEADER_BYTES];
        if let Err(err) = self.file.read_exact(&mut header_buf) {
            return Err(if err.kind() == ErrorKind::UnexpectedEof {
                StoreError::Corruption(format!(
                    "{}: truncated block header at offset {offset}",
                    self.path.display()
                ))
            } else {
                StoreError::Io(err)
            });
        }
        let header = format::read_block_header(&header_buf);

        let total = BLOCK_HEADER_BYTES as u64 + u64::from(header.on_disk_len);
        if offset + total > self.file_size {
            return Err(StoreError::Corruption(format!(
                "{}: block at offset {offset} claims {} payload bytes past end of file",
                self.path.display(),
                header.on_disk_len
            )));
        }

        self.scratch.clear();
        self.scratch.resize(header.on_disk_len as usize, 0);
        if let Err(err) = self.file.read_exact(&mut self.scratch) {
            return Err(if err.kind() == ErrorKind::UnexpectedEof {
                StoreError::Corruption(format!(
                    "{}: truncated block payload at offset {offset}",
                    self.path.display()
                ))
            } else {
                StoreError::Io(err)
            });
        }

        self.block.clear();
        match header.flag {
            FLAG_UNCOMPRESSED => {
                if header.uncompressed_len != header.on_disk_len {
                    return Err(StoreError::Corruption(format!(
                        "{}: raw block sizes disagree ({} uncompressed vs {} on disk)",
                        self.path.display(),
                        header.uncompressed_len,
                        header.on_disk_len
                    )));
                }
                self.block.extend_from_slice(&self.scratch);
            }
            FLAG_ZSTD => {
                let uncompressed_len = header.uncompressed_len as usize;
                if uncompressed_len == 0 {
                    if header.on_disk_len > 0 {
                        return Err(StoreError::Corruption(format!(
                            "{}: zstd block inflates to nothing but carries payload",
                            self.path.display()
                        )));
                    }
                } else {
                    if header.on_disk_len == 0 {
                        return Err(StoreError::Corruption(format!(
                            "{}: zstd block promises {uncompressed_len} bytes from an empty payload",
                            self.path.display()
                        )));
                    }
                    self.block.reserve(uncompressed_len);
                    let written = self
                        .decompressor
                        .decompress_to_buffer(&self.scratch, &mut self.block)
                        .map_err(|err| {
                            StoreError::Corruption(format!(
                                "{}: zstd decompression failed: {err}",
                                self.path.display()
                            ))
                        })?;
                    if written != uncompressed_len {
                        return Err(StoreError::Corruption(format!(
                            "{}: decompressed {written} bytes, header promised {uncompressed_len}",
                            self.path.display()
                        )));
                    }
                }
            }
            flag => {
                return Err(StoreError::NotSupported(format!(
                    "unknown block compression flag {flag:#04x}"
                )));
            }
        }
        Ok(Some(total))
    }

    /// Scans blocks from the start of the file for `key`. Records are sorted,
    /// so the first key past the target ends the whole search as a miss.
    fn find(&mut self, key: &[u8]) -> Result<Option<(ValueKind, Range<usize>)>, StoreError> {
        let mut offset = 0u64;
        while let Some(total) = self.load_block(offset)? {
            let mut pos = 0usize;
            while let Some(record) = format::parse_record(&self.block, pos)? {
                match self.block[record.key.clone()].cmp(key) {
                    Ordering::Less => pos = record.end,
                    Ordering::Equal => return Ok(Some((record.kind, record.value))),
                    Ordering::Greater => return Ok(None),
                }
            }
            offset += total;
        }
        Ok(None)
    }

    /// Point lookup with the value copied into the caller's arena.
    ///
    /// `Lookup::Tombstone` means the key is authoritatively deleted in this
    /// table; `Lookup::Miss` means it is absent and older tables should be
    /// consulted.
    pub fn get_in<'a>(&mut self, key: &[u8], arena: &'a Arena) -> Result<Lookup<'a>, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("search key must not be empty"));
        }
        match self.find(key)? {
            None => Ok(Lookup::Miss),
            Some((ValueKind::Tombstone, _)) => Ok(Lookup::Tombstone),
            Some((ValueKind::Data, span)) => {
                let value = arena
                    .alloc_bytes(&self.block[span])
                    .ok_or(StoreError::AllocationFailed("sstable value copy"))?;
                Ok(Lookup::Value(value))
            }
        }
    }

    /// Point lookup with the value copied into a caller-owned buffer, which
    /// is cleared first and left empty unless live data is found.
    pub fn get_into(
        &mut self,
        key: &[u8],
        value_out: &mut Vec<u8>,
    ) -> Result<Option<ValueKind>, StoreError> {
        value_out.clear();
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("search key must not be empty"));
        }
        match self.find(key)? {
            None => Ok(None),
            Some((ValueKind::Tombstone, _)) => Ok(Some(ValueKind::Tombstone)),
            Some((ValueKind::Data, span)) => {
                value_out.extend_from_slice(&self.block[span]);
                Ok(Some(ValueKind::Data))
            }
        }
    }

    /// A forward cursor over the whole file. It borrows the reader mutably
    /// because the block buffer is shared state.
    pub fn iter(&mut self) -> SstIterator<'_> {
        SstIterator::new(self)
    }
}
