//! Block framing and record encoding. All integers are little-endian.

use std::io::{self, Write};
use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memtable::{StoreError, ValueKind};

/// Size of the per-block header: two `u32` lengths plus the flag byte.
pub const BLOCK_HEADER_BYTES: usize = 9;

/// Payload stored verbatim.
pub const FLAG_UNCOMPRESSED: u8 = 0x00;
/// Payload is a zstd frame that inflates to exactly `uncompressed_len` bytes.
pub const FLAG_ZSTD: u8 = 0x01;

/// Default target size of an uncompressed block.
pub const DEFAULT_BLOCK_BYTES: usize = 4096;

/// The decoded 9-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub uncompressed_len: u32,
    pub on_disk_len: u32,
    pub flag: u8,
}

pub fn write_block_header<W: Write>(w: &mut W, header: BlockHeader) -> io::Result<()> {
    w.write_u32::<LittleEndian>(header.uncompressed_len)?;
    w.write_u32::<LittleEndian>(header.on_disk_len)?;
    w.write_u8(header.flag)?;
    Ok(())
}

pub fn read_block_header(buf: &[u8; BLOCK_HEADER_BYTES]) -> BlockHeader {
    BlockHeader {
        uncompressed_len: LittleEndian::read_u32(&buf[0..4]),
        on_disk_len: LittleEndian::read_u32(&buf[4..8]),
        flag: buf[8],
    }
}

/// Appends one record to an uncompressed block buffer.
pub(crate) fn append_record(
    buf: &mut Vec<u8>,
    key: &[u8],
    kind: ValueKind,
    value: &[u8],
) -> io::Result<()> {
    debug_assert!(!key.is_empty());
    debug_assert!(kind == ValueKind::Data || value.is_empty());
    buf.write_u32::<LittleEndian>(key.len() as u32)?;
    buf.extend_from_slice(key);
    buf.write_u8(kind.as_u8())?;
    buf.write_u32::<LittleEndian>(value.len() as u32)?;
    buf.extend_from_slice(value);
    Ok(())
}

/// A record parsed out of a decoded block, held as spans into that block so
/// callers can keep it across further parsing without borrowing the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Record {
    pub key: Range<usize>,
    pub kind: ValueKind,
    pub value: Range<usize>,
    /// Offset just past this record — where the next one starts.
    pub end: usize,
}

/// Parses the record starting at `offset` in a decoded block.
///
/// `Ok(None)` is the clean end of the block (`offset` exactly at its size);
/// any field that does not fit or decode is `Corruption`.
pub(crate) fn parse_record(block: &[u8], offset: usize) -> Result<Option<Record>, StoreError> {
    if offset == block.len() {
        return Ok(None);
    }

    let mut pos = offset;
    let key_len = read_u32_at(block, pos, "key length")? as usize;
    pos += 4;
    if key_len == 0 {
        return Err(StoreError::Corruption(format!(
            "record at offset {offset} has an empty key"
        )));
    }
    let key = take(block, pos, key_len, "key bytes")?;
    pos += key_len;

    let kind_byte = *block.get(pos).ok_or_else(|| {
        StoreError::Corruption(format!("record at offset {offset} ends before its kind byte"))
    })?;
    let kind = ValueKind::from_u8(kind_byte).ok_or_else(|| {
        StoreError::Corruption(format!("unknown value kind byte {kind_byte:#04x}"))
    })?;
    pos += 1;

    let value_len = read_u32_at(block, pos, "value length")? as usize;
    pos += 4;
    if kind == ValueKind::Tombstone && value_len != 0 {
        return Err(StoreError::Corruption(format!(
            "tombstone at offset {offset} carries {value_len} value bytes"
        )));
    }
    let value = take(block, pos, value_len, "value bytes")?;
    pos += value_len;

    Ok(Some(Record {
        key,
        kind,
        value,
        end: pos,
    }))
}

fn read_u32_at(block: &[u8], pos: usize, what: &str) -> Result<u32, StoreError> {
    match pos.checked_add(4) {
        Some(end) if end <= block.len() => Ok(LittleEndian::read_u32(&block[pos..end])),
        _ => Err(StoreError::Corruption(format!(
            "record {what} overruns the block at offset {pos}"
        ))),
    }
}

fn take(block: &[u8], pos: usize, len: usize, what: &str) -> Result<Range<usize>, StoreError> {
    match pos.checked_add(len) {
        Some(end) if end <= block.len() => Ok(pos..end),
        _ => Err(StoreError::Corruption(format!(
            "record {what} overruns the block at offset {pos}"
        ))),
    }
}
