use anyhow::Result;
use arena::Arena;
use byteorder::{LittleEndian, WriteBytesExt};
use memtable::{Lookup, Memtable, StoreError, ValueKind};
use tempfile::tempdir;

use super::color_memtable;
use crate::{SstReader, SstWriter, SstWriterOptions, FLAG_UNCOMPRESSED};

fn write_table(path: &std::path::Path, mem: &Memtable, options: SstWriterOptions) {
    SstWriter::new(options).unwrap().write_memtable(path, mem).unwrap();
}

/// Hand-builds one framed block around `payload`.
fn framed_block(uncompressed_len: u32, on_disk_len: u32, flag: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(uncompressed_len).unwrap();
    bytes.write_u32::<LittleEndian>(on_disk_len).unwrap();
    bytes.write_u8(flag).unwrap();
    bytes.extend_from_slice(payload);
    bytes
}

/// One well-formed record as raw bytes.
fn raw_record(key: &[u8], kind: u8, value: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(key.len() as u32).unwrap();
    bytes.extend_from_slice(key);
    bytes.write_u8(kind).unwrap();
    bytes.write_u32::<LittleEndian>(value.len() as u32).unwrap();
    bytes.extend_from_slice(value);
    bytes
}

// -------------------- Open --------------------

#[test]
fn open_nonexistent_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let result = SstReader::open(dir.path().join("missing.sst"));
    assert!(matches!(result, Err(StoreError::Io(_))));
}

#[test]
fn empty_file_opens_and_misses_everything() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("zero.sst");
    std::fs::write(&path, b"")?;

    let mut reader = SstReader::open(&path)?;
    assert_eq!(reader.file_size(), 0);

    let arena = Arena::new();
    assert_eq!(reader.get_in(b"anything", &arena)?, Lookup::Miss);

    let mut out = Vec::new();
    assert_eq!(reader.get_into(b"anything", &mut out)?, None);
    assert!(out.is_empty());
    Ok(())
}

// -------------------- Lookups --------------------

#[test]
fn get_finds_values_across_blocks() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("colors.sst");
    write_table(
        &path,
        &color_memtable(),
        SstWriterOptions {
            compression: false,
            level: 0,
            block_bytes: 40,
        },
    );

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();

    // First block.
    assert_eq!(reader.get_in(b"a", &arena)?, Lookup::Value(b"red".as_slice()));
    // Second block.
    assert_eq!(reader.get_in(b"e", &arena)?, Lookup::Value(b"purple".as_slice()));
    // Between existing keys and past the end.
    assert_eq!(reader.get_in(b"bb", &arena)?, Lookup::Miss);
    assert_eq!(reader.get_in(b"zz", &arena)?, Lookup::Miss);
    Ok(())
}

#[test]
fn get_reports_tombstones_distinctly_from_misses() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tomb.sst");

    let mut mem = Memtable::new();
    mem.put(b"alive", b"v").unwrap();
    mem.delete(b"dead").unwrap();
    write_table(&path, &mem, SstWriterOptions::default());

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert_eq!(reader.get_in(b"dead", &arena)?, Lookup::Tombstone);
    assert_eq!(reader.get_in(b"gone", &arena)?, Lookup::Miss);

    let mut out = b"stale".to_vec();
    assert_eq!(reader.get_into(b"dead", &mut out)?, Some(ValueKind::Tombstone));
    assert!(out.is_empty(), "output buffer must be cleared on non-data outcomes");
    Ok(())
}

#[test]
fn get_into_copies_the_value_out() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("copy.sst");
    write_table(&path, &color_memtable(), SstWriterOptions::default());

    let mut reader = SstReader::open(&path)?;
    let mut out = Vec::new();
    assert_eq!(reader.get_into(b"c", &mut out)?, Some(ValueKind::Data));
    assert_eq!(out, b"dark_red");
    Ok(())
}

#[test]
fn arena_values_outlive_the_reader() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("outlive.sst");
    write_table(&path, &color_memtable(), SstWriterOptions::default());

    let arena = Arena::new();
    let value = {
        let mut reader = SstReader::open(&path)?;
        match reader.get_in(b"b", &arena)? {
            Lookup::Value(v) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    };
    // The reader (and its block buffer) are gone; the copy in the caller's
    // arena must still be intact.
    assert_eq!(value, b"yellow");
    Ok(())
}

#[test]
fn empty_search_key_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("reject.sst");
    write_table(&path, &color_memtable(), SstWriterOptions::default());

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"", &arena),
        Err(StoreError::InvalidArgument(_))
    ));
    let mut out = Vec::new();
    assert!(matches!(
        reader.get_into(b"", &mut out),
        Err(StoreError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
fn compressed_tables_read_back_identically() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("roundtrip.sst");

    let mut mem = Memtable::new();
    for i in 0..200u32 {
        mem.put(
            format!("key{i:04}").as_bytes(),
            format!("value-{i}-{}", "x".repeat(40)).as_bytes(),
        )
        .unwrap();
    }
    write_table(
        &path,
        &mem,
        SstWriterOptions {
            compression: true,
            level: 1,
            block_bytes: 512,
        },
    );

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    for i in [0u32, 7, 99, 199] {
        let key = format!("key{i:04}");
        let expect = format!("value-{i}-{}", "x".repeat(40));
        assert_eq!(
            reader.get_in(key.as_bytes(), &arena)?,
            Lookup::Value(expect.as_bytes())
        );
    }
    assert_eq!(reader.get_in(b"key9999", &arena)?, Lookup::Miss);
    Ok(())
}

// -------------------- Corrupt and unsupported files --------------------

#[test]
fn truncated_header_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("shortheader.sst");
    std::fs::write(&path, &[0x01, 0x02, 0x03])?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"k", &arena),
        Err(StoreError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn payload_past_end_of_file_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("shortpayload.sst");
    // Header promises 100 payload bytes; only 4 follow.
    std::fs::write(&path, framed_block(100, 100, FLAG_UNCOMPRESSED, &[0u8; 4]))?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"k", &arena),
        Err(StoreError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn raw_block_with_disagreeing_sizes_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sizelie.sst");
    let record = raw_record(b"k", ValueKind::Data.as_u8(), b"v");
    // Uncompressed length lies relative to the raw payload.
    std::fs::write(
        &path,
        framed_block(record.len() as u32 + 5, record.len() as u32, FLAG_UNCOMPRESSED, &record),
    )?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"k", &arena),
        Err(StoreError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn unknown_compression_flag_is_not_supported() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("badflag.sst");
    let record = raw_record(b"k", ValueKind::Data.as_u8(), b"v");
    std::fs::write(
        &path,
        framed_block(record.len() as u32, record.len() as u32, 0x07, &record),
    )?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"k", &arena),
        Err(StoreError::NotSupported(_))
    ));
    Ok(())
}

#[test]
fn garbage_zstd_payload_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("badzstd.sst");
    std::fs::write(&path, framed_block(64, 4, crate::FLAG_ZSTD, &[0xDE, 0xAD, 0xBE, 0xEF]))?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"k", &arena),
        Err(StoreError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn unknown_value_kind_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("badkind.sst");
    let record = raw_record(b"k", 0x9A, b"v");
    std::fs::write(
        &path,
        framed_block(record.len() as u32, record.len() as u32, FLAG_UNCOMPRESSED, &record),
    )?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"k", &arena),
        Err(StoreError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn trailing_partial_record_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("partial.sst");
    let mut payload = raw_record(b"a", ValueKind::Data.as_u8(), b"v");
    // Chop a second record short after its key length field.
    payload.write_u32::<LittleEndian>(3).unwrap();
    payload.extend_from_slice(b"zz"); // 2 of the promised 3 key bytes
    let len = payload.len() as u32;
    std::fs::write(&path, framed_block(len, len, FLAG_UNCOMPRESSED, &payload))?;

    let mut reader = SstReader::open(&path)?;
    let arena = Arena::new();
    assert!(matches!(
        reader.get_in(b"zzz", &arena),
        Err(StoreError::Corruption(_))
    ));
    Ok(())
}
