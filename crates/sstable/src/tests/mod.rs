mod reader_tests;

use memtable::Memtable;

/// The five-color fixture: spills into exactly two blocks at a 40-byte
/// target (records are 13 + 16 + 18 bytes, then 15 + 16).
pub fn color_memtable() -> Memtable {
    let mut m = Memtable::new();
    m.put(b"b", b"yellow").unwrap();
    m.put(b"a", b"red").unwrap();
    m.put(b"c", b"dark_red").unwrap();
    m.put(b"d", b"brown").unwrap();
    m.put(b"e", b"purple").unwrap();
    m
}
