//! End-to-end scenarios against the in-memory fakes, run through the
//! public `Manager` facade exactly as `fuse_adaptor` drives it.
//!
//! Most of these are already exercised as unit tests colocated with
//! `Manager` itself; this file exists because the scenarios describe
//! externally observable behavior of the whole engine, and S5 in
//! particular needs more than one checkpoint layer plus a live memtable
//! in play at once to actually exercise the merge path in
//! `range_resolver`.

use quackfs::catalog::memory::MemoryCatalog;
use quackfs::object_store::memory::MemoryObjectStore;
use quackfs::{Manager, ReadOptions};

fn manager() -> Manager {
    Manager::new(
        Box::new(MemoryCatalog::new()),
        Box::new(MemoryObjectStore::new()),
    )
}

// S1: a fresh file reads back exactly what was written.
#[test]
fn s1_basic_write_then_read() {
    let m = manager();
    m.insert_file("f.duckdb").unwrap();
    m.write_file("f.duckdb", b"hello world", 0).unwrap();
    let out = m.read_file("f.duckdb", 0, 11, ReadOptions::default()).unwrap();
    assert_eq!(&out, b"hello world");
}

// S2: a version tag pins the reader to the state as of that checkpoint,
// even as later writes land in the memtable.
#[test]
fn s2_checkpoint_pins_a_readable_version() {
    let m = manager();
    m.insert_file("f.duckdb").unwrap();
    m.write_file("f.duckdb", b"hello world", 0).unwrap();
    m.checkpoint("f.duckdb", "v1").unwrap();
    m.write_file("f.duckdb", b" more", 11).unwrap();

    let pinned = m
        .read_file("f.duckdb", 0, 16, ReadOptions { version: Some("v1") })
        .unwrap();
    assert_eq!(&pinned, b"hello world");

    let latest = m.read_file("f.duckdb", 0, 16, ReadOptions::default()).unwrap();
    assert_eq!(&latest, b"hello world more");
}

// S3: writes past EOF zero-fill the gap.
#[test]
fn s3_sparse_write_zero_fills_the_gap() {
    let m = manager();
    m.insert_file("f.duckdb").unwrap();
    m.write_file("f.duckdb", b"abc", 0).unwrap();
    m.write_file("f.duckdb", b"xyz", 10).unwrap();
    let out = m.read_file("f.duckdb", 0, 13, ReadOptions::default()).unwrap();
    assert_eq!(&out, b"abc\0\0\0\0\0\0\0xyz");
}

// S4: a write that overlaps an earlier one wins on the overlapping bytes.
#[test]
fn s4_overlapping_write_wins_on_the_overlap() {
    let m = manager();
    m.insert_file("f.duckdb").unwrap();
    m.write_file("f.duckdb", b"AAAAAAAAAA", 0).unwrap();
    m.write_file("f.duckdb", b"BBB", 4).unwrap();
    let out = m.read_file("f.duckdb", 0, 10, ReadOptions::default()).unwrap();
    assert_eq!(&out, b"AAAABBBAAA");
}

// S5: a read spanning several persisted chunks plus the live memtable
// reassembles every contributing span in the right place, including one
// that was itself partially overwritten after its own checkpoint.
#[test]
fn s5_nested_and_overlapping_multi_chunk_read() {
    let m = manager();
    m.insert_file("f.duckdb").unwrap();

    // Base layer: 4096 bytes of 'a', checkpointed.
    m.write_file("f.duckdb", &[b'a'; 4096], 0).unwrap();
    m.checkpoint("f.duckdb", "base").unwrap();

    // A second persisted layer: 3000 bytes of '%' starting at 3000,
    // checkpointed on its own.
    m.write_file("f.duckdb", &[b'%'; 3000], 3000).unwrap();
    m.checkpoint("f.duckdb", "mid").unwrap();

    // Still-pending writes in the memtable: 1024 bytes of '@' at 1024,
    // then 2000 bytes of '-' at 2000, each partially shadowing what came
    // before it.
    m.write_file("f.duckdb", &[b'@'; 1024], 1024).unwrap();
    m.write_file("f.duckdb", &[b'-'; 2000], 2000).unwrap();

    let out = m.read_file("f.duckdb", 0, 6000, ReadOptions::default()).unwrap();

    let mut expected = Vec::with_capacity(6000);
    expected.extend(std::iter::repeat(b'a').take(1024));
    expected.extend(std::iter::repeat(b'@').take(976));
    expected.extend(std::iter::repeat(b'-').take(2000));
    expected.extend(std::iter::repeat(b'%').take(2000));
    assert_eq!(out, expected);
}

// S6: checkpoints under distinct tags each stay independently readable.
#[test]
fn s6_version_isolation_across_three_tags() {
    let m = manager();
    m.insert_file("f.duckdb").unwrap();

    m.write_file("f.duckdb", &[b'1'; 10], 0).unwrap();
    m.checkpoint("f.duckdb", "v1").unwrap();

    m.write_file("f.duckdb", &[b'2'; 10], 0).unwrap();
    m.checkpoint("f.duckdb", "v2").unwrap();

    m.write_file("f.duckdb", &[b'3'; 10], 0).unwrap();
    m.checkpoint("f.duckdb", "v3").unwrap();

    for (tag, byte) in [("v1", b'1'), ("v2", b'2'), ("v3", b'3')] {
        let out = m
            .read_file("f.duckdb", 0, 10, ReadOptions { version: Some(tag) })
            .unwrap();
        assert_eq!(out, vec![byte; 10]);
    }
}

#[test]
fn reading_an_unknown_file_is_file_not_found() {
    let m = manager();
    let err = m.read_file("nope.duckdb", 0, 1, ReadOptions::default()).unwrap_err();
    assert!(matches!(err, quackfs_api::Error::FileNotFound(_)));
}
