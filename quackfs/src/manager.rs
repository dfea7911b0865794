//! `Manager`: the public facade, `spec.md` §2/§5. Owns the process-wide
//! read/write lock and orchestrates the catalog, object store and
//! memtable beneath it.
//!
//! Grounded on the `Timeline`/`Tenant` facade pattern: a thin struct
//! holding `Arc<dyn Trait>` collaborators plus one lock around mutable
//! state, with every public method opening a `tracing::info_span!` the
//! way `Timeline`'s methods do.

use std::sync::RwLock;

use quackfs_api::{ByteRange, FileId, Result};

use crate::catalog::{FileEntry, MetaCatalog};
use crate::checkpoint;
use crate::memtable::Memtable;
use crate::metrics;
use crate::object_store::ObjectStore;
use crate::range_resolver;

/// Per-call read options. Currently carries only the pinned version tag
/// (`spec.md` §4.4 step 2); kept as a struct rather than a bare
/// `Option<&str>` parameter so `fuse_adaptor` call sites read clearly and
/// the surface can grow (e.g. a future deadline) without breaking callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOptions<'a> {
    pub version: Option<&'a str>,
}

struct ManagerState {
    memtable: Memtable,
}

/// The public facade described in `spec.md` §2's component table and
/// exposed to the FUSE adaptor as the seven operations in §1: `insert_file`,
/// `read_file`, `write_file`, `size_of`, `checkpoint`, `list_files`,
/// `get_file_id`, plus the WAL-coupled `on_wal_remove` hook from §4.6.
pub struct Manager {
    catalog: Box<dyn MetaCatalog>,
    object_store: Box<dyn ObjectStore>,
    state: RwLock<ManagerState>,
}

impl Manager {
    pub fn new(catalog: Box<dyn MetaCatalog>, object_store: Box<dyn ObjectStore>) -> Self {
        Self {
            catalog,
            object_store,
            state: RwLock::new(ManagerState {
                memtable: Memtable::new(),
            }),
        }
    }

    pub fn get_file_id(&self, name: &str) -> Result<FileId> {
        let _guard = self.state.read().unwrap();
        self.catalog.get_file_id(name)
    }

    pub fn insert_file(&self, name: &str) -> Result<FileId> {
        let _span = tracing::info_span!("insert_file", file = name).entered();
        let _guard = self.state.write().unwrap();
        self.catalog.insert_file(name)
    }

    pub fn list_files(&self) -> Result<Vec<FileEntry>> {
        let _guard = self.state.read().unwrap();
        self.catalog.list_files()
    }

    pub fn size_of(&self, name: &str) -> Result<u64> {
        let guard = self.state.read().unwrap();
        let file_id = self.catalog.get_file_id(name)?;
        let persisted = self.catalog.begin_ro()?.max_file_range_upper(file_id)?;
        let in_memtable = guard.memtable.max_file_range_upper(file_id);
        Ok(persisted.max(in_memtable))
    }

    /// `spec.md` §4.2's write algorithm. Sparse writes past EOF are
    /// legal and zero-filled; overlapping writes shadow earlier bytes on
    /// read rather than failing.
    pub fn write_file(&self, name: &str, data: &[u8], file_off: u64) -> Result<()> {
        let _span = tracing::info_span!("write_file", file = name, file_off, len = data.len()).entered();
        let mut guard = self.state.write().unwrap();
        let file_id = self.catalog.get_file_id(name)?;
        let persisted_size = self.catalog.begin_ro()?.max_file_range_upper(file_id)?;
        guard.memtable.write(file_id, data, file_off, persisted_size);
        metrics::record_write(data.len() as u64);
        Ok(())
    }

    /// `spec.md` §4.4: resolves `[off, off+len)` against the catalog and
    /// (absent a pinned version) the memtable, merging last-writer-wins
    /// by `(layer_id, insertion order)`.
    pub fn read_file(&self, name: &str, off: u64, len: u64, opts: ReadOptions<'_>) -> Result<Vec<u8>> {
        let _span = tracing::info_span!("read_file", file = name, off, len, version = ?opts.version).entered();
        let guard = self.state.read().unwrap();
        let file_id = self.catalog.get_file_id(name)?;

        let ro = self.catalog.begin_ro()?;
        let range = ByteRange::new(off, off + len);
        let persisted = ro.find_chunks(file_id, range, opts.version)?;

        let memtable_layer = match opts.version {
            Some(_) => None,
            None => guard.memtable.get(file_id),
        };

        let out = range_resolver::resolve_read(off, len, &persisted, memtable_layer, self.object_store.as_ref())?;
        metrics::record_read(out.len() as u64);
        Ok(out)
    }

    /// `spec.md` §4.3. A no-op if the file has no pending writes.
    pub fn checkpoint(&self, name: &str, tag: &str) -> Result<()> {
        let _span = tracing::info_span!("checkpoint", file = name, tag).entered();
        let mut guard = self.state.write().unwrap();
        let file_id = self.catalog.get_file_id(name)?;
        let result = checkpoint::run(
            self.catalog.as_ref(),
            self.object_store.as_ref(),
            &mut guard.memtable,
            name,
            file_id,
            tag,
        );
        if result.is_ok() {
            metrics::record_checkpoint();
        }
        result
    }

    /// `spec.md` §4.6: invoked by the WAL sidecar before it deletes the
    /// bytes of `{data_filename}.wal`, with a freshly generated tag.
    /// If the checkpoint fails, the caller must not delete the WAL bytes.
    pub fn on_wal_remove(&self, data_filename: &str) -> Result<()> {
        let tag = uuid::Uuid::new_v4().to_string();
        self.checkpoint(data_filename, &tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::object_store::memory::MemoryObjectStore;

    fn manager() -> Manager {
        Manager::new(
            Box::new(MemoryCatalog::new()),
            Box::new(MemoryObjectStore::new()),
        )
    }

    // S1: basic write/read.
    #[test]
    fn basic_write_then_read() {
        let m = manager();
        m.insert_file("f1").unwrap();
        m.write_file("f1", b"hello world", 0).unwrap();
        let out = m.read_file("f1", 0, 11, ReadOptions::default()).unwrap();
        assert_eq!(&out, b"hello world");
        assert_eq!(m.size_of("f1").unwrap(), 11);
    }

    // S2: checkpoint then append, version pin sees the pre-checkpoint state.
    #[test]
    fn checkpoint_then_append_version_pin_isolated() {
        let m = manager();
        m.insert_file("f1").unwrap();
        m.write_file("f1", b"hello world", 0).unwrap();
        m.checkpoint("f1", "v1").unwrap();
        m.write_file("f1", b" more", 11).unwrap();

        let latest = m.read_file("f1", 0, 16, ReadOptions::default()).unwrap();
        assert_eq!(&latest, b"hello world more");

        let pinned = m
            .read_file("f1", 0, 16, ReadOptions { version: Some("v1") })
            .unwrap();
        assert_eq!(&pinned, b"hello world");
    }

    // S3: sparse write.
    #[test]
    fn sparse_write_zero_fills() {
        let m = manager();
        m.insert_file("f2").unwrap();
        m.write_file("f2", b"first", 0).unwrap();
        m.write_file("f2", b"second", 10).unwrap();
        let out = m.read_file("f2", 0, 16, ReadOptions::default()).unwrap();
        assert_eq!(&out, b"first\x00\x00\x00\x00\x00second");
        assert_eq!(m.size_of("f2").unwrap(), 16);
    }

    // S4: overlapping writes, last-writer-wins.
    #[test]
    fn overlapping_writes_last_writer_wins() {
        let m = manager();
        m.insert_file("f3").unwrap();
        m.write_file("f3", b"initial data", 0).unwrap();
        m.write_file("f3", b"overwritten!", 0).unwrap();
        let out = m.read_file("f3", 0, 12, ReadOptions::default()).unwrap();
        assert_eq!(&out, b"overwritten!");

        m.write_file("f3", b"partial", 5).unwrap();
        let out = m.read_file("f3", 0, 12, ReadOptions::default()).unwrap();
        assert_eq!(&out, b"overwpartial");
    }

    // S6: version isolation across multiple tags.
    #[test]
    fn version_isolation_across_multiple_tags() {
        let m = manager();
        m.insert_file("f4").unwrap();
        m.write_file("f4", &[b'*'; 15], 0).unwrap();
        m.checkpoint("f4", "v1").unwrap();
        m.write_file("f4", &[b'-'; 15], 0).unwrap();
        m.checkpoint("f4", "v2").unwrap();
        m.write_file("f4", &[b'@'; 15], 0).unwrap();

        let v1 = m
            .read_file("f4", 0, 15, ReadOptions { version: Some("v1") })
            .unwrap();
        assert_eq!(v1, vec![b'*'; 15]);
        let v2 = m
            .read_file("f4", 0, 15, ReadOptions { version: Some("v2") })
            .unwrap();
        assert_eq!(v2, vec![b'-'; 15]);
        let latest = m.read_file("f4", 0, 15, ReadOptions::default()).unwrap();
        assert_eq!(latest, vec![b'@'; 15]);

        let err = m
            .read_file("f4", 0, 15, ReadOptions { version: Some("bogus") })
            .unwrap_err();
        assert!(matches!(err, quackfs_api::Error::VersionNotFound(_)));
    }

    #[test]
    fn checkpoint_on_wal_remove_generates_a_fresh_tag() {
        let m = manager();
        m.insert_file("f1").unwrap();
        m.write_file("f1", b"hello world", 0).unwrap();
        m.on_wal_remove("f1").unwrap();
        // The memtable is now empty; a second on_wal_remove is a no-op,
        // not an AlreadyExists error, because each call mints its own tag.
        m.on_wal_remove("f1").unwrap();
    }

    #[test]
    fn insert_file_twice_fails_already_exists() {
        let m = manager();
        m.insert_file("f1").unwrap();
        let err = m.insert_file("f1").unwrap_err();
        assert!(matches!(err, quackfs_api::Error::FileAlreadyExists(_)));
    }
}
