//! `CheckpointEngine`: the atomic memtable → blob + metadata flush,
//! `spec.md` §4.3.
//!
//! Grounded on `inmemory_layer.rs::write_to_disk` (seal an in-memory
//! layer to a durable one) and the ordering discipline in
//! `compaction.rs`: object bytes are durable *before* the metadata row
//! that makes them reachable is committed, so a reader can never observe
//! a layer pointing at a blob that isn't there yet.

use bytes::Bytes;
use quackfs_api::{object_key, FileId, Result};

use crate::catalog::MetaCatalog;
use crate::memtable::Memtable;
use crate::object_store::ObjectStore;

/// Runs one checkpoint of `filename` (already resolved to `file_id`)
/// under `tag`. The caller (`Manager::checkpoint`) holds the write lock
/// for the entire call, matching `spec.md` §5's "the lock covers the
/// entire span of the operation including database transactions and
/// object-store I/O".
///
/// A no-op (no version row, no layer row) if the file has no active
/// memtable entry or that entry is empty — `spec.md` §4.3 step 3 and the
/// idempotence law in §8.
pub fn run(
    catalog: &dyn MetaCatalog,
    object_store: &dyn ObjectStore,
    memtable: &mut Memtable,
    filename: &str,
    file_id: FileId,
    tag: &str,
) -> Result<()> {
    let is_empty = match memtable.get(file_id) {
        Some(layer) => layer.data.is_empty(),
        None => true,
    };
    if is_empty {
        return Ok(());
    }

    let mut txn = catalog.begin_rw()?;

    let version_id = match txn.insert_version(tag) {
        Ok(id) => id,
        Err(e) => {
            txn.rollback()?;
            return Err(e);
        }
    };

    let object_key = object_key::derive(filename, file_id, version_id);

    // Must complete before the layer row exists: on failure the
    // transaction rolls back and the memtable keeps owning its bytes,
    // per spec.md §4.3 step 6.
    let layer = memtable.get(file_id).expect("checked non-empty above");
    if let Err(e) = object_store.put(&object_key, Bytes::copy_from_slice(&layer.data)) {
        txn.rollback()?;
        return Err(e);
    }

    let layer_id = match txn.insert_layer(file_id, version_id, &object_key) {
        Ok(id) => id,
        Err(e) => {
            txn.rollback()?;
            return Err(e);
        }
    };

    for chunk in &layer.chunks {
        if let Err(e) = txn.insert_chunk(layer_id, chunk.layer_range, chunk.file_range) {
            txn.rollback()?;
            return Err(e);
        }
    }

    txn.commit()?;
    memtable.take(file_id);

    tracing::info!(
        file = filename,
        tag,
        %layer_id,
        object_key,
        "checkpoint committed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::object_store::memory::MemoryObjectStore;
    use quackfs_api::ByteRange;

    #[test]
    fn checkpoint_on_empty_memtable_is_a_noop() {
        let catalog = MemoryCatalog::new();
        let store = MemoryObjectStore::new();
        let file_id = catalog.insert_file("f1").unwrap();
        let mut memtable = Memtable::new();

        run(&catalog, &store, &mut memtable, "f1", file_id, "v1").unwrap();

        let ro = catalog.begin_ro().unwrap();
        assert!(ro.resolve_version(file_id, "v1").is_err());
    }

    #[test]
    fn checkpoint_flushes_memtable_and_evicts_it() {
        let catalog = MemoryCatalog::new();
        let store = MemoryObjectStore::new();
        let file_id = catalog.insert_file("f1").unwrap();
        let mut memtable = Memtable::new();
        memtable.write(file_id, b"hello world", 0, 0);

        run(&catalog, &store, &mut memtable, "f1", file_id, "v1").unwrap();

        assert!(memtable.get(file_id).is_none());
        let ro = catalog.begin_ro().unwrap();
        let layer_id = ro.resolve_version(file_id, "v1").unwrap();
        let chunks = ro.find_chunks(file_id, ByteRange::new(0, 11), None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].layer_id, layer_id);

        let key = quackfs_api::object_key::derive("f1", file_id, quackfs_api::VersionId::new(0));
        let stored = store.get_range(&key, ByteRange::new(0, 11)).unwrap();
        assert_eq!(&stored[..], b"hello world");
    }

    #[test]
    fn duplicate_tag_rolls_back_and_preserves_the_memtable() {
        let catalog = MemoryCatalog::new();
        let store = MemoryObjectStore::new();
        let file_id = catalog.insert_file("f1").unwrap();
        let mut memtable = Memtable::new();
        memtable.write(file_id, b"hello world", 0, 0);
        run(&catalog, &store, &mut memtable, "f1", file_id, "v1").unwrap();

        memtable.write(file_id, b"more", 11, 11);
        let err = run(&catalog, &store, &mut memtable, "f1", file_id, "v1").unwrap_err();
        assert!(matches!(err, quackfs_api::Error::VersionAlreadyExists(_)));
        assert!(memtable.get(file_id).is_some());
    }
}
