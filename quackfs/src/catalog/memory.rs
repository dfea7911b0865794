//! An in-process `MetaCatalog` fake: used by unit/integration tests and
//! as a zero-dependency local-dev backend. Implements the same overlap
//! and transaction semantics as [`super::postgres::PostgresCatalog`] so
//! that `spec.md` §8's scenarios run unmodified against either.

use std::collections::HashMap;
use std::sync::Mutex;

use quackfs_api::{ByteRange, Error, FileId, LayerId, Result, VersionId};

use super::{FileEntry, LayerEntry, MetaCatalog, MetaReadTxn, MetaWriteTxn};
use crate::chunk::{ChunkSpan, PersistedChunk};

#[derive(Debug, Clone)]
struct LayerRow {
    layer_id: LayerId,
    file_id: FileId,
    version_id: VersionId,
    object_key: String,
}

#[derive(Debug, Clone)]
struct ChunkRow {
    layer_id: LayerId,
    span: ChunkSpan,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    files: Vec<FileEntry>,
    next_file_id: u64,
    versions: HashMap<String, VersionId>,
    next_version_id: u64,
    // (file_id, tag) -> layer_id
    version_layers: HashMap<(FileId, String), LayerId>,
    layers: Vec<LayerRow>,
    next_layer_id: u64,
    chunks: Vec<ChunkRow>,
}

impl CatalogState {
    fn find_file(&self, name: &str) -> Option<FileId> {
        self.files.iter().find(|f| f.name == name).map(|f| f.file_id)
    }

    fn resolve_version(&self, file_id: FileId, tag: &str) -> Result<LayerId> {
        self.version_layers
            .get(&(file_id, tag.to_string()))
            .copied()
            .ok_or_else(|| Error::VersionNotFound(tag.to_string()))
    }

    fn find_chunks(
        &self,
        file_id: FileId,
        range: ByteRange,
        version: Option<&str>,
    ) -> Result<Vec<PersistedChunk>> {
        let pinned_layer_id = match version {
            Some(tag) => Some(self.resolve_version(file_id, tag)?),
            None => None,
        };

        let file_layer_ids: Vec<LayerId> = self
            .layers
            .iter()
            .filter(|l| l.file_id == file_id)
            .filter(|l| pinned_layer_id.map_or(true, |pinned| l.layer_id.get() <= pinned.get()))
            .map(|l| l.layer_id)
            .collect();

        let object_key_of = |layer_id: LayerId| -> &str {
            self.layers
                .iter()
                .find(|l| l.layer_id == layer_id)
                .map(|l| l.object_key.as_str())
                .unwrap_or_default()
        };

        let mut out: Vec<PersistedChunk> = self
            .chunks
            .iter()
            .filter(|c| file_layer_ids.contains(&c.layer_id))
            .filter(|c| c.span.file_range.overlaps(range))
            .map(|c| PersistedChunk {
                layer_id: c.layer_id,
                span: c.span,
                object_key: object_key_of(c.layer_id).to_string(),
            })
            .collect();

        // Primarily by layer_id ascending; `self.chunks` is already in
        // insertion order so a stable sort preserves the secondary key.
        out.sort_by_key(|c| c.layer_id.get());
        Ok(out)
    }

    fn max_file_range_upper(&self, file_id: FileId) -> u64 {
        let file_layer_ids: Vec<LayerId> = self
            .layers
            .iter()
            .filter(|l| l.file_id == file_id)
            .map(|l| l.layer_id)
            .collect();

        self.chunks
            .iter()
            .filter(|c| file_layer_ids.contains(&c.layer_id))
            .map(|c| c.span.file_range.end)
            .max()
            .unwrap_or(0)
    }
}

pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
        }
    }
}

impl MetaCatalog for MemoryCatalog {
    fn get_file_id(&self, name: &str) -> Result<FileId> {
        let state = self.state.lock().unwrap();
        state
            .find_file(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    fn insert_file(&self, name: &str) -> Result<FileId> {
        let mut state = self.state.lock().unwrap();
        if state.find_file(name).is_some() {
            return Err(Error::FileAlreadyExists(name.to_string()));
        }
        let file_id = FileId::new(state.next_file_id);
        state.next_file_id += 1;
        state.files.push(FileEntry {
            file_id,
            name: name.to_string(),
        });
        Ok(file_id)
    }

    fn list_files(&self) -> Result<Vec<FileEntry>> {
        Ok(self.state.lock().unwrap().files.clone())
    }

    fn layers_for_file(&self, file_id: FileId) -> Result<Vec<LayerEntry>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<LayerEntry> = state
            .layers
            .iter()
            .filter(|l| l.file_id == file_id)
            .map(|l| LayerEntry {
                layer_id: l.layer_id,
                version_id: l.version_id,
                object_key: l.object_key.clone(),
            })
            .collect();
        out.sort_by_key(|l| l.layer_id.get());
        Ok(out)
    }

    fn begin_ro(&self) -> Result<Box<dyn MetaReadTxn + '_>> {
        // Snapshot isolation, modeled by cloning the locked state once
        // and releasing the lock immediately: every subsequent read in
        // this transaction sees exactly this point in time, regardless
        // of concurrent writers.
        let snapshot = self.state.lock().unwrap().clone();
        Ok(Box::new(MemoryReadTxn { snapshot }))
    }

    fn begin_rw(&self) -> Result<Box<dyn MetaWriteTxn + '_>> {
        let guard = self.state.lock().unwrap();
        let scratch = guard.clone();
        Ok(Box::new(MemoryWriteTxn {
            guard,
            scratch,
        }))
    }
}

struct MemoryReadTxn {
    snapshot: CatalogState,
}

impl MetaReadTxn for MemoryReadTxn {
    fn find_chunks(
        &self,
        file_id: FileId,
        range: ByteRange,
        version: Option<&str>,
    ) -> Result<Vec<PersistedChunk>> {
        self.snapshot.find_chunks(file_id, range, version)
    }

    fn max_file_range_upper(&self, file_id: FileId) -> Result<u64> {
        Ok(self.snapshot.max_file_range_upper(file_id))
    }

    fn resolve_version(&self, file_id: FileId, tag: &str) -> Result<LayerId> {
        self.snapshot.resolve_version(file_id, tag)
    }
}

struct MemoryWriteTxn<'a> {
    guard: std::sync::MutexGuard<'a, CatalogState>,
    scratch: CatalogState,
}

impl<'a> MetaWriteTxn for MemoryWriteTxn<'a> {
    fn insert_version(&mut self, tag: &str) -> Result<VersionId> {
        if self.scratch.versions.contains_key(tag) {
            return Err(Error::VersionAlreadyExists(tag.to_string()));
        }
        let version_id = VersionId::new(self.scratch.next_version_id);
        self.scratch.next_version_id += 1;
        self.scratch.versions.insert(tag.to_string(), version_id);
        Ok(version_id)
    }

    fn insert_layer(
        &mut self,
        file_id: FileId,
        version_id: VersionId,
        object_key: &str,
    ) -> Result<LayerId> {
        let layer_id = LayerId::new(self.scratch.next_layer_id);
        self.scratch.next_layer_id += 1;
        self.scratch.layers.push(LayerRow {
            layer_id,
            file_id,
            version_id,
            object_key: object_key.to_string(),
        });
        // Record the (file_id, tag) -> layer_id mapping used by
        // `resolve_version`. The tag is looked up back out of `versions`
        // since `insert_version` only handed the caller a `VersionId`.
        if let Some((tag, _)) = self
            .scratch
            .versions
            .iter()
            .find(|(_, v)| **v == version_id)
        {
            self.scratch
                .version_layers
                .insert((file_id, (**tag).clone()), layer_id);
        }
        Ok(layer_id)
    }

    fn insert_chunk(
        &mut self,
        layer_id: LayerId,
        layer_range: ByteRange,
        file_range: ByteRange,
    ) -> Result<()> {
        self.scratch.chunks.push(ChunkRow {
            layer_id,
            span: ChunkSpan::new(layer_range, file_range),
        });
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        *self.guard = std::mem::take(&mut self.scratch);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        // Dropping `self.guard` without writing `scratch` back discards
        // every mutation made inside this transaction.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_file_is_idempotent_absent_uniqueness_violation() {
        let cat = MemoryCatalog::new();
        let id1 = cat.insert_file("f1").unwrap();
        let err = cat.insert_file("f1").unwrap_err();
        assert!(matches!(err, Error::FileAlreadyExists(_)));
        assert_eq!(cat.get_file_id("f1").unwrap(), id1);
    }

    #[test]
    fn checkpoint_transaction_commits_atomically() {
        let cat = MemoryCatalog::new();
        let file_id = cat.insert_file("f1").unwrap();

        let mut txn = cat.begin_rw().unwrap();
        let version_id = txn.insert_version("v1").unwrap();
        let layer_id = txn
            .insert_layer(file_id, version_id, "layers/f1/0-0")
            .unwrap();
        txn.insert_chunk(layer_id, ByteRange::new(0, 11), ByteRange::new(0, 11))
            .unwrap();
        txn.commit().unwrap();

        let ro = cat.begin_ro().unwrap();
        assert_eq!(ro.resolve_version(file_id, "v1").unwrap(), layer_id);
        let chunks = ro
            .find_chunks(file_id, ByteRange::new(0, 11), None)
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn rolled_back_transaction_is_invisible() {
        let cat = MemoryCatalog::new();
        let file_id = cat.insert_file("f1").unwrap();

        let mut txn = cat.begin_rw().unwrap();
        let version_id = txn.insert_version("v1").unwrap();
        txn.insert_layer(file_id, version_id, "layers/f1/0-0")
            .unwrap();
        txn.rollback().unwrap();

        let ro = cat.begin_ro().unwrap();
        assert!(ro.resolve_version(file_id, "v1").is_err());
    }
}
