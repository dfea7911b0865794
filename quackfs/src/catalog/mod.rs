//! `MetaCatalog`: the transactional metadata store contract from
//! `spec.md` §4.1, plus its two concrete backends.
//!
//! The trait surface is synchronous, matching the blocking callback
//! model `fuser` drives `Manager` from (`SPEC_FULL.md` §5a); the
//! Postgres backend bridges to its async driver with
//! `tokio::runtime::Handle::block_on`, the in-memory backend needs no
//! bridging at all.

pub mod memory;
pub mod postgres;

use quackfs_api::{ByteRange, FileId, LayerId, Result, VersionId};

use crate::chunk::PersistedChunk;

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub file_id: FileId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LayerEntry {
    pub layer_id: LayerId,
    pub version_id: VersionId,
    pub object_key: String,
}

/// A snapshot-isolated read-only view, opened by `MetaCatalog::begin_ro`.
/// All reads inside a single `Manager::read_file` call go through one
/// `MetaReadTxn` so that a concurrent checkpoint cannot be observed
/// half-applied (`spec.md` §4.4 step 3, P5 in §8).
pub trait MetaReadTxn {
    fn find_chunks(
        &self,
        file_id: FileId,
        range: ByteRange,
        version: Option<&str>,
    ) -> Result<Vec<PersistedChunk>>;

    fn max_file_range_upper(&self, file_id: FileId) -> Result<u64>;

    /// Resolves `(file_id, tag)` to the layer it pins. `VersionNotFound`
    /// if the tag is absent.
    fn resolve_version(&self, file_id: FileId, tag: &str) -> Result<LayerId>;
}

/// A serializable read-write transaction, opened by
/// `MetaCatalog::begin_rw` and driven entirely by `checkpoint.rs`
/// (`spec.md` §4.3).
pub trait MetaWriteTxn {
    fn insert_version(&mut self, tag: &str) -> Result<VersionId>;

    fn insert_layer(
        &mut self,
        file_id: FileId,
        version_id: VersionId,
        object_key: &str,
    ) -> Result<LayerId>;

    fn insert_chunk(
        &mut self,
        layer_id: LayerId,
        layer_range: ByteRange,
        file_range: ByteRange,
    ) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

pub trait MetaCatalog: Send + Sync {
    fn get_file_id(&self, name: &str) -> Result<FileId>;

    /// Idempotent absent a uniqueness violation: fails `AlreadyExists` on
    /// a repeat name.
    fn insert_file(&self, name: &str) -> Result<FileId>;

    fn list_files(&self) -> Result<Vec<FileEntry>>;

    /// Ordered by `layer_id` ascending, i.e. creation order.
    fn layers_for_file(&self, file_id: FileId) -> Result<Vec<LayerEntry>>;

    fn begin_ro(&self) -> Result<Box<dyn MetaReadTxn + '_>>;

    fn begin_rw(&self) -> Result<Box<dyn MetaWriteTxn + '_>>;
}
