//! The chunk types shared by the memtable, the catalog and the read path.
//!
//! `spec.md` §3 defines a persisted `Chunk` as
//! `{chunk_id, layer_id, layer_range, file_range}`. We split that into
//! two shapes: [`ChunkSpan`], the bare range pair every chunk carries
//! (used inside an active layer before it has a `chunk_id` or `layer_id`
//! at all), and [`PersistedChunk`], what `MetaCatalog::find_chunks`
//! returns once a chunk has been flushed and is addressable by
//! `object_key`.

use quackfs_api::{ByteRange, LayerId};

/// One contiguous slice of a write (or a synthesized zero-fill),
/// described purely by its two ranges. Invariant 1 of `spec.md` §3
/// (`layer_range.len() == file_range.len()`) is an invariant of how
/// `ChunkSpan`s are constructed, not something this type enforces itself
/// — callers build spans only through [`ChunkSpan::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub layer_range: ByteRange,
    pub file_range: ByteRange,
}

impl ChunkSpan {
    pub fn new(layer_range: ByteRange, file_range: ByteRange) -> Self {
        debug_assert_eq!(layer_range.len(), file_range.len());
        Self {
            layer_range,
            file_range,
        }
    }
}

/// A chunk as read back from the catalog: a [`ChunkSpan`] plus the
/// layer it belongs to and the object key that layer's bytes live under.
/// Ordered primarily by `layer_id` ascending and secondarily by
/// insertion order, per `MetaCatalog::find_chunks`'s contract.
#[derive(Debug, Clone)]
pub struct PersistedChunk {
    pub layer_id: LayerId,
    pub span: ChunkSpan,
    pub object_key: String,
}
