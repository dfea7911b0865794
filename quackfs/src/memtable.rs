//! The in-memory active layer: an append buffer plus an ordered chunk
//! index, one per file with pending writes. Grounded on
//! `pageserver::tenant::storage_layer::inmemory_layer` — the append-only
//! `data` buffer plays the role of `EphemeralFile`, and `chunks` plays
//! the role of the `BTreeMap<CompactKey, VecMap<Lsn, u64>>` index, simplified
//! to the single-timeline, byte-range world `spec.md` describes rather
//! than the teacher's multi-key, multi-LSN one.

use std::collections::HashMap;

use quackfs_api::{ByteRange, FileId};

use crate::chunk::ChunkSpan;

/// Per-file active layer. `size` is always `data.len() as u64` and is
/// also the upper bound of the next chunk's `layer_range` — kept as a
/// field (rather than recomputed) because the write algorithm needs it
/// before the corresponding bytes are appended.
#[derive(Debug, Default)]
pub struct ActiveLayer {
    pub file_id: FileId,
    pub data: Vec<u8>,
    pub chunks: Vec<ChunkSpan>,
}

impl ActiveLayer {
    fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            data: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// `max(chunk.file_range[1])` across this layer's unflushed chunks,
    /// or 0 — the memtable's contribution to `size_of` (`spec.md` §4.5).
    pub fn max_file_range_upper(&self) -> u64 {
        self.chunks
            .iter()
            .map(|c| c.file_range.end)
            .max()
            .unwrap_or(0)
    }

    fn push_chunk(&mut self, layer_range: ByteRange, file_range: ByteRange) {
        debug_assert_eq!(layer_range.start, self.size());
        self.chunks.push(ChunkSpan::new(layer_range, file_range));
    }

    /// Implements `spec.md` §4.2's write algorithm steps 2–4, given the
    /// file's persisted virtual size `persisted_size` (`max_file_range_upper`
    /// over persisted chunks, computed by the caller under the catalog
    /// read-only transaction).
    pub fn write(&mut self, payload: &[u8], file_off: u64, persisted_size: u64) {
        let current_size = persisted_size.max(self.max_file_range_upper());

        if file_off > current_size {
            let gap = file_off - current_size;
            let zero_start = self.size();
            self.data.resize((zero_start + gap) as usize, 0);
            self.push_chunk(
                ByteRange::new(zero_start, zero_start + gap),
                ByteRange::new(current_size, file_off),
            );
        }

        let layer_start = self.size();
        self.data.extend_from_slice(payload);
        let layer_end = self.size();
        self.push_chunk(
            ByteRange::new(layer_start, layer_end),
            ByteRange::new(file_off, file_off + payload.len() as u64),
        );
    }
}

/// One entry per file that has received writes since its last checkpoint
/// (`spec.md` §4.2). Entries are created lazily on first write and
/// evicted by the checkpoint engine on successful commit.
#[derive(Debug, Default)]
pub struct Memtable {
    entries: HashMap<FileId, ActiveLayer>,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_id: FileId) -> Option<&ActiveLayer> {
        self.entries.get(&file_id)
    }

    pub fn max_file_range_upper(&self, file_id: FileId) -> u64 {
        self.entries
            .get(&file_id)
            .map(|l| l.max_file_range_upper())
            .unwrap_or(0)
    }

    /// Appends `payload` at `file_off`, creating the active layer lazily
    /// if this is the first write to `file_id` since its last checkpoint.
    pub fn write(&mut self, file_id: FileId, payload: &[u8], file_off: u64, persisted_size: u64) {
        let layer = self
            .entries
            .entry(file_id)
            .or_insert_with(|| ActiveLayer::new(file_id));
        layer.write(payload, file_off, persisted_size);
    }

    /// Removes and returns the active layer for `file_id`, if any —
    /// called by the checkpoint engine once its blob+metadata have
    /// committed.
    pub fn take(&mut self, file_id: FileId) -> Option<ActiveLayer> {
        self.entries.remove(&file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_write_zero_fills_the_gap() {
        let mut layer = ActiveLayer::new(FileId(1));
        layer.write(b"first", 0, 0);
        layer.write(b"second", 10, 0);

        assert_eq!(layer.data.len(), 16);
        assert_eq!(&layer.data[0..5], b"first");
        assert_eq!(&layer.data[5..10], &[0u8; 5]);
        assert_eq!(&layer.data[10..16], b"second");
        assert_eq!(layer.max_file_range_upper(), 16);
        assert_eq!(layer.chunks.len(), 3); // write, zero-fill, write
    }

    #[test]
    fn contiguous_writes_need_no_fill() {
        let mut layer = ActiveLayer::new(FileId(1));
        layer.write(b"hello world", 0, 0);
        assert_eq!(layer.chunks.len(), 1);
        assert_eq!(layer.size(), 11);
    }

    #[test]
    fn overlapping_write_appends_a_new_shadowing_chunk() {
        let mut layer = ActiveLayer::new(FileId(1));
        layer.write(b"initial data", 0, 0);
        layer.write(b"overwritten!", 0, 0);

        // Both writes are present in the layer's own buffer; only the
        // read path (range_resolver) decides which bytes win.
        assert_eq!(layer.chunks.len(), 2);
        assert_eq!(layer.data.len(), 24);
        assert_eq!(&layer.data[12..24], b"overwritten!");
    }
}
