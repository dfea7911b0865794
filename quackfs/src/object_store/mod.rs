//! `ObjectStore`: the content-addressed blob contract from `spec.md`
//! §4.1/§6 that every checkpointed layer's bytes live behind.
//!
//! Like `MetaCatalog`, the trait surface is synchronous; the S3 backend
//! bridges to `aws-sdk-s3`'s async client with
//! `tokio::runtime::Handle::block_on`, the in-memory backend needs none.

pub mod memory;
pub mod s3;

use bytes::Bytes;
use quackfs_api::{ByteRange, Result};

pub trait ObjectStore: Send + Sync {
    /// Uploads `bytes` under `key` in full. Keys are immutable once
    /// written — every layer's blob is written exactly once, by the
    /// checkpoint engine, so there is no partial-overwrite case to
    /// handle.
    fn put(&self, key: &str, bytes: Bytes) -> Result<()>;

    /// Fetches `range` of the object at `key`. `range.end` may exceed the
    /// object's actual length only if `range.start` is within bounds;
    /// callers (the range resolver) only ever ask for sub-ranges of
    /// chunks they already know the extent of, so this is not a
    /// clamping API.
    fn get_range(&self, key: &str, range: ByteRange) -> Result<Bytes>;

    /// Lists every key under `prefix`. Used only by the sweeper's
    /// orphan-blob scan (`spec.md` §4.7 supplement); backends that don't
    /// expect to run the sweeper may still implement it honestly since
    /// it's a read-only, best-effort capability.
    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
