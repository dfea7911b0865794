//! `WalStore`: the contract for the `*.duckdb.wal` sidecar from
//! `spec.md` §5 — deliberately outside `MetaCatalog`/`ObjectStore`'s
//! versioned, checkpointed world. The WAL is mutable, unversioned,
//! truncated wholesale by DuckDB on checkpoint, and lives behind its own
//! lock so that WAL churn never contends with core file reads/writes.

pub mod local_fs;

use bytes::Bytes;
use quackfs_api::Result;

pub trait WalStore: Send + Sync {
    /// Creates an empty WAL file for `name`, or the ephemeral `tmp`
    /// scratch file (`SPEC_FULL.md` §4.6a). `FileAlreadyExists` if
    /// already present.
    fn create(&self, name: &str) -> Result<()>;

    fn read(&self, name: &str, offset: u64, len: u64) -> Result<Bytes>;

    /// Writes `payload` at `offset`, zero-filling any gap, mirroring the
    /// core write algorithm (`spec.md` §4.2) but against a single flat
    /// file instead of a layered memtable — there is nothing to version.
    fn write(&self, name: &str, offset: u64, payload: &[u8]) -> Result<()>;

    /// Removes the WAL file. Implementations must invoke
    /// `Manager::on_wal_remove` for the paired data file name *before*
    /// unlinking (`spec.md` §4.6), since a WAL removal is DuckDB's signal
    /// that it just replayed and checkpointed the WAL into the data file.
    fn remove(&self, name: &str) -> Result<()>;

    fn stat_size(&self, name: &str) -> Result<u64>;

    fn list(&self) -> Result<Vec<String>>;
}
