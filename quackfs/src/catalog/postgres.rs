//! `tokio-postgres`-backed `MetaCatalog`.
//!
//! Schema realizes `spec.md` §6's logical tables with native `int8range`
//! columns so that the overlap predicate in `find_chunks` is a single
//! `&&` operator query instead of hand-rolled comparison logic. Because
//! `MetaCatalog`'s trait surface is synchronous (`SPEC_FULL.md` §5a),
//! every method here bridges to the async `tokio-postgres` driver with
//! `tokio::runtime::Handle::block_on`, the same blocking-callback
//! boundary `fuser` itself imposes on the whole adaptor.

use std::sync::Mutex;

use quackfs_api::{ByteRange, Error, FileId, LayerId, Result, VersionId};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};

use super::{FileEntry, LayerEntry, MetaCatalog, MetaReadTxn, MetaWriteTxn};
use crate::chunk::{ChunkSpan, PersistedChunk};

const DDL: &str = r#"
CREATE EXTENSION IF NOT EXISTS btree_gist;

CREATE TABLE IF NOT EXISTS files (
    id   BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS versions (
    id  BIGSERIAL PRIMARY KEY,
    tag TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS snapshot_layers (
    id         BIGSERIAL PRIMARY KEY,
    file_id    BIGINT NOT NULL REFERENCES files(id),
    version_id BIGINT NOT NULL REFERENCES versions(id),
    object_key TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS snapshot_layers_file_id_idx ON snapshot_layers (file_id);

CREATE TABLE IF NOT EXISTS chunks (
    id                BIGSERIAL PRIMARY KEY,
    snapshot_layer_id BIGINT NOT NULL REFERENCES snapshot_layers(id),
    layer_range       int8range NOT NULL,
    file_range        int8range NOT NULL
);

CREATE INDEX IF NOT EXISTS chunks_snapshot_layer_id_idx ON chunks (snapshot_layer_id);
CREATE INDEX IF NOT EXISTS chunks_file_range_gist_idx ON chunks USING gist (file_range);
"#;

pub struct PostgresCatalog {
    client: Mutex<Client>,
    handle: Handle,
}

impl PostgresCatalog {
    /// Connects to `dsn` using the given Tokio runtime handle and applies
    /// the DDL above (idempotently — `CREATE TABLE IF NOT EXISTS`).
    pub fn connect(dsn: &str, handle: Handle) -> anyhow::Result<Self> {
        let (client, connection) = handle
            .block_on(tokio_postgres::connect(dsn, NoTls))
            .map_err(anyhow::Error::from)?;

        // The connection object performs the actual network IO; it must
        // be driven on the runtime for the client to make progress, the
        // same pattern `tokio-postgres`'s own docs show.
        handle.spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection closed with error");
            }
        });

        handle
            .block_on(client.batch_execute(DDL))
            .map_err(anyhow::Error::from)?;

        Ok(Self {
            client: Mutex::new(client),
            handle,
        })
    }

    fn wire_range(r: ByteRange) -> String {
        format!("[{},{})", r.start, r.end)
    }
}

fn parse_int8range(s: &str) -> Result<ByteRange> {
    // Postgres renders a canonicalized `[lo,hi)` textual form for
    // int8range; anything else indicates on-disk corruption of a column
    // this code itself only ever writes in that form.
    let trimmed = s.trim_start_matches('[').trim_end_matches(')');
    let (lo, hi) = trimmed
        .split_once(',')
        .ok_or_else(|| Error::StorageCorruption(format!("malformed range column: {s}")))?;
    let lo: u64 = lo
        .parse()
        .map_err(|_| Error::StorageCorruption(format!("malformed range column: {s}")))?;
    let hi: u64 = hi
        .parse()
        .map_err(|_| Error::StorageCorruption(format!("malformed range column: {s}")))?;
    Ok(ByteRange::new(lo, hi))
}

impl MetaCatalog for PostgresCatalog {
    fn get_file_id(&self, name: &str) -> Result<FileId> {
        let client = self.client.lock().unwrap();
        let row = self
            .handle
            .block_on(client.query_opt("SELECT id FROM files WHERE name = $1", &[&name]))
            .map_err(|e| Error::Transient(e.into()))?;
        match row {
            Some(row) => Ok(FileId::new(row.get::<_, i64>(0) as u64)),
            None => Err(Error::FileNotFound(name.to_string())),
        }
    }

    fn insert_file(&self, name: &str) -> Result<FileId> {
        let client = self.client.lock().unwrap();
        let row = self
            .handle
            .block_on(client.query_one(
                "INSERT INTO files (name) VALUES ($1) ON CONFLICT DO NOTHING RETURNING id",
                &[&name],
            ))
            .map_err(|_| Error::FileAlreadyExists(name.to_string()))?;
        Ok(FileId::new(row.get::<_, i64>(0) as u64))
    }

    fn list_files(&self) -> Result<Vec<FileEntry>> {
        let client = self.client.lock().unwrap();
        let rows = self
            .handle
            .block_on(client.query("SELECT id, name FROM files ORDER BY id", &[]))
            .map_err(|e| Error::Transient(e.into()))?;
        Ok(rows
            .into_iter()
            .map(|r| FileEntry {
                file_id: FileId::new(r.get::<_, i64>(0) as u64),
                name: r.get(1),
            })
            .collect())
    }

    fn layers_for_file(&self, file_id: FileId) -> Result<Vec<LayerEntry>> {
        let client = self.client.lock().unwrap();
        let rows = self
            .handle
            .block_on(client.query(
                "SELECT id, version_id, object_key FROM snapshot_layers \
                 WHERE file_id = $1 ORDER BY id",
                &[&(file_id.get() as i64)],
            ))
            .map_err(|e| Error::Transient(e.into()))?;
        Ok(rows
            .into_iter()
            .map(|r| LayerEntry {
                layer_id: LayerId::new(r.get::<_, i64>(0) as u64),
                version_id: VersionId::new(r.get::<_, i64>(1) as u64),
                object_key: r.get(2),
            })
            .collect())
    }

    fn begin_ro(&self) -> Result<Box<dyn MetaReadTxn + '_>> {
        // `REPEATABLE READ READ ONLY` is Postgres' closest built-in
        // isolation level to the spec's "snapshot-isolation read-only"
        // requirement: every statement inside sees one fixed snapshot.
        let client = self.client.lock().unwrap();
        self.handle
            .block_on(
                client.batch_execute("BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY"),
            )
            .map_err(|e| Error::Transient(e.into()))?;
        drop(client);
        Ok(Box::new(PostgresReadTxn { catalog: self }))
    }

    fn begin_rw(&self) -> Result<Box<dyn MetaWriteTxn + '_>> {
        let client = self.client.lock().unwrap();
        self.handle
            .block_on(client.batch_execute("BEGIN ISOLATION LEVEL SERIALIZABLE"))
            .map_err(|e| Error::Transient(e.into()))?;
        drop(client);
        Ok(Box::new(PostgresWriteTxn {
            catalog: self,
            finished: false,
        }))
    }
}

/// Holds the catalog's single connection for the duration of a
/// read-only transaction. `PostgresCatalog` serializes all access
/// through `client: Mutex<Client>`, so only one transaction — read or
/// write — is in flight at a time; this is the simplification a
/// single-connection reference backend makes, documented in `DESIGN.md`,
/// not a requirement of `spec.md` itself (a production deployment would
/// pool connections).
struct PostgresReadTxn<'a> {
    catalog: &'a PostgresCatalog,
}

impl<'a> Drop for PostgresReadTxn<'a> {
    fn drop(&mut self) {
        let client = self.catalog.client.lock().unwrap();
        let _ = self.catalog.handle.block_on(client.batch_execute("COMMIT"));
    }
}

impl<'a> MetaReadTxn for PostgresReadTxn<'a> {
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

        let client = self.catalog.client.lock().unwrap();
        let wire_range = PostgresCatalog::wire_range(range);
        let rows = self
            .catalog
            .handle
            .block_on(client.query(
                "SELECT sl.id, c.layer_range, c.file_range, sl.object_key \
                 FROM chunks c JOIN snapshot_layers sl ON sl.id = c.snapshot_layer_id \
                 WHERE sl.file_id = $1 \
                   AND c.file_range && $2::int8range \
                   AND ($3::bigint IS NULL OR sl.id <= $3::bigint) \
                 ORDER BY sl.id ASC, c.id ASC",
                &[
                    &(file_id.get() as i64),
                    &wire_range,
                    &pinned_layer_id.map(|l| l.get() as i64),
                ],
            ))
            .map_err(|e| Error::Transient(e.into()))?;

        rows.into_iter()
            .map(|r| {
                let layer_id = LayerId::new(r.get::<_, i64>(0) as u64);
                let layer_range = parse_int8range(r.get::<_, &str>(1))?;
                let file_range = parse_int8range(r.get::<_, &str>(2))?;
                Ok(PersistedChunk {
                    layer_id,
                    span: ChunkSpan::new(layer_range, file_range),
                    object_key: r.get(3),
                })
            })
            .collect()
    }

    fn max_file_range_upper(&self, file_id: FileId) -> Result<u64> {
        let client = self.catalog.client.lock().unwrap();
        let row = self
            .catalog
            .handle
            .block_on(client.query_one(
                "SELECT COALESCE(MAX(upper(c.file_range)), 0) FROM chunks c \
                 JOIN snapshot_layers sl ON sl.id = c.snapshot_layer_id \
                 WHERE sl.file_id = $1",
                &[&(file_id.get() as i64)],
            ))
            .map_err(|e| Error::Transient(e.into()))?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    fn resolve_version(&self, file_id: FileId, tag: &str) -> Result<LayerId> {
        let client = self.catalog.client.lock().unwrap();
        let row = self
            .catalog
            .handle
            .block_on(client.query_opt(
                "SELECT sl.id FROM snapshot_layers sl JOIN versions v ON v.id = sl.version_id \
                 WHERE sl.file_id = $1 AND v.tag = $2",
                &[&(file_id.get() as i64), &tag],
            ))
            .map_err(|e| Error::Transient(e.into()))?;
        match row {
            Some(row) => Ok(LayerId::new(row.get::<_, i64>(0) as u64)),
            None => Err(Error::VersionNotFound(tag.to_string())),
        }
    }
}

struct PostgresWriteTxn<'a> {
    catalog: &'a PostgresCatalog,
    finished: bool,
}

impl<'a> MetaWriteTxn for PostgresWriteTxn<'a> {
    fn insert_version(&mut self, tag: &str) -> Result<VersionId> {
        let client = self.catalog.client.lock().unwrap();
        let row = self
            .catalog
            .handle
            .block_on(
                client.query_one("INSERT INTO versions (tag) VALUES ($1) RETURNING id", &[&tag]),
            )
            .map_err(|_| Error::VersionAlreadyExists(tag.to_string()))?;
        Ok(VersionId::new(row.get::<_, i64>(0) as u64))
    }

    fn insert_layer(
        &mut self,
        file_id: FileId,
        version_id: VersionId,
        object_key: &str,
    ) -> Result<LayerId> {
        let client = self.catalog.client.lock().unwrap();
        let row = self
            .catalog
            .handle
            .block_on(client.query_one(
                "INSERT INTO snapshot_layers (file_id, version_id, object_key) \
                 VALUES ($1, $2, $3) RETURNING id",
                &[
                    &(file_id.get() as i64),
                    &(version_id.get() as i64),
                    &object_key,
                ],
            ))
            .map_err(|e| Error::Transient(e.into()))?;
        Ok(LayerId::new(row.get::<_, i64>(0) as u64))
    }

    fn insert_chunk(
        &mut self,
        layer_id: LayerId,
        layer_range: ByteRange,
        file_range: ByteRange,
    ) -> Result<()> {
        let client = self.catalog.client.lock().unwrap();
        self.catalog
            .handle
            .block_on(client.execute(
                "INSERT INTO chunks (snapshot_layer_id, layer_range, file_range) \
                 VALUES ($1, $2::int8range, $3::int8range)",
                &[
                    &(layer_id.get() as i64),
                    &PostgresCatalog::wire_range(layer_range),
                    &PostgresCatalog::wire_range(file_range),
                ],
            ))
            .map_err(|e| Error::Transient(e.into()))?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let client = self.catalog.client.lock().unwrap();
        self.catalog
            .handle
            .block_on(client.batch_execute("COMMIT"))
            .map_err(|e| Error::Transient(e.into()))?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        let client = self.catalog.client.lock().unwrap();
        self.catalog
            .handle
            .block_on(client.batch_execute("ROLLBACK"))
            .map_err(|e| Error::Transient(e.into()))?;
        self.finished = true;
        Ok(())
    }
}

impl<'a> Drop for PostgresWriteTxn<'a> {
    fn drop(&mut self) {
        if !self.finished {
            let client = self.catalog.client.lock().unwrap();
            let _ = self
                .catalog
                .handle
                .block_on(client.batch_execute("ROLLBACK"));
        }
    }
}
