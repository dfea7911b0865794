//! Background orphan-blob scan, `SPEC_FULL.md` §4.7.
//!
//! Optional and best-effort: lists every object under `layers/`, diffs
//! it against the `object_key`s every catalog layer row currently
//! references, and logs (never deletes) what's left over. Deletion is
//! deliberately not implemented — a blob a concurrent checkpoint just
//! `put` but hasn't yet committed metadata for would look orphaned to a
//! sweep that ran in between, and `spec.md` only requires correctness of
//! live reads, not storage reclamation.
//!
//! Shaped like the teacher's `tenant` background-task loops:
//! `tokio::time::interval` ticks, a `CancellationToken` for shutdown, no
//! new concurrency primitives invented.

use std::sync::Arc;
use std::time::Duration;

use quackfs_api::object_key;
use tokio_util::sync::CancellationToken;

use crate::catalog::MetaCatalog;
use crate::metrics;
use crate::object_store::ObjectStore;

/// Spawns the sweep loop on `handle`, ticking every `interval` until
/// `cancel` fires. Returns the `JoinHandle` so `main` can await a clean
/// shutdown.
pub fn spawn(
    catalog: Arc<dyn MetaCatalog>,
    object_store: Arc<dyn ObjectStore>,
    interval: Duration,
    cancel: CancellationToken,
    handle: &tokio::runtime::Handle,
) -> tokio::task::JoinHandle<()> {
    handle.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("sweeper shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = sweep_once(catalog.as_ref(), object_store.as_ref()) {
                        tracing::warn!(error = %e, "sweep failed");
                    }
                }
            }
        }
    })
}

fn find_orphans(catalog: &dyn MetaCatalog, object_store: &dyn ObjectStore) -> anyhow::Result<Vec<String>> {
    let live: std::collections::HashSet<String> = catalog
        .list_files()?
        .into_iter()
        .map(|f| catalog.layers_for_file(f.file_id))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .map(|l| l.object_key)
        .collect();

    let all = object_store.list_prefix(object_key::LAYER_PREFIX)?;
    Ok(all.into_iter().filter(|k| !live.contains(k)).collect())
}

fn sweep_once(catalog: &dyn MetaCatalog, object_store: &dyn ObjectStore) -> anyhow::Result<()> {
    let orphans = find_orphans(catalog, object_store)?;

    metrics::set_orphan_blobs(orphans.len() as u64);
    if !orphans.is_empty() {
        tracing::info!(count = orphans.len(), "sweep found orphan blobs (not deleted)");
        for key in &orphans {
            tracing::debug!(key = %key, "orphan blob");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::object_store::memory::MemoryObjectStore;
    use bytes::Bytes;

    #[test]
    fn sweep_finds_blobs_unreferenced_by_any_layer() {
        let catalog = MemoryCatalog::new();
        let store = MemoryObjectStore::new();
        let file_id = catalog.insert_file("f1").unwrap();

        let mut txn = catalog.begin_rw().unwrap();
        let version_id = txn.insert_version("v1").unwrap();
        let key = object_key::derive("f1", file_id, version_id);
        txn.insert_layer(file_id, version_id, &key).unwrap();
        txn.commit().unwrap();
        store.put(&key, Bytes::from_static(b"live")).unwrap();
        store.put("layers/f1/orphan", Bytes::from_static(b"dead")).unwrap();

        let orphans = find_orphans(&catalog, &store).unwrap();
        assert_eq!(orphans, vec!["layers/f1/orphan".to_string()]);
    }
}
