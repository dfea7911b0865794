//! An in-process `ObjectStore` fake, used by unit/integration tests and
//! as a local-dev backend alongside [`super::super::catalog::memory`].

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use quackfs_api::{ByteRange, Error, Result};

use super::ObjectStore;

#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    fn get_range(&self, key: &str, range: ByteRange) -> Result<Bytes> {
        let blobs = self.blobs.lock().unwrap();
        let blob = blobs
            .get(key)
            .ok_or_else(|| Error::StorageCorruption(format!("missing object: {key}")))?;

        let start = range.start as usize;
        let end = (range.end as usize).min(blob.len());
        if start > blob.len() || start > end {
            return Err(Error::StorageCorruption(format!(
                "range {range} out of bounds for object {key} (len {})",
                blob.len()
            )));
        }
        Ok(blob.slice(start..end))
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_range_roundtrips() {
        let store = MemoryObjectStore::new();
        store.put("layers/f1/0-0", Bytes::from_static(b"hello world")).unwrap();
        let got = store.get_range("layers/f1/0-0", ByteRange::new(6, 11)).unwrap();
        assert_eq!(&got[..], b"world");
    }

    #[test]
    fn get_range_on_missing_key_is_storage_corruption() {
        let store = MemoryObjectStore::new();
        let err = store.get_range("nope", ByteRange::new(0, 1)).unwrap_err();
        assert!(matches!(err, Error::StorageCorruption(_)));
    }

    #[test]
    fn list_prefix_filters_by_prefix() {
        let store = MemoryObjectStore::new();
        store.put("layers/f1/0-0", Bytes::new()).unwrap();
        store.put("layers/f2/0-0", Bytes::new()).unwrap();
        let keys = store.list_prefix("layers/f1/").unwrap();
        assert_eq!(keys, vec!["layers/f1/0-0".to_string()]);
    }
}
