//! Local-filesystem-backed `WalStore`: one real file per WAL name under
//! a configured base directory. Grounded on `ephemeral_file.rs`'s local
//! file + page-cursor reads, simplified here since the WAL sidecar has
//! no chunk index to maintain — it's a single mutable file, not a
//! layered one.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::RwLock;

use bytes::Bytes;
use camino::Utf8PathBuf;
use once_cell::sync::OnceCell;
use quackfs_api::{Error, Result};

use super::WalStore;

type RemoveHook = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;

pub struct LocalFsWalStore {
    base_dir: Utf8PathBuf,
    // Guards every file handle operation below. Independent of
    // `Manager`'s lock; see `SPEC_FULL.md` §5 for the one designed
    // cross-lock edge (`on_wal_remove`, WAL lock outer, Manager lock inner).
    lock: RwLock<()>,
    on_remove: OnceCell<RemoveHook>,
}

impl LocalFsWalStore {
    pub fn new(base_dir: impl Into<Utf8PathBuf>) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            lock: RwLock::new(()),
            on_remove: OnceCell::new(),
        })
    }

    /// Wires the hook `Manager::on_wal_remove` is invoked through. Set
    /// once, after both `Manager` and its `WalStore` exist, breaking the
    /// otherwise-circular `Arc` construction order.
    pub fn set_remove_hook(&self, hook: impl Fn(&str) -> Result<()> + Send + Sync + 'static) {
        let _ = self.on_remove.set(Box::new(hook));
    }

    fn path_for(&self, name: &str) -> Utf8PathBuf {
        self.base_dir.join(name)
    }

    /// `foo.duckdb.wal` -> `foo.duckdb`, the paired data file name per
    /// `SPEC_FULL.md` §4.6a's suffix-strip rule. `None` for names (like
    /// the `tmp` scratch file) that have no paired data file.
    fn data_name_for(name: &str) -> Option<&str> {
        name.strip_suffix(".wal")
    }
}

impl WalStore for LocalFsWalStore {
    fn create(&self, name: &str) -> Result<()> {
        let _guard = self.lock.write().unwrap();
        let path = self.path_for(name);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => Error::FileAlreadyExists(name.to_string()),
                _ => Error::Transient(anyhow::Error::from(e)),
            })?;
        Ok(())
    }

    fn read(&self, name: &str, offset: u64, len: u64) -> Result<Bytes> {
        let _guard = self.lock.read().unwrap();
        let mut file = File::open(self.path_for(name))
            .map_err(|_| Error::FileNotFound(name.to_string()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| Error::Transient(anyhow::Error::from(e)))?;
        let mut buf = vec![0u8; len as usize];
        let n = read_up_to(&mut file, &mut buf)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    fn write(&self, name: &str, offset: u64, payload: &[u8]) -> Result<()> {
        let _guard = self.lock.write().unwrap();
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.path_for(name))
            .map_err(|_| Error::FileNotFound(name.to_string()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| Error::Transient(anyhow::Error::from(e)))?;
        file.write_all(payload)
            .map_err(|e| Error::Transient(anyhow::Error::from(e)))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let _guard = self.lock.write().unwrap();
        if let Some(data_name) = Self::data_name_for(name) {
            if let Some(hook) = self.on_remove.get() {
                hook(data_name)?;
            }
        }
        std::fs::remove_file(self.path_for(name))
            .map_err(|_| Error::FileNotFound(name.to_string()))?;
        Ok(())
    }

    fn stat_size(&self, name: &str) -> Result<u64> {
        let _guard = self.lock.read().unwrap();
        let meta = std::fs::metadata(self.path_for(name))
            .map_err(|_| Error::FileNotFound(name.to_string()))?;
        Ok(meta.len())
    }

    fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.read().unwrap();
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)
            .map_err(|e| Error::Transient(anyhow::Error::from(e)))?
        {
            let entry = entry.map_err(|e| Error::Transient(anyhow::Error::from(e)))?;
            if let Some(name) = entry.file_name().to_str() {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => return Err(Error::Transient(anyhow::Error::from(e))),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsWalStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()).unwrap();
        store.create("foo.duckdb.wal").unwrap();
        store.write("foo.duckdb.wal", 0, b"hello").unwrap();
        let got = store.read("foo.duckdb.wal", 0, 5).unwrap();
        assert_eq!(&got[..], b"hello");
        assert_eq!(store.stat_size("foo.duckdb.wal").unwrap(), 5);
    }

    #[test]
    fn create_twice_fails_with_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsWalStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()).unwrap();
        store.create("foo.duckdb.wal").unwrap();
        let err = store.create("foo.duckdb.wal").unwrap_err();
        assert!(matches!(err, Error::FileAlreadyExists(_)));
    }

    #[test]
    fn remove_invokes_hook_with_paired_data_name_before_unlinking() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsWalStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()).unwrap();
        store.create("foo.duckdb.wal").unwrap();

        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        store.set_remove_hook(move |data_name| {
            *seen2.lock().unwrap() = Some(data_name.to_string());
            Ok(())
        });

        store.remove("foo.duckdb.wal").unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("foo.duckdb"));
        assert!(store.stat_size("foo.duckdb.wal").is_err());
    }
}
