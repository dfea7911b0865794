//! `fuser::Filesystem` adaptor translating kernel VFS callbacks into
//! `Manager`/`WalStore` calls, `spec.md` §6 / `SPEC_FULL.md` §4.6a.
//!
//! Grounded on the retrieval pack's `AnvilFS` (a `fuser`-based virtual
//! filesystem over procedurally-served files): same inode-on-first-lookup
//! bookkeeping, same `TTL`/`FileAttr` construction, same pattern of a
//! flat root directory with no subdirectories. The routing logic itself
//! (which names go to the core vs. the WAL sidecar) is new, grounded
//! directly on `spec.md` §6's name-classification rules.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyWrite, Request,
};

use crate::manager::{Manager, ReadOptions};
use crate::wal_store::WalStore;

const TTL: Duration = Duration::from_secs(1);
const ROOT_INO: u64 = 1;

/// How `lookup`/`create` route a name, restated precisely from `spec.md`
/// §6 and `SPEC_FULL.md` §4.6a.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameKind {
    Data,
    Wal,
    Invalid,
}

fn classify(name: &str) -> NameKind {
    if name == "duckdb" || name.ends_with(".duckdb") {
        NameKind::Data
    } else if name == "duckdb.wal" || name.ends_with(".duckdb.wal") || name == "tmp" {
        // `tmp` is DuckDB's scratch probe before it knows the final
        // database file name; it is never a `.duckdb` payload and is
        // never versioned, so the WAL sidecar's plain local-file
        // semantics are its correct home.
        NameKind::Wal
    } else {
        NameKind::Invalid
    }
}

/// Assigns a stable inode to every name the adaptor has observed, kept
/// as two maps in sync rather than a bidirectional-map crate dependency
/// purely because the teacher's retrieved examples don't pull one in
/// either.
#[derive(Default)]
struct InodeTable {
    by_name: HashMap<String, u64>,
    by_ino: HashMap<u64, String>,
    next_ino: u64,
}

impl InodeTable {
    fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_ino: HashMap::new(),
            next_ino: 2,
        }
    }

    fn get_or_create(&mut self, name: &str) -> u64 {
        if let Some(ino) = self.by_name.get(name) {
            return *ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.by_name.insert(name.to_string(), ino);
        self.by_ino.insert(ino, name.to_string());
        ino
    }

    fn name_of(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(String::as_str)
    }
}

pub struct QuackFsFilesystem {
    manager: Arc<Manager>,
    wal_store: Arc<dyn WalStore>,
    inodes: Mutex<InodeTable>,
}

impl QuackFsFilesystem {
    pub fn new(manager: Arc<Manager>, wal_store: Arc<dyn WalStore>) -> Self {
        Self {
            manager,
            wal_store,
            inodes: Mutex::new(InodeTable::new()),
        }
    }

    fn root_attr() -> FileAttr {
        FileAttr {
            ino: ROOT_INO,
            size: 0,
            blocks: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: 512,
        }
    }

    /// `spec.md` §6: `getattr` size is `size_of(name)` for data files and
    /// the sidecar stat size for WAL files; mode `0644`, regular file.
    fn file_attr(&self, ino: u64, name: &str) -> Option<FileAttr> {
        let size = match classify(name) {
            NameKind::Data => self.manager.size_of(name).ok()?,
            NameKind::Wal => self.wal_store.stat_size(name).ok()?,
            NameKind::Invalid => return None,
        };
        Some(FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512).max(1),
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: FileType::RegularFile,
            perm: 0o644,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: 512,
        })
    }
}

impl Filesystem for QuackFsFilesystem {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };

        let exists = match classify(name) {
            NameKind::Data => self.manager.get_file_id(name).is_ok(),
            NameKind::Wal => self.wal_store.stat_size(name).is_ok(),
            NameKind::Invalid => false,
        };
        if !exists {
            reply.error(libc::ENOENT);
            return;
        }

        let ino = self.inodes.lock().unwrap().get_or_create(name);
        match self.file_attr(ino, name) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        if ino == ROOT_INO {
            reply.attr(&TTL, &Self::root_attr());
            return;
        }
        let name = self.inodes.lock().unwrap().name_of(ino).map(str::to_string);
        match name.and_then(|n| self.file_attr(ino, &n)) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        let result = match classify(name) {
            NameKind::Data => self.manager.insert_file(name).map(|_| ()),
            NameKind::Wal => self.wal_store.create(name),
            NameKind::Invalid => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        match result {
            Ok(()) => {
                let ino = self.inodes.lock().unwrap().get_or_create(name);
                match self.file_attr(ino, name) {
                    Some(attr) => reply.created(&TTL, &attr, 0, 0, 0),
                    None => reply.error(libc::EIO),
                }
            }
            Err(e) => reply.error(e.libc_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(name) = self.inodes.lock().unwrap().name_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let offset = offset.max(0) as u64;

        let result = match classify(&name) {
            NameKind::Data => self.manager.read_file(&name, offset, size as u64, ReadOptions::default()),
            NameKind::Wal => self.wal_store.read(&name, offset, size as u64),
            NameKind::Invalid => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match result {
            Ok(bytes) => reply.data(&bytes),
            Err(e) => reply.error(e.libc_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(name) = self.inodes.lock().unwrap().name_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let offset = offset.max(0) as u64;

        let result = match classify(&name) {
            NameKind::Data => self.manager.write_file(&name, data, offset),
            NameKind::Wal => self.wal_store.write(&name, offset, data),
            NameKind::Invalid => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match result {
            Ok(()) => reply.written(data.len() as u32),
            Err(e) => reply.error(e.libc_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };

        match classify(name) {
            // Deleting a WAL file is the out-of-band checkpoint signal;
            // `WalStore::remove` invokes `Manager::on_wal_remove` before
            // it unlinks, per spec.md §4.6.
            NameKind::Wal => match self.wal_store.remove(name) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.libc_errno()),
            },
            // Data files are never deleted by the core, per spec.md §3.
            NameKind::Data => reply.error(libc::ENOSYS),
            NameKind::Invalid => reply.error(libc::ENOENT),
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        if ino != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }

        let mut names: Vec<String> = Vec::new();
        if let Ok(files) = self.manager.list_files() {
            names.extend(files.into_iter().map(|f| f.name));
        }
        if let Ok(wal_names) = self.wal_store.list() {
            names.extend(wal_names);
        }

        let mut entries = vec![(ROOT_INO, FileType::Directory, ".".to_string())];
        entries.push((ROOT_INO, FileType::Directory, "..".to_string()));
        {
            let mut inodes = self.inodes.lock().unwrap();
            for name in names {
                let ino = inodes.get_or_create(&name);
                entries.push((ino, FileType::RegularFile, name));
            }
        }

        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_spec_name_rules() {
        assert_eq!(classify("foo.duckdb"), NameKind::Data);
        assert_eq!(classify("duckdb"), NameKind::Data);
        assert_eq!(classify("foo.duckdb.wal"), NameKind::Wal);
        assert_eq!(classify("duckdb.wal"), NameKind::Wal);
        assert_eq!(classify("tmp"), NameKind::Wal);
        assert_eq!(classify("notes.txt"), NameKind::Invalid);
    }

    #[test]
    fn inode_table_is_stable_and_bidirectional() {
        let mut table = InodeTable::new();
        let a = table.get_or_create("f1.duckdb");
        let b = table.get_or_create("f1.duckdb");
        assert_eq!(a, b);
        assert_eq!(table.name_of(a), Some("f1.duckdb"));
    }
}
