//! The five error kinds from `spec.md` §7, realized as a `thiserror` enum.
//!
//! Mirrors the split the teacher uses throughout: a narrow, typed enum for
//! outcomes callers actually branch on, with an opaque `Transient` variant
//! that carries an `anyhow::Error` for everything else (the same shape as
//! `WALError` in the `diamond-types` reference and `CompactionError` in
//! the teacher's own `compaction.rs`).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("version not found: {0}")]
    VersionNotFound(String),

    #[error("file already exists: {0}")]
    FileAlreadyExists(String),

    #[error("version already exists: {0}")]
    VersionAlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage corruption: {0}")]
    StorageCorruption(String),

    #[error("transient storage failure")]
    Transient(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps a core error onto the POSIX errno the FUSE adaptor should
    /// return for it. Kept here, rather than duplicated per FUSE
    /// callback, because the mapping is a property of the error kind, not
    /// of any particular VFS operation.
    pub fn libc_errno(&self) -> libc::c_int {
        match self {
            Error::FileNotFound(_) | Error::VersionNotFound(_) => libc::ENOENT,
            Error::FileAlreadyExists(_) | Error::VersionAlreadyExists(_) => libc::EEXIST,
            Error::InvalidArgument(_) => libc::EINVAL,
            Error::StorageCorruption(_) => libc::EIO,
            Error::Transient(_) => libc::EAGAIN,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Transient(e)
    }
}
