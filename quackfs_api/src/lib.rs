//! Shared, dependency-light types for QuackFS.
//!
//! Split out from the `quackfs` crate the same way `pageserver_api` is
//! split out from `pageserver`: these types cross the boundary between
//! the core storage engine and its backends (catalog, object store, WAL
//! sidecar) and have no business depending on `tokio-postgres` or
//! `aws-sdk-s3` themselves.

pub mod error;
pub mod ids;
pub mod object_key;
pub mod range;

pub use error::{Error, Result};
pub use ids::{ChunkId, FileId, LayerId, VersionId};
pub use range::ByteRange;
