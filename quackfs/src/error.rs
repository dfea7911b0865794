//! Re-exports the shared error taxonomy. Kept as its own module (rather
//! than inlined into `lib.rs`) so call sites read `crate::error::Result`
//! the way the teacher's crates read `crate::context::Result` etc.

pub use quackfs_api::error::{Error, Result};
