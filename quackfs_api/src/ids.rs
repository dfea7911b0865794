//! Newtype identifiers for the four catalog tables.
//!
//! Kept as distinct types (rather than bare `u64`) so that, e.g., a
//! `LayerId` can never be passed where a `FileId` is expected — the same
//! discipline the teacher applies with `TimelineId`/`TenantShardId`.

use std::fmt;

macro_rules! u64_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

u64_id!(FileId);
u64_id!(VersionId);
u64_id!(LayerId);
u64_id!(ChunkId);
