//! Single source of truth for the object-store key format (`spec.md` §6).

use crate::ids::{FileId, VersionId};

/// `layers/{filename}/{file_id}-{version_id}`
pub fn derive(filename: &str, file_id: FileId, version_id: VersionId) -> String {
    format!("layers/{filename}/{file_id}-{version_id}")
}

/// The `layers/` prefix the sweeper lists under.
pub const LAYER_PREFIX: &str = "layers/";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_expected_key() {
        let key = derive("f1.duckdb", FileId(7), VersionId(3));
        assert_eq!(key, "layers/f1.duckdb/7-3");
    }
}
