//! Artifact store (§4.2, C3): fetch/save/verify opaque byte blobs keyed by
//! `(package_url, package_hash)`.
//!
//! The core only depends on the three trait methods below; the backend
//! (local filesystem, object storage) is chosen at startup from a registry
//! keyed by URL scheme (§9).

pub mod error;
pub mod fs_store;
pub mod object_store;

pub use error::ArtifactError;

use std::path::PathBuf;

use async_trait::async_trait;

/// Fetch/save/verify contract every artifact backend implements.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download `url` into a file under `work_dir`, streaming the bytes and
    /// computing a SHA-256 digest as it writes. When `expected_hash` is
    /// non-empty and the computed digest differs, the partial file is
    /// unlinked and `ArtifactError::HashMismatch` is returned (P7).
    async fn fetch(
        &self,
        url: &str,
        expected_hash: &str,
        work_dir: &std::path::Path,
    ) -> Result<PathBuf, ArtifactError>;

    /// Upload `bytes` under `key`, returning the opaque `package_url` to
    /// record on the `Deployment` row.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, ArtifactError>;

    /// Read back the bytes stored at `key`.
    async fn open(&self, key: &str) -> Result<Vec<u8>, ArtifactError>;
}

/// SHA-256 hex digest of a byte slice — used both by `save` (to report the
/// hash of an upload) and by tests asserting P7.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
