//! Local filesystem backend: objects live under a path prefix on disk.
//! `url`/`key` are relative paths within that prefix — this backend never
//! escapes it (no `..` traversal).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{ArtifactError, ArtifactStore};

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        let joined = self.root.join(key.trim_start_matches('/'));
        let canon_root = self.root.clone();
        if !joined.starts_with(&canon_root) {
            return Err(ArtifactError::NotFound(key.to_string()));
        }
        Ok(joined)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn fetch(
        &self,
        url: &str,
        expected_hash: &str,
        work_dir: &Path,
    ) -> Result<PathBuf, ArtifactError> {
        let src = self.resolve(url)?;
        tokio::fs::create_dir_all(work_dir).await?;
        let dest = work_dir.join(
            src.file_name()
                .ok_or_else(|| ArtifactError::NotFound(url.to_string()))?,
        );

        let mut reader = tokio::fs::File::open(&src)
            .await
            .map_err(|_| ArtifactError::NotFound(url.to_string()))?;
        let mut writer = tokio::fs::File::create(&dest).await?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            writer.write_all(&buf[..n]).await?;
        }
        writer.flush().await?;

        let digest = hex::encode(hasher.finalize());
        if !expected_hash.is_empty() && digest != expected_hash {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(ArtifactError::HashMismatch {
                expected: expected_hash.to_string(),
                actual: digest,
            });
        }

        Ok(dest)
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, ArtifactError> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, bytes).await?;
        Ok(key.to_string())
    }

    async fn open(&self, key: &str) -> Result<Vec<u8>, ArtifactError> {
        let src = self.resolve(key)?;
        tokio::fs::read(&src)
            .await
            .map_err(|_| ArtifactError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_verifies_hash_and_errors_on_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(tmp.path());
        let workdir = tmp.path().join("work");

        store.save("pkg.zip", b"hello world").await.unwrap();
        let good_hash = crate::sha256_hex(b"hello world");

        let path = store.fetch("pkg.zip", &good_hash, &workdir).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello world");

        let err = store.fetch("pkg.zip", "deadbeef", &workdir).await.unwrap_err();
        assert!(matches!(err, ArtifactError::HashMismatch { .. }));

        // partial file must not linger after a mismatch.
        assert!(!workdir.join("pkg.zip").exists());
    }

    #[tokio::test]
    async fn fetch_with_empty_hash_skips_verification() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(tmp.path());
        let workdir = tmp.path().join("work");
        store.save("pkg.zip", b"data").await.unwrap();
        let path = store.fetch("pkg.zip", "", &workdir).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn open_round_trips_saved_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(tmp.path());
        store.save("deployments/a/pkg.zip", b"payload").await.unwrap();
        let bytes = store.open("deployments/a/pkg.zip").await.unwrap();
        assert_eq!(bytes, b"payload");
    }
}
