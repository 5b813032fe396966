//! In-memory [`ArtifactStore`], so `bg-executor`/`bg-daemon` tests don't need
//! a real filesystem or object-storage endpoint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bg_artifacts::{sha256_hex, ArtifactError, ArtifactStore};

#[derive(Default)]
pub struct FakeArtifactStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `key` directly, bypassing `save` — used to set up a fetch-only
    /// scenario without going through an upload first.
    pub fn seed(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.lock().unwrap().insert(key.into(), bytes);
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifactStore {
    async fn fetch(
        &self,
        url: &str,
        expected_hash: &str,
        work_dir: &Path,
    ) -> Result<PathBuf, ArtifactError> {
        let bytes = self
            .blobs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(url.to_string()))?;

        if !expected_hash.is_empty() {
            let actual = sha256_hex(&bytes);
            if actual != expected_hash {
                return Err(ArtifactError::HashMismatch {
                    expected: expected_hash.to_string(),
                    actual,
                });
            }
        }

        std::fs::create_dir_all(work_dir)?;
        let dest = work_dir.join("package.bin");
        std::fs::write(&dest, &bytes)?;
        Ok(dest)
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, ArtifactError> {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes.to_vec());
        Ok(format!("fake://{key}"))
    }

    async fn open(&self, key: &str) -> Result<Vec<u8>, ArtifactError> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_open_round_trips() {
        let store = FakeArtifactStore::new();
        let url = store.save("deployments/a/pkg.zip", b"hello").await.unwrap();
        assert_eq!(url, "fake://deployments/a/pkg.zip");
        let back = store.open("deployments/a/pkg.zip").await.unwrap();
        assert_eq!(back, b"hello");
    }

    #[tokio::test]
    async fn fetch_rejects_hash_mismatch() {
        let store = FakeArtifactStore::new();
        store.seed("pkg", b"hello".to_vec());
        let dir = std::env::temp_dir().join(format!("bg-testkit-{}", uuid::Uuid::new_v4()));
        let err = store.fetch("pkg", "deadbeef", &dir).await.unwrap_err();
        assert!(matches!(err, ArtifactError::HashMismatch { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn fetch_unknown_url_is_not_found() {
        let store = FakeArtifactStore::new();
        let dir = std::env::temp_dir();
        let err = store.fetch("missing", "", &dir).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }
}
