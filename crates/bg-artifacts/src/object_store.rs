//! Object-storage backend: a bucket/prefix addressed over HTTP. Talks to any
//! S3-compatible PUT/GET endpoint that accepts `{endpoint}/{bucket}/{key}`.
//!
//! No multipart upload, no presigned URLs — single-shot PUT/GET is enough
//! for the artifact sizes this system moves (§4.2 Non-goals).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{ArtifactError, ArtifactStore};

pub struct ObjectArtifactStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    prefix: String,
}

impl ObjectArtifactStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), self.bucket, key)
        } else {
            format!(
                "{}/{}/{}/{}",
                self.endpoint.trim_end_matches('/'),
                self.bucket,
                self.prefix.trim_matches('/'),
                key
            )
        }
    }
}

#[async_trait]
impl ArtifactStore for ObjectArtifactStore {
    async fn fetch(
        &self,
        url: &str,
        expected_hash: &str,
        work_dir: &Path,
    ) -> Result<PathBuf, ArtifactError> {
        let target = self.object_url(url);
        let resp = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| ArtifactError::Transport(e.into()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ArtifactError::NotFound(url.to_string()));
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| ArtifactError::Transport(e.into()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ArtifactError::Transport(e.into()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());
        if !expected_hash.is_empty() && digest != expected_hash {
            return Err(ArtifactError::HashMismatch {
                expected: expected_hash.to_string(),
                actual: digest,
            });
        }

        tokio::fs::create_dir_all(work_dir).await?;
        let file_name = url.rsplit('/').next().unwrap_or(url);
        let dest = work_dir.join(file_name);
        tokio::fs::write(&dest, &bytes).await?;
        Ok(dest)
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, ArtifactError> {
        let target = self.object_url(key);
        self.client
            .put(&target)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ArtifactError::Transport(e.into()))?
            .error_for_status()
            .map_err(|e| ArtifactError::Transport(e.into()))?;
        Ok(key.to_string())
    }

    async fn open(&self, key: &str) -> Result<Vec<u8>, ArtifactError> {
        let target = self.object_url(key);
        let resp = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| ArtifactError::Transport(e.into()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ArtifactError::NotFound(key.to_string()));
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| ArtifactError::Transport(e.into()))?;
        Ok(resp
            .bytes()
            .await
            .map_err(|e| ArtifactError::Transport(e.into()))?
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_joins_bucket_prefix_and_key() {
        let store = ObjectArtifactStore::new("https://store.internal", "artifacts", "deployments");
        assert_eq!(
            store.object_url("abc/pkg.zip"),
            "https://store.internal/artifacts/deployments/abc/pkg.zip"
        );
    }

    #[test]
    fn object_url_without_prefix_skips_segment() {
        let store = ObjectArtifactStore::new("https://store.internal", "artifacts", "");
        assert_eq!(
            store.object_url("pkg.zip"),
            "https://store.internal/artifacts/pkg.zip"
        );
    }
}
