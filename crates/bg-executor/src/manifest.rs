//! Environment manifest for an extracted run (§4.6 step 4, §6 "environment
//! variables injected into runs"). Mirrors `mqk-artifacts`'s `manifest.json`
//! writer: a small, deterministic JSON file dropped next to the extracted
//! package, overwritten freely since it's fully derived from the run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

/// Writes `env.json` — the ordered map of environment variables the runtime
/// entry point reads before executing. `BTreeMap` keeps the file's key order
/// deterministic across writes.
pub async fn write_env_manifest(extract_dir: &Path, env: &BTreeMap<String, String>) -> anyhow::Result<()> {
    let path = extract_dir.join("env.json");
    let json = serde_json::to_string_pretty(env).context("serialize env manifest failed")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("write env manifest failed: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_sorted_env_manifest() {
        let dir = std::env::temp_dir().join(format!("bg-executor-manifest-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let mut env = BTreeMap::new();
        env.insert("BROWSER_SESSION_ID".to_string(), "abc".to_string());
        env.insert("API_KEY".to_string(), "secret".to_string());
        write_env_manifest(&dir, &env).await.unwrap();

        let written = tokio::fs::read_to_string(dir.join("env.json")).await.unwrap();
        let api_pos = written.find("API_KEY").unwrap();
        let session_pos = written.find("BROWSER_SESSION_ID").unwrap();
        assert!(api_pos < session_pos);
    }
}
