//! `browsergrid.json`: the deployment manifest `init` scaffolds and `deploy`
//! reads back out of a project directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MANIFEST_FILE: &str = "browsergrid.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub runtime: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Value,
}

impl Manifest {
    pub fn scaffold(name: String) -> Self {
        Self {
            name,
            version: "0.1.0".to_string(),
            runtime: "node18".to_string(),
            description: None,
            config: serde_json::json!({
                "concurrency": 1,
                "max_retries": 0,
                "timeout_seconds": 300,
                "environment": {},
                "browser_requests": []
            }),
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = Self::path_in(dir);
        let body = serde_json::to_string_pretty(self).context("serializing manifest")?;
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))
    }

    pub fn read_from(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {} — run `browsergrid init` first", path.display()))?;
        serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))
    }
}
