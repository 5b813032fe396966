use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::manifest::Manifest;

pub async fn init(dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let manifest_path = Manifest::path_in(&dir);
    if manifest_path.exists() {
        bail!("{} already exists", manifest_path.display());
    }

    let name = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "my-deployment".to_string());

    Manifest::scaffold(name.clone()).write_to(&dir)?;
    println!("scaffolded={}", manifest_path.display());
    println!("name={name}");
    Ok(())
}
