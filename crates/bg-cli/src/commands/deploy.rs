use std::path::PathBuf;

use anyhow::Result;
use bg_types::Deployment;
use serde::{Deserialize, Serialize};

use crate::archive::build_package;
use crate::client::Client;
use crate::manifest::Manifest;

#[derive(Serialize)]
struct CreateDeploymentRequest {
    name: String,
    description: Option<String>,
    version: String,
    runtime: String,
    package_url: String,
    package_hash: String,
    config: serde_json::Value,
}

#[derive(Deserialize)]
struct UploadResponse {
    package_url: String,
    package_hash: String,
}

pub async fn deploy(client: &Client, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    let manifest = Manifest::read_from(&dir)?;

    let package = build_package(dir.clone()).await?;
    println!("package_bytes={}", package.len());

    let upload: UploadResponse = client
        .upload("/api/v1/deployments/upload", format!("{}.zip", manifest.name), package)
        .await?;
    println!("package_url={}", upload.package_url);
    println!("package_hash={}", upload.package_hash);

    let req = CreateDeploymentRequest {
        name: manifest.name.clone(),
        description: manifest.description.clone(),
        version: manifest.version.clone(),
        runtime: manifest.runtime.clone(),
        package_url: upload.package_url,
        package_hash: upload.package_hash,
        config: manifest.config.clone(),
    };

    let deployment: Deployment = client.post_json("/api/v1/deployments", &req).await?;
    println!("deployment_id={}", deployment.id);
    println!("name={}", deployment.name);
    println!("version={}", deployment.version);
    println!("status={}", deployment.status.as_str());
    Ok(())
}
