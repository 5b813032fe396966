use anyhow::Result;
use bg_types::Deployment;
use serde::Deserialize;
use uuid::Uuid;

use crate::client::Client;

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
    total: i64,
}

pub async fn list(client: &Client) -> Result<()> {
    let page: Page<Deployment> = client.get("/api/v1/deployments").await?;
    println!("total={}", page.total);
    for d in page.items {
        println!(
            "id={} name={} version={} status={}",
            d.id,
            d.name,
            d.version,
            d.status.as_str()
        );
    }
    Ok(())
}

pub async fn show(client: &Client, id: Uuid) -> Result<()> {
    let d: Deployment = client.get(&format!("/api/v1/deployments/{id}")).await?;
    println!("id={}", d.id);
    println!("name={}", d.name);
    println!("description={}", d.description.unwrap_or_default());
    println!("version={}", d.version);
    println!("runtime={}", d.runtime);
    println!("status={}", d.status.as_str());
    println!("package_url={}", d.package_url);
    println!("package_hash={}", d.package_hash);
    println!("created_at={}", d.created_at.to_rfc3339());
    Ok(())
}

pub async fn delete(client: &Client, id: Uuid) -> Result<()> {
    client.delete(&format!("/api/v1/deployments/{id}")).await?;
    println!("deleted=true id={id}");
    Ok(())
}
