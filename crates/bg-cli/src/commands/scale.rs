use anyhow::Result;
use bg_types::WorkPool;
use serde::Serialize;
use uuid::Uuid;

use crate::client::Client;

/// `scale <pool-id> --instances N` maps to patching `min_size`, since that's
/// the floor the reconciler's tick actually scales a pool toward. If `N`
/// exceeds the pool's current `max_concurrency` ceiling, that ceiling is
/// bumped to match so the new floor is reachable.
#[derive(Serialize)]
struct PatchPoolRequest {
    min_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_concurrency: Option<u32>,
}

pub async fn scale(client: &Client, pool_id: Uuid, instances: u32) -> Result<()> {
    let current: WorkPool = client.get(&format!("/api/v1/pools/{pool_id}")).await?;

    let req = PatchPoolRequest {
        min_size: instances,
        max_concurrency: (instances > current.max_concurrency).then_some(instances),
    };

    let updated: WorkPool = client
        .patch_json(&format!("/api/v1/pools/{pool_id}"), &req)
        .await?;
    println!("pool_id={}", updated.id);
    println!("min_size={}", updated.min_size);
    println!("max_concurrency={}", updated.max_concurrency);
    Ok(())
}
