use anyhow::Result;
use serde::Deserialize;
use uuid::Uuid;

use crate::client::Client;

#[derive(Deserialize)]
struct RunLogs {
    output: serde_json::Value,
    error: Option<String>,
}

pub async fn logs(client: &Client, run_id: Uuid) -> Result<()> {
    let logs: RunLogs = client.get(&format!("/api/v1/runs/{run_id}/logs")).await?;
    println!("{}", serde_json::to_string_pretty(&logs.output)?);
    if let Some(err) = logs.error {
        eprintln!("error={err}");
    }
    Ok(())
}
