//! Reference container provider: talks to an opaque workload daemon over
//! HTTP. `base_url` is the only thing distinguishing a Docker-backed daemon
//! from a Kubernetes-backed one at this layer — both speak the same
//! minimal surface (`POST /workloads`, `/start`, `/stop`, `/health`,
//! `/metrics`), and a different backend is a different `base_url`, not
//! different code.

use async_trait::async_trait;
use bg_types::session::Session;
use serde::Deserialize;

use crate::{Provider, ProviderError, SessionMetrics, StartResult};

pub struct ContainerProvider {
    client: reqwest::Client,
    base_url: String,
}

impl ContainerProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn workload_url(&self, container_id: &str, suffix: &str) -> String {
        format!(
            "{}/workloads/{}{}",
            self.base_url.trim_end_matches('/'),
            container_id,
            suffix
        )
    }

    /// Replaces `Response::error_for_status`, which collapses every bad
    /// status into a single (always-transient) `reqwest::Error`. A 4xx from
    /// the workload daemon means bad config/quota/auth — retrying it forever
    /// would be wrong, so it's classified `Permanent`; a 5xx or anything
    /// else is `Transport`, same as a network-level failure.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(ProviderError::Permanent(format!("workload daemon returned {status}: {body}")))
        } else {
            Err(ProviderError::Transport(anyhow::anyhow!(
                "workload daemon returned {status}: {body}"
            )))
        }
    }
}

#[derive(Deserialize)]
struct CreateWorkloadResponse {
    id: String,
}

#[derive(Deserialize)]
struct StartWorkloadResponse {
    ws_endpoint: String,
    live_url: String,
}

#[derive(Deserialize, Default)]
struct MetricsResponse {
    cpu_percent: Option<f64>,
    memory_mb: Option<f64>,
    rx_bytes: Option<u64>,
    tx_bytes: Option<u64>,
}

#[async_trait]
impl Provider for ContainerProvider {
    async fn start(&self, session: &Session) -> Result<StartResult, ProviderError> {
        let container_id = match &session.container_id {
            Some(id) => id.clone(),
            None => {
                let resp = self
                    .client
                    .post(format!("{}/workloads", self.base_url.trim_end_matches('/')))
                    .json(&serde_json::json!({
                        "browser": session.browser,
                        "version": session.version,
                        "headless": session.headless,
                        "environment": session.environment,
                        "resource_limits": session.resource_limits,
                    }))
                    .send()
                    .await?;
                let resp: CreateWorkloadResponse = Self::check_status(resp).await?.json().await?;
                resp.id
            }
        };

        // Idempotent on an existing container_id: (re-)issue start, which the
        // daemon treats as a no-op if the workload is already running and
        // simply re-discovers its endpoints.
        let start_resp = self
            .client
            .post(self.workload_url(&container_id, "/start"))
            .send()
            .await?;
        let start_resp: StartWorkloadResponse = Self::check_status(start_resp).await?.json().await?;

        Ok(StartResult {
            ws_endpoint: start_resp.ws_endpoint,
            live_url: start_resp.live_url,
            container_id,
        })
    }

    async fn stop(&self, session: &Session) -> Result<(), ProviderError> {
        let Some(container_id) = &session.container_id else {
            return Ok(());
        };
        let resp = self
            .client
            .post(self.workload_url(container_id, "/stop"))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status(resp).await?;
        Ok(())
    }

    async fn health_check(&self, session: &Session) -> Result<(), ProviderError> {
        let Some(container_id) = &session.container_id else {
            return Err(ProviderError::NotFound("no container_id".to_string()));
        };
        let resp = self
            .client
            .get(self.workload_url(container_id, "/health"))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else if resp.status() == reqwest::StatusCode::NOT_FOUND {
            Err(ProviderError::NotFound(container_id.clone()))
        } else {
            Err(ProviderError::Unhealthy(format!(
                "health endpoint returned {}",
                resp.status()
            )))
        }
    }

    async fn get_metrics(&self, session: &Session) -> Result<SessionMetrics, ProviderError> {
        let Some(container_id) = &session.container_id else {
            return Ok(SessionMetrics::default());
        };
        let resp = self
            .client
            .get(self.workload_url(container_id, "/metrics"))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(SessionMetrics::default());
        }
        let metrics: MetricsResponse = Self::check_status(resp).await?.json().await?;
        Ok(SessionMetrics {
            cpu_percent: metrics.cpu_percent,
            memory_mb: metrics.memory_mb,
            rx_bytes: metrics.rx_bytes,
            tx_bytes: metrics.tx_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_url_trims_trailing_slash_on_base() {
        let provider = ContainerProvider::new("http://daemon.local/");
        assert_eq!(
            provider.workload_url("abc", "/start"),
            "http://daemon.local/workloads/abc/start"
        );
    }
}
