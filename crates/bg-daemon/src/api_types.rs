//! Request and response bodies for the `/api/v1` HTTP surface (§6).
//!
//! Entity types (`Deployment`, `Session`, …) are returned directly — they
//! already derive `Serialize` in `bg-types`. Types here exist only where the
//! wire shape differs from a stored entity: creation requests, paging
//! envelopes, and the uniform error body.

use std::collections::HashMap;

use bg_types::config::Screen;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `{error: string}` for every non-2xx response (§6, §7).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// A paged listing: `items` plus the total row count ignoring `offset`/`limit`.
#[derive(Debug, Serialize)]
pub struct PageBody<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T: Serialize> From<bg_store::Page<T>> for PageBody<T> {
    fn from(page: bg_store::Page<T>) -> Self {
        Self {
            items: page.items,
            total: page.total,
        }
    }
}

/// `offset`/`limit` query parameters shared by every list endpoint. Clamped
/// to `[1, 100]` at this edge (§6) before `Paging::new` applies its looser
/// internal `[1, 1000]` clamp.
#[derive(Debug, Deserialize)]
pub struct PagingQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

pub const HTTP_MAX_LIMIT: i64 = 100;

impl PagingQuery {
    pub fn into_paging(self) -> bg_store::Paging {
        let offset = self.offset.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(20).clamp(1, HTTP_MAX_LIMIT);
        bg_store::Paging::new(offset, limit)
    }
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub runtime: String,
    pub package_url: String,
    pub package_hash: String,
    pub config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListDeploymentsQuery {
    pub status: Option<String>,
    pub runtime: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchDeploymentRequest {
    pub description: Option<String>,
    pub config: Option<Value>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub package_url: String,
    pub package_hash: String,
}

// ---------------------------------------------------------------------------
// Deployment runs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct CreateRunRequest {
    #[serde(default)]
    pub environment: serde_json::Map<String, Value>,
    pub config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub deployment_id: Option<Uuid>,
    pub status: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunLogsResponse {
    pub output: Value,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub work_pool_id: Option<Uuid>,
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_os")]
    pub operating_system: String,
    #[serde(default)]
    pub screen: Screen,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    pub profile_id: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Session TTL in seconds from creation time; defaults to one hour.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
}

fn default_browser() -> String {
    "chrome".to_string()
}
fn default_version() -> String {
    "latest".to_string()
}
fn default_headless() -> bool {
    true
}
fn default_os() -> String {
    "linux".to_string()
}
fn default_provider() -> String {
    "docker".to_string()
}
fn default_ttl_seconds() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub work_pool_id: Option<Uuid>,
    pub status: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Events / metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub session_id: Option<Uuid>,
    pub event: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RecordMetricsRequest {
    pub session_id: Option<Uuid>,
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<f64>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

// ---------------------------------------------------------------------------
// Work pools (supplemented: §3 defines `WorkPool` but §6 never routes it;
// the CLI's `scale` command needs something to call, so a minimal CRUD
// surface is added here — see DESIGN.md).
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePoolRequest {
    pub name: String,
    pub provider: String,
    pub min_size: u32,
    pub max_concurrency: u32,
    #[serde(default = "default_true")]
    pub auto_scale: bool,
    #[serde(default = "default_max_idle_time")]
    pub max_idle_time: i64,
    #[serde(default = "default_ttl_seconds")]
    pub max_session_duration: i64,
    pub default_image: Option<String>,
    pub default_env: Option<Value>,
}

fn default_true() -> bool {
    true
}
fn default_max_idle_time() -> i64 {
    300
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchPoolRequest {
    pub min_size: Option<u32>,
    pub max_concurrency: Option<u32>,
    pub auto_scale: Option<bool>,
    pub paused: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_query_defaults_to_twenty() {
        let paging = PagingQuery { offset: None, limit: None }.into_paging();
        assert_eq!(paging.offset, 0);
        assert_eq!(paging.limit, 20);
    }

    #[test]
    fn paging_query_clamps_limit_above_http_max() {
        let paging = PagingQuery { offset: None, limit: Some(10_000) }.into_paging();
        assert_eq!(paging.limit, HTTP_MAX_LIMIT);
    }

    #[test]
    fn paging_query_clamps_negative_offset() {
        let paging = PagingQuery { offset: Some(-5), limit: Some(10) }.into_paging();
        assert_eq!(paging.offset, 0);
    }
}
