//! Provider interface (§4.8, C5): the backend that materializes a session
//! as a concrete workload (container, pod, VM). `Provider` is the single
//! choke-point every caller goes through — session handlers and the
//! reconciler never talk to a container runtime directly, mirroring the
//! broker-adapter boundary the teacher draws between its execution engine
//! and `BrokerAdapter` implementations.

pub mod error;
pub mod reference;
pub mod registry;

pub use error::ProviderError;
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use bg_types::session::Session;

/// Endpoints discovered once a workload is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartResult {
    pub ws_endpoint: String,
    pub live_url: String,
    /// Provider-assigned workload handle, persisted as `Session::container_id`.
    pub container_id: String,
}

/// CPU/memory/network usage snapshot. All fields are optional because not
/// every provider backend exposes every metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetrics {
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<f64>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

/// Contract every provider backend implements (§4.8).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start a workload for `session`. Must be idempotent on an existing
    /// `container_id`: re-discover its endpoints and return them rather
    /// than creating a second workload.
    async fn start(&self, session: &Session) -> Result<StartResult, ProviderError>;

    /// Stop the workload backing `session`. Must succeed (not error) when
    /// the workload is already gone.
    async fn stop(&self, session: &Session) -> Result<(), ProviderError>;

    /// Ready-kind success iff the remote browser endpoint serves its
    /// health path with 200.
    async fn health_check(&self, session: &Session) -> Result<(), ProviderError>;

    async fn get_metrics(&self, session: &Session) -> Result<SessionMetrics, ProviderError>;
}
