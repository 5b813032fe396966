//! Shared runtime state for `bg-daemon`.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; the same `AppState` is
//! also handed to the worker dispatcher loop spawned alongside the HTTP
//! server in `main.rs`, so both surfaces share one pool, artifact store, and
//! provider registry.

use std::path::PathBuf;
use std::sync::Arc;

use bg_artifacts::ArtifactStore;
use bg_executor::DeploymentExecutor;
use bg_provider::ProviderRegistry;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers and the worker loop.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub build: BuildInfo,
    pub artifact_store: Arc<dyn ArtifactStore>,
    pub providers: Arc<ProviderRegistry>,
    pub executor: Arc<DeploymentExecutor>,
    /// Scheme used to resolve a `Provider` when a request doesn't name one
    /// explicitly (§9: providers are chosen from a registry keyed by scheme).
    pub default_provider_scheme: String,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        artifact_store: Arc<dyn ArtifactStore>,
        providers: ProviderRegistry,
        work_dir: PathBuf,
        default_provider_scheme: impl Into<String>,
    ) -> Self {
        let default_provider_scheme = default_provider_scheme.into();
        let runtime_executor = Arc::new(bg_executor::ProcessRuntimeExecutor::new());
        let executor = Arc::new(DeploymentExecutor::new(
            pool.clone(),
            artifact_store.clone(),
            runtime_executor,
            default_provider_scheme.clone(),
            work_dir,
        ));

        Self {
            pool,
            build: BuildInfo {
                service: "bg-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            artifact_store,
            providers: Arc::new(providers),
            executor,
            default_provider_scheme,
        }
    }

    /// Resolve the `Provider` for `scheme`, falling back to the daemon's
    /// default when the caller left it unset.
    pub fn provider_for(&self, scheme: &str) -> Option<Arc<dyn bg_provider::Provider>> {
        self.providers.get(scheme)
    }
}
