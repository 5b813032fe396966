//! `bg-daemon` entry point.
//!
//! Thin by design: load config from the environment, build `AppState`,
//! spawn the reconciler and dispatcher loops, serve the HTTP router. All
//! handlers live in `routes.rs`; all shared state lives in `state.rs`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::Method;
use bg_daemon::{dispatch, routes, state::AppState};
use bg_provider::reference::ContainerProvider;
use bg_provider::ProviderRegistry;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience); silent if absent —
    // production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let pool = bg_store::connect_from_env().await?;
    bg_store::migrate(&pool).await?;

    let artifact_store = build_artifact_store();
    let providers = build_provider_registry();
    let default_provider_scheme =
        std::env::var("BROWSERGRID_DEFAULT_PROVIDER").unwrap_or_else(|_| "docker".to_string());
    let work_dir = std::env::var("BROWSERGRID_WORK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("browsergrid"));
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("creating work dir {}", work_dir.display()))?;

    let state = Arc::new(AppState::new(
        pool.clone(),
        artifact_store,
        providers,
        work_dir,
        default_provider_scheme,
    ));

    let cancel = CancellationToken::new();
    tokio::spawn(bg_reconcile::run_forever(
        pool.clone(),
        bg_reconcile::DEFAULT_TICK_INTERVAL,
        cancel.clone(),
    ));
    tokio::spawn(bg_reconcile::run_cleanup_scheduler(
        pool.clone(),
        bg_reconcile::DEFAULT_CLEANUP_INTERVAL,
        cancel.clone(),
    ));

    let dispatcher_count = std::env::var("BROWSERGRID_DISPATCHER_WORKERS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(2);
    for _ in 0..dispatcher_count {
        tokio::spawn(dispatch::run_forever(
            state.clone(),
            dispatch::new_claimant_id(),
            uuid::Uuid::new_v4(),
            cancel.clone(),
        ));
    }

    let app = routes::build_router(state.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8732)));
    info!("bg-daemon listening on http://{}", addr);

    let shutdown = shutdown_signal(cancel.clone());
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server crashed")?;

    cancel.cancel();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("BROWSERGRID_ADDR").ok()?.parse().ok()
}

/// Unlike the teacher's localhost-paired GUI daemon, this is a control
/// plane meant to be reached by CI runners and CLIs on other hosts, so CORS
/// is left open rather than locked to a fixed origin list.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

fn build_artifact_store() -> Arc<dyn bg_artifacts::ArtifactStore> {
    match std::env::var("BROWSERGRID_ARTIFACT_BACKEND").as_deref() {
        Ok("object") => {
            let endpoint = std::env::var("BROWSERGRID_OBJECT_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".to_string());
            let bucket =
                std::env::var("BROWSERGRID_OBJECT_BUCKET").unwrap_or_else(|_| "browsergrid".to_string());
            let prefix = std::env::var("BROWSERGRID_OBJECT_PREFIX").unwrap_or_default();
            Arc::new(bg_artifacts::object_store::ObjectArtifactStore::new(endpoint, bucket, prefix))
        }
        _ => {
            let root = std::env::var("BROWSERGRID_ARTIFACT_ROOT")
                .unwrap_or_else(|_| "./artifacts".to_string());
            Arc::new(bg_artifacts::fs_store::FsArtifactStore::new(root))
        }
    }
}

fn build_provider_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let docker_url = std::env::var("BROWSERGRID_PROVIDER_DOCKER_URL")
        .unwrap_or_else(|_| "http://localhost:2375".to_string());
    registry.register("docker", Arc::new(ContainerProvider::new(docker_url)));

    if let Ok(k8s_url) = std::env::var("BROWSERGRID_PROVIDER_KUBERNETES_URL") {
        registry.register("kubernetes", Arc::new(ContainerProvider::new(k8s_url)));
    }

    registry
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    cancel.cancel();
}
