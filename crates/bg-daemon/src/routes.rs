//! Axum router and all HTTP handlers for the `/api/v1` surface (§6).
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Individual handlers stay private — callers outside
//! this crate only ever need the assembled `Router`.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::Value;
use uuid::Uuid;

use bg_queue::{QueueName, TaskKind};
use bg_store::deployments::{DeploymentFilter, NewDeployment, PatchDeployment};
use bg_store::runs::{NewRun, RunFilter};
use bg_store::sessions::{NewSession, SessionFilter};
use bg_types::{DeploymentStatus, RunStatus, SessionEventKind, SessionStatus};

use crate::api_types::{
    CreateDeploymentRequest, CreatePoolRequest, CreateRunRequest, CreateSessionRequest,
    ListDeploymentsQuery, ListRunsQuery, ListSessionsQuery, OkResponse, PageBody, PagingQuery,
    PatchDeploymentRequest, PatchPoolRequest, RecordEventRequest, RecordMetricsRequest,
    RunLogsResponse, UploadResponse,
};
use crate::errors::{bad_request, queue_error_response, store_error_response};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/deployments", post(create_deployment).get(list_deployments))
        .route("/api/v1/deployments/upload", post(upload_deployment))
        .route(
            "/api/v1/deployments/:id",
            get(get_deployment).patch(patch_deployment).delete(delete_deployment),
        )
        .route("/api/v1/deployments/:id/stats", get(deployment_stats))
        .route(
            "/api/v1/deployments/:id/runs",
            post(create_run).get(list_deployment_runs),
        )
        .route("/api/v1/runs", get(list_runs))
        .route("/api/v1/runs/:id", get(get_run).delete(delete_run))
        .route("/api/v1/runs/:id/logs", get(run_logs))
        .route("/api/v1/sessions", post(create_session).get(list_sessions))
        .route(
            "/api/v1/sessions/:id",
            get(get_session).delete(delete_session),
        )
        .route("/api/v1/sessions/:id/events", post(record_event_for_session))
        .route("/api/v1/events", post(record_event_global))
        .route("/api/v1/sessions/:id/metrics", post(record_metrics_for_session))
        .route("/api/v1/metrics", post(record_metrics_global))
        .route("/api/v1/pools", post(create_pool).get(list_pools))
        .route(
            "/api/v1/pools/:id",
            get(get_pool).patch(patch_pool).delete(delete_pool),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

async fn create_deployment(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CreateDeploymentRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return bad_request("deployment name must not be empty");
    }

    match bg_store::deployments::get_deployment_by_name_version(&st.pool, &body.name, &body.version)
        .await
    {
        Ok(_) => {
            return bad_request(format!(
                "deployment {}@{} already exists",
                body.name, body.version
            ))
        }
        Err(bg_store::StoreError::NotFound { .. }) => {}
        Err(e) => return store_error_response(e),
    }

    let new = NewDeployment {
        name: body.name,
        description: body.description,
        version: body.version,
        runtime: body.runtime,
        package_url: body.package_url,
        package_hash: body.package_hash,
        config: body.config,
    };
    match bg_store::deployments::create_deployment(&st.pool, new).await {
        Ok(d) => (StatusCode::CREATED, Json(d)).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn list_deployments(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListDeploymentsQuery>,
) -> Response {
    let status = match q.status.as_deref() {
        Some(s) => match DeploymentStatus::parse(s) {
            Some(v) => Some(v),
            None => return bad_request(format!("unknown deployment status: {s}")),
        },
        None => None,
    };
    let filter = DeploymentFilter {
        status,
        runtime: q.runtime,
    };
    let paging = PagingQuery {
        offset: q.offset,
        limit: q.limit,
    }
    .into_paging();

    match bg_store::deployments::list_deployments(&st.pool, filter, paging).await {
        Ok(page) => Json(PageBody::from(page)).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn get_deployment(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::deployments::get_deployment(&st.pool, id).await {
        Ok(d) => Json(d).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn patch_deployment(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchDeploymentRequest>,
) -> Response {
    let status = match body.status.as_deref() {
        Some(s) => match DeploymentStatus::parse(s) {
            Some(v) => Some(v),
            None => return bad_request(format!("unknown deployment status: {s}")),
        },
        None => None,
    };
    let patch = PatchDeployment {
        description: body.description,
        config: body.config,
        status,
    };
    match bg_store::deployments::patch_deployment(&st.pool, id, patch).await {
        Ok(d) => Json(d).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn delete_deployment(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::deployments::delete_deployment(&st.pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn deployment_stats(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::runs::get_deployment_stats(&st.pool, id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Streams the multipart `file` field through the artifact store, hashing as
/// it goes (§4.2, §6): the SHA-256 is computed here, not supplied by the
/// caller.
async fn upload_deployment(State(st): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut filename = "package.bin".to_string();
    let mut file_bytes: Option<bytes::Bytes> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return bad_request(format!("invalid multipart body: {e}")),
        };
        if field.name() != Some("file") {
            continue;
        }
        if let Some(name) = field.file_name() {
            filename = name.to_string();
        }
        file_bytes = match field.bytes().await {
            Ok(b) => Some(b),
            Err(e) => return bad_request(format!("failed reading upload: {e}")),
        };
    }

    let bytes = match file_bytes {
        Some(b) => b,
        None => return bad_request("multipart body missing 'file' field"),
    };

    let package_hash = bg_artifacts::sha256_hex(&bytes);
    let key = format!("deployments/{}/{}", Uuid::new_v4(), filename);
    match st.artifact_store.save(&key, &bytes).await {
        Ok(package_url) => (
            StatusCode::CREATED,
            Json(UploadResponse {
                package_url,
                package_hash,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(crate::api_types::ErrorBody::new(e.to_string())),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Deployment runs
// ---------------------------------------------------------------------------

async fn create_run(
    State(st): State<Arc<AppState>>,
    Path(deployment_id): Path<Uuid>,
    Json(body): Json<CreateRunRequest>,
) -> Response {
    let deployment = match bg_store::deployments::get_deployment(&st.pool, deployment_id).await {
        Ok(d) => d,
        Err(e) => return store_error_response(e),
    };
    if deployment.status != DeploymentStatus::Active {
        return bad_request(format!(
            "deployment {deployment_id} is not active (status: {})",
            deployment.status.as_str()
        ));
    }

    let run = match bg_store::runs::create_run(&st.pool, NewRun { deployment_id }).await {
        Ok(r) => r,
        Err(e) => return store_error_response(e),
    };

    let task = TaskKind::DeploymentRun {
        deployment_id,
        run_id: run.id,
        environment: body.environment,
        config: body.config.unwrap_or(Value::Null),
    };
    if let Err(e) = bg_queue::enqueue(&st.pool, &task, None, None).await {
        return queue_error_response(e);
    }

    (StatusCode::CREATED, Json(run)).into_response()
}

async fn list_deployment_runs(
    State(st): State<Arc<AppState>>,
    Path(deployment_id): Path<Uuid>,
    Query(q): Query<PagingQuery>,
) -> Response {
    let filter = RunFilter {
        deployment_id: Some(deployment_id),
        status: None,
    };
    match bg_store::runs::list_runs(&st.pool, filter, q.into_paging()).await {
        Ok(page) => Json(PageBody::from(page)).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn list_runs(State(st): State<Arc<AppState>>, Query(q): Query<ListRunsQuery>) -> Response {
    let status = match q.status.as_deref() {
        Some(s) => match RunStatus::parse(s) {
            Some(v) => Some(v),
            None => return bad_request(format!("unknown run status: {s}")),
        },
        None => None,
    };
    let filter = RunFilter {
        deployment_id: q.deployment_id,
        status,
    };
    let paging = PagingQuery {
        offset: q.offset,
        limit: q.limit,
    }
    .into_paging();

    match bg_store::runs::list_runs(&st.pool, filter, paging).await {
        Ok(page) => Json(PageBody::from(page)).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn get_run(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::runs::get_run(&st.pool, id).await {
        Ok(r) => Json(r).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn run_logs(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::runs::get_run(&st.pool, id).await {
        Ok(r) => Json(RunLogsResponse {
            output: r.output,
            error: r.error,
        })
        .into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn delete_run(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::runs::delete_run(&st.pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

async fn create_session(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(body.ttl_seconds);
    let new = NewSession {
        work_pool_id: body.work_pool_id,
        browser: body.browser,
        version: body.version,
        headless: body.headless,
        operating_system: body.operating_system,
        screen: body.screen,
        resource_limits: bg_types::ResourceLimits::default(),
        environment: body.environment,
        profile_id: body.profile_id,
        provider: body.provider.clone(),
        expires_at,
    };

    let session = match bg_store::sessions::create_session(&st.pool, new).await {
        Ok(s) => s,
        Err(e) => return store_error_response(e),
    };

    let task = TaskKind::SessionStart {
        session_id: session.id,
        work_pool_id: session.work_pool_id.unwrap_or_else(Uuid::nil),
        max_session_duration: body.ttl_seconds,
        queue_name: body.provider,
    };
    if let Err(e) = bg_queue::enqueue(&st.pool, &task, None, None).await {
        return queue_error_response(e);
    }

    (StatusCode::CREATED, Json(session)).into_response()
}

async fn list_sessions(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListSessionsQuery>,
) -> Response {
    let status = match q.status.as_deref() {
        Some(s) => match SessionStatus::parse(s) {
            Some(v) => Some(v),
            None => return bad_request(format!("unknown session status: {s}")),
        },
        None => None,
    };
    let filter = SessionFilter {
        work_pool_id: q.work_pool_id,
        status,
    };
    let paging = PagingQuery {
        offset: q.offset,
        limit: q.limit,
    }
    .into_paging();

    match bg_store::sessions::list_sessions(&st.pool, filter, paging).await {
        Ok(page) => Json(PageBody::from(page)).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn get_session(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::sessions::get_session(&st.pool, id).await {
        Ok(s) => Json(s).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Never deletes the row synchronously: teardown happens through the same
/// `SessionStop` path as every other stop, so the provider workload is
/// actually released before the row is later swept by the reconciler's
/// terminal-session cleanup (§4.7 step 6).
async fn delete_session(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let session = match bg_store::sessions::get_session(&st.pool, id).await {
        Ok(s) => s,
        Err(e) => return store_error_response(e),
    };

    let task = TaskKind::SessionStop {
        session_id: id,
        reason: "api_delete".to_string(),
    };
    if let Err(e) = bg_queue::enqueue(&st.pool, &task, Some(QueueName::Critical), None).await {
        return queue_error_response(e);
    }

    (StatusCode::ACCEPTED, Json(session)).into_response()
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

async fn record_event_for_session(
    State(st): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<RecordEventRequest>,
) -> Response {
    record_event_shared(&st, session_id, &body.event, body.payload).await
}

async fn record_event_global(
    State(st): State<Arc<AppState>>,
    Json(body): Json<RecordEventRequest>,
) -> Response {
    let session_id = match body.session_id {
        Some(id) => id,
        None => return bad_request("session_id is required when not given in the path"),
    };
    record_event_shared(&st, session_id, &body.event, body.payload).await
}

async fn record_event_shared(
    st: &AppState,
    session_id: Uuid,
    event_str: &str,
    payload: Option<Value>,
) -> Response {
    let event = match SessionEventKind::parse(event_str) {
        Some(e) => e,
        None => return bad_request(format!("unknown event kind: {event_str}")),
    };

    match bg_session::record_session_event(&st.pool, session_id, event, payload).await {
        Ok(recorded) => (StatusCode::CREATED, Json(recorded)).into_response(),
        Err(bg_session::SessionHandlerError::Store(e)) => store_error_response(e),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(crate::api_types::ErrorBody::new(e.to_string())),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Metrics — accepted and logged; §3 defines no persisted metrics table.
// ---------------------------------------------------------------------------

async fn record_metrics_for_session(
    State(st): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<RecordMetricsRequest>,
) -> Response {
    record_metrics_shared(&st, session_id, body).await
}

async fn record_metrics_global(
    State(st): State<Arc<AppState>>,
    Json(body): Json<RecordMetricsRequest>,
) -> Response {
    let session_id = match body.session_id {
        Some(id) => id,
        None => return bad_request("session_id is required when not given in the path"),
    };
    record_metrics_shared(&st, session_id, body).await
}

async fn record_metrics_shared(
    st: &AppState,
    session_id: Uuid,
    body: RecordMetricsRequest,
) -> Response {
    if let Err(e) = bg_store::sessions::get_session(&st.pool, session_id).await {
        return store_error_response(e);
    }
    tracing::info!(
        %session_id,
        cpu_percent = ?body.cpu_percent,
        memory_mb = ?body.memory_mb,
        rx_bytes = ?body.rx_bytes,
        tx_bytes = ?body.tx_bytes,
        "session metrics reported",
    );
    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}

// ---------------------------------------------------------------------------
// Work pools (supplemented; see api_types.rs)
// ---------------------------------------------------------------------------

async fn create_pool(State(st): State<Arc<AppState>>, Json(body): Json<CreatePoolRequest>) -> Response {
    let new = bg_store::pools::NewWorkPool {
        name: body.name,
        provider: body.provider,
        min_size: body.min_size,
        max_concurrency: body.max_concurrency,
        auto_scale: body.auto_scale,
        max_idle_time: body.max_idle_time,
        max_session_duration: body.max_session_duration,
        default_image: body.default_image,
        default_env: body.default_env,
    };
    match bg_store::pools::create_pool(&st.pool, new).await {
        Ok(p) => (StatusCode::CREATED, Json(p)).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn list_pools(State(st): State<Arc<AppState>>) -> Response {
    match bg_store::pools::list_pools(&st.pool).await {
        Ok(pools) => Json(pools).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn get_pool(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::pools::get_pool(&st.pool, id).await {
        Ok(p) => Json(p).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Also how the CLI's `scale <pool-id> --instances N` lands: it PATCHes
/// `min_size` (and, if `N` exceeds the current ceiling, `max_concurrency`
/// too) so the reconciler's next tick scales toward the new floor.
async fn patch_pool(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchPoolRequest>,
) -> Response {
    let patch = bg_store::pools::PatchWorkPool {
        min_size: body.min_size,
        max_concurrency: body.max_concurrency,
        auto_scale: body.auto_scale,
        paused: body.paused,
    };
    match bg_store::pools::patch_pool(&st.pool, id, patch).await {
        Ok(p) => Json(p).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn delete_pool(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match bg_store::pools::delete_pool(&st.pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}
