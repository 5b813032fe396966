//! Session handler (§4.5, C6): consumes `SessionStart`/`SessionStop` tasks
//! and drives the session through `bg_types::transitions`. This is the only
//! place that calls into `bg_provider::Provider` for a live session — the
//! same single-choke-point shape the teacher draws around `BrokerGateway`
//! for broker operations.

pub mod error;

pub use error::{Retryable, SessionHandlerError, SessionHandlerResult};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use bg_provider::Provider;
use bg_types::event::SessionEventKind;
use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// Bound on how long `handle_session_start` will poll for readiness before
/// giving up (§4.5 step 4 default).
pub const START_BUDGET: StdDuration = StdDuration::from_secs(120);
/// Interval between health-check polls while waiting for a session to
/// become ready.
pub const START_POLL_INTERVAL: StdDuration = StdDuration::from_secs(5);

/// Consume a `SessionStart` task (§4.5).
pub async fn handle_session_start(
    pool: &PgPool,
    provider: &Arc<dyn Provider>,
    session_id: Uuid,
) -> SessionHandlerResult<()> {
    let session = bg_store::sessions::get_session(pool, session_id).await?;
    if session.status.is_terminal() {
        // Step 1: already terminal, ACK as a no-op.
        return Ok(());
    }

    let start = match provider.start(&session).await {
        Ok(start) => start,
        Err(e) => return fail_start(pool, provider, session_id, e).await,
    };

    bg_store::sessions::set_session_provider_handle(
        pool,
        session_id,
        &start.container_id,
        &start.ws_endpoint,
        &start.live_url,
    )
    .await?;
    record_event(pool, session_id, SessionEventKind::ContainerStarted, None).await;

    let deadline = tokio::time::Instant::now() + START_BUDGET;
    loop {
        let session = bg_store::sessions::get_session(pool, session_id).await?;
        if session.status.is_terminal() {
            return Ok(());
        }
        match provider.health_check(&session).await {
            Ok(()) => break,
            Err(_) if tokio::time::Instant::now() >= deadline => {
                return fail_start(
                    pool,
                    provider,
                    session_id,
                    bg_provider::ProviderError::Unhealthy("start budget exceeded".to_string()),
                )
                .await;
            }
            Err(_) => {
                tokio::time::sleep(START_POLL_INTERVAL).await;
            }
        }
    }

    record_event(pool, session_id, SessionEventKind::SessionAvailable, None).await;
    record_event(pool, session_id, SessionEventKind::SessionReady, None).await;

    Ok(())
}

async fn fail_start(
    pool: &PgPool,
    provider: &Arc<dyn Provider>,
    session_id: Uuid,
    cause: bg_provider::ProviderError,
) -> SessionHandlerResult<()> {
    if let Ok(session) = bg_store::sessions::get_session(pool, session_id).await {
        let _ = provider.stop(&session).await;
    }
    record_event(
        pool,
        session_id,
        SessionEventKind::StartupFailed,
        Some(serde_json::json!({ "error": cause.to_string() })),
    )
    .await;

    let err = SessionHandlerError::from(cause);
    if err.retryable() == Retryable::Permanent {
        // Permanent failure: ACK the task, the row is already terminal.
        Ok(())
    } else {
        Err(err)
    }
}

/// Consume a `SessionStop` task (§4.5). Never un-terminates a session: if
/// it's already terminal, emitting `session_terminated` and calling
/// `provider.stop` again are both no-ops.
pub async fn handle_session_stop(
    pool: &PgPool,
    provider: &Arc<dyn Provider>,
    session_id: Uuid,
    reason: &str,
) -> SessionHandlerResult<()> {
    let session = bg_store::sessions::get_session(pool, session_id).await?;

    record_event(
        pool,
        session_id,
        SessionEventKind::SessionTerminated,
        Some(serde_json::json!({ "reason": reason })),
    )
    .await;

    if let Err(e) = provider.stop(&session).await {
        warn!(%session_id, error = %e, "provider stop failed during session_stop; row still moves to terminated");
    }

    Ok(())
}

/// Append a session event and, if it maps to a status change the session
/// can still make, best-effort apply it. The event row is the authoritative
/// record regardless of whether the status write succeeds (§4.3).
async fn record_event(pool: &PgPool, session_id: Uuid, event: SessionEventKind, payload: Option<Value>) {
    if let Err(e) = bg_store::events::insert_event(pool, session_id, event, payload).await {
        warn!(%session_id, error = %e, "failed to append session event");
        return;
    }

    let current = match bg_store::sessions::get_session(pool, session_id).await {
        Ok(s) => s,
        Err(e) => {
            warn!(%session_id, error = %e, "failed to load session for status transition");
            return;
        }
    };

    match bg_types::transitions::apply_session_event(current.status, event) {
        Ok(bg_types::transitions::SessionTransition::Moved(target)) => {
            if let Err(e) = bg_store::sessions::update_session_status(pool, session_id, target).await {
                warn!(%session_id, error = %e, "best-effort status update failed; event remains authoritative");
            }
        }
        Ok(bg_types::transitions::SessionTransition::AlreadyTerminal(_))
        | Ok(bg_types::transitions::SessionTransition::NoStatusChange) => {}
        Err(rejected) => {
            warn!(%session_id, %rejected, "session event rejected by state machine");
        }
    }
}

/// Same status-transition logic as [`record_event`], but for callers (the
/// `POST /sessions/{id}/events` HTTP handler) that need to report a failure
/// to append the event rather than swallow it — the task handlers above
/// treat event recording as best-effort telemetry, an API caller needs to
/// know its event was actually persisted.
pub async fn record_session_event(
    pool: &PgPool,
    session_id: Uuid,
    event: SessionEventKind,
    payload: Option<Value>,
) -> SessionHandlerResult<bg_types::event::SessionEvent> {
    let recorded = bg_store::events::insert_event(pool, session_id, event, payload).await?;

    let current = bg_store::sessions::get_session(pool, session_id).await?;
    match bg_types::transitions::apply_session_event(current.status, event) {
        Ok(bg_types::transitions::SessionTransition::Moved(target)) => {
            if let Err(e) = bg_store::sessions::update_session_status(pool, session_id, target).await {
                warn!(%session_id, error = %e, "best-effort status update failed; event remains authoritative");
            }
        }
        Ok(bg_types::transitions::SessionTransition::AlreadyTerminal(_))
        | Ok(bg_types::transitions::SessionTransition::NoStatusChange) => {}
        Err(rejected) => {
            warn!(%session_id, %rejected, "session event rejected by state machine");
        }
    }

    Ok(recorded)
}

/// An `Arc<dyn Provider>` backed by `bg_testkit::FakeProvider`, so callers
/// that need to hand `handle_session_start`/`handle_session_stop` a provider
/// in tests don't have to depend on `bg-testkit` directly. Gated behind
/// `testkit` for the same reason `bg-executor`'s `FakeRuntimeExecutor` and
/// `bg-queue`'s `test_task_kind` are: production binaries must not be able
/// to link a test double in by accident.
#[cfg(feature = "testkit")]
pub fn test_provider() -> Arc<dyn Provider> {
    Arc::new(bg_testkit::FakeProvider::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_budget_is_two_minutes() {
        assert_eq!(START_BUDGET, StdDuration::from_secs(120));
    }

    #[cfg(feature = "testkit")]
    #[tokio::test]
    async fn test_provider_is_usable_without_a_real_container_runtime() {
        let provider = test_provider();
        let session = bg_types::session::Session {
            id: Uuid::new_v4(),
            work_pool_id: None,
            worker_id: None,
            browser: "chrome".into(),
            version: "latest".into(),
            headless: true,
            operating_system: "linux".into(),
            screen: bg_types::config::Screen::default(),
            resource_limits: bg_types::session::ResourceLimits::default(),
            environment: Default::default(),
            profile_id: None,
            provider: "fake".into(),
            status: bg_types::session::SessionStatus::Pending,
            container_id: None,
            ws_endpoint: None,
            live_url: None,
            expires_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let start = provider.start(&session).await.unwrap();
        assert!(start.container_id.starts_with("fake-"));
    }
}
