use bg_types::{SessionEvent, SessionEventKind};
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Append-only insert. Direct writes to `session_events` never happen
/// outside this function; the table has no update/delete path in the store
/// (§3: retained for audit).
pub async fn insert_event(
    pool: &PgPool,
    session_id: Uuid,
    event: SessionEventKind,
    payload: Option<Value>,
) -> StoreResult<SessionEvent> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let row = sqlx::query(
        "insert into session_events (id, session_id, event, timestamp, payload) values ($1, $2, $3, $4, $5) returning *",
    )
    .bind(id)
    .bind(session_id)
    .bind(event.as_str())
    .bind(now)
    .bind(&payload)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_event(row)
}

pub async fn list_events_for_session(pool: &PgPool, session_id: Uuid) -> StoreResult<Vec<SessionEvent>> {
    let rows = sqlx::query(
        "select * from session_events where session_id = $1 order by timestamp asc, id asc",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_event).collect()
}

fn row_to_event(row: sqlx::postgres::PgRow) -> StoreResult<SessionEvent> {
    let event_str: String = row.try_get("event").map_err(anyhow::Error::from)?;
    let event = SessionEventKind::parse(&event_str)
        .ok_or_else(|| StoreError::Internal(anyhow::anyhow!("bad event kind in row: {event_str}")))?;
    Ok(SessionEvent {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        session_id: row.try_get("session_id").map_err(anyhow::Error::from)?,
        event,
        timestamp: row.try_get("timestamp").map_err(anyhow::Error::from)?,
        payload: row.try_get("payload").map_err(anyhow::Error::from)?,
    })
}
