use bg_types::{ResourceLimits, Session, SessionStatus};
use bg_types::config::Screen;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::paging::{Page, Paging};

pub struct NewSession {
    pub work_pool_id: Option<Uuid>,
    pub browser: String,
    pub version: String,
    pub headless: bool,
    pub operating_system: String,
    pub screen: Screen,
    pub resource_limits: ResourceLimits,
    pub environment: HashMap<String, String>,
    pub profile_id: Option<String>,
    pub provider: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionFilter {
    pub work_pool_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
}

fn row_to_session(row: sqlx::postgres::PgRow) -> StoreResult<Session> {
    let status_str: String = row.try_get("status").map_err(anyhow::Error::from)?;
    let status = SessionStatus::parse(&status_str).ok_or_else(|| {
        StoreError::Internal(anyhow::anyhow!("bad session status in row: {status_str}"))
    })?;
    let screen_json: Value = row.try_get("screen").map_err(anyhow::Error::from)?;
    let screen: Screen = serde_json::from_value(screen_json).map_err(anyhow::Error::from)?;
    let limits_json: Value = row.try_get("resource_limits").map_err(anyhow::Error::from)?;
    let resource_limits: ResourceLimits =
        serde_json::from_value(limits_json).map_err(anyhow::Error::from)?;
    let env_json: Value = row.try_get("environment").map_err(anyhow::Error::from)?;
    let environment: HashMap<String, String> =
        serde_json::from_value(env_json).map_err(anyhow::Error::from)?;

    Ok(Session {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        work_pool_id: row.try_get("work_pool_id").map_err(anyhow::Error::from)?,
        worker_id: row.try_get("worker_id").map_err(anyhow::Error::from)?,
        browser: row.try_get("browser").map_err(anyhow::Error::from)?,
        version: row.try_get("version").map_err(anyhow::Error::from)?,
        headless: row.try_get("headless").map_err(anyhow::Error::from)?,
        operating_system: row.try_get("operating_system").map_err(anyhow::Error::from)?,
        screen,
        resource_limits,
        environment,
        profile_id: row.try_get("profile_id").map_err(anyhow::Error::from)?,
        provider: row.try_get("provider").map_err(anyhow::Error::from)?,
        status,
        container_id: row.try_get("container_id").map_err(anyhow::Error::from)?,
        ws_endpoint: row.try_get("ws_endpoint").map_err(anyhow::Error::from)?,
        live_url: row.try_get("live_url").map_err(anyhow::Error::from)?,
        expires_at: row.try_get("expires_at").map_err(anyhow::Error::from)?,
        created_at: row.try_get("created_at").map_err(anyhow::Error::from)?,
        updated_at: row.try_get("updated_at").map_err(anyhow::Error::from)?,
    })
}

pub async fn create_session(pool: &PgPool, new: NewSession) -> StoreResult<Session> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let screen_json = serde_json::to_value(&new.screen).map_err(anyhow::Error::from)?;
    let limits_json = serde_json::to_value(&new.resource_limits).map_err(anyhow::Error::from)?;
    let env_json = serde_json::to_value(&new.environment).map_err(anyhow::Error::from)?;

    let row = sqlx::query(
        r#"
        insert into sessions (
          id, work_pool_id, browser, version, headless, operating_system,
          screen, resource_limits, environment, profile_id, provider, status,
          expires_at, created_at, updated_at
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12, $13, $13
        )
        returning *
        "#,
    )
    .bind(id)
    .bind(new.work_pool_id)
    .bind(&new.browser)
    .bind(&new.version)
    .bind(new.headless)
    .bind(&new.operating_system)
    .bind(&screen_json)
    .bind(&limits_json)
    .bind(&env_json)
    .bind(&new.profile_id)
    .bind(&new.provider)
    .bind(new.expires_at)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_session(row)
}

pub async fn get_session(pool: &PgPool, id: Uuid) -> StoreResult<Session> {
    let row = sqlx::query("select * from sessions where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "session",
            id: id.to_string(),
        })?;
    row_to_session(row)
}

pub async fn list_sessions(
    pool: &PgPool,
    filter: SessionFilter,
    paging: Paging,
) -> StoreResult<Page<Session>> {
    let status_filter = filter.status.map(|s| s.as_str().to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        select count(*) from sessions
        where ($1::uuid is null or work_pool_id = $1)
          and ($2::text is null or status = $2)
        "#,
    )
    .bind(filter.work_pool_id)
    .bind(&status_filter)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    let rows = sqlx::query(
        r#"
        select * from sessions
        where ($1::uuid is null or work_pool_id = $1)
          and ($2::text is null or status = $2)
        order by created_at desc
        offset $3 limit $4
        "#,
    )
    .bind(filter.work_pool_id)
    .bind(&status_filter)
    .bind(paging.offset)
    .bind(paging.limit)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;

    let items = rows
        .into_iter()
        .map(row_to_session)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(Page { items, total })
}

/// Direct status write. Per §4.3, permitted only from provisioning code
/// paths (the session handler) and cleanup (the reconciler) — never from
/// HTTP handlers, which must go through `POST /sessions/{id}/events`.
///
/// Enforces P2 via [`bg_types::transitions::apply_run_transition`]-style
/// idempotent terminal handling: re-applying the session's current terminal
/// status is a silent no-op.
pub async fn update_session_status(
    pool: &PgPool,
    id: Uuid,
    status: SessionStatus,
) -> StoreResult<Session> {
    let current = get_session(pool, id).await?;
    if current.status.is_terminal() {
        if current.status == status {
            return Ok(current);
        }
        return Err(StoreError::Conflict(format!(
            "session {id} already terminal ({:?}), cannot move to {:?}",
            current.status, status
        )));
    }

    let now = Utc::now();
    let row = sqlx::query("update sessions set status = $2, updated_at = $3 where id = $1 returning *")
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(StoreError::from)?;
    row_to_session(row)
}

/// Persist discovered endpoints and container handle (§4.5 step 2-3).
pub async fn set_session_provider_handle(
    pool: &PgPool,
    id: Uuid,
    container_id: &str,
    ws_endpoint: &str,
    live_url: &str,
) -> StoreResult<Session> {
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        update sessions set
          container_id = $2, ws_endpoint = $3, live_url = $4, updated_at = $5
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(container_id)
    .bind(ws_endpoint)
    .bind(live_url)
    .bind(now)
    .fetch_optional(pool)
    .await
    .map_err(StoreError::from)?
    .ok_or_else(|| StoreError::NotFound {
        entity: "session",
        id: id.to_string(),
    })?;
    row_to_session(row)
}

pub async fn assign_worker(pool: &PgPool, id: Uuid, worker_id: Uuid) -> StoreResult<Session> {
    let now = Utc::now();
    let row = sqlx::query("update sessions set worker_id = $2, updated_at = $3 where id = $1 returning *")
        .bind(id)
        .bind(worker_id)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "session",
            id: id.to_string(),
        })?;
    row_to_session(row)
}

pub async fn delete_session(pool: &PgPool, id: Uuid) -> StoreResult<()> {
    let result = sqlx::query("delete from sessions where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::from)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "session",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Sessions in `{starting, running, idle}` for a pool, for the reconciler's
/// `active` partition (§4.7 step 1).
pub async fn count_active_and_pending(pool: &PgPool, work_pool_id: Uuid) -> StoreResult<(i64, i64)> {
    let active: i64 = sqlx::query_scalar(
        "select count(*) from sessions where work_pool_id = $1 and status in ('starting','running','idle')",
    )
    .bind(work_pool_id)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    let pending: i64 = sqlx::query_scalar(
        "select count(*) from sessions where work_pool_id = $1 and status = 'pending'",
    )
    .bind(work_pool_id)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    Ok((active, pending))
}

/// Idle sessions whose `updated_at` predates `now - max_idle_time` (§4.7
/// step 4).
pub async fn list_idle_expired(
    pool: &PgPool,
    work_pool_id: Uuid,
    max_idle_time_secs: i64,
) -> StoreResult<Vec<Session>> {
    let cutoff = Utc::now() - Duration::seconds(max_idle_time_secs);
    let rows = sqlx::query(
        "select * from sessions where work_pool_id = $1 and status = 'idle' and updated_at < $2",
    )
    .bind(work_pool_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_session).collect()
}

/// Sessions in `{starting, running, idle}` with a null worker or a worker
/// whose heartbeat is stale, plus sessions stuck in `starting` for more than
/// 10 minutes (§4.7 step 5).
pub async fn list_orphaned(
    pool: &PgPool,
    work_pool_id: Uuid,
    worker_ttl_secs: i64,
) -> StoreResult<Vec<Session>> {
    let worker_cutoff = Utc::now() - Duration::seconds(worker_ttl_secs);
    let starting_cutoff = Utc::now() - Duration::minutes(10);

    let rows = sqlx::query(
        r#"
        select s.* from sessions s
        left join workers w on w.id = s.worker_id
        where s.work_pool_id = $1
          and s.status in ('starting', 'running', 'idle')
          and (
            s.worker_id is null
            or w.last_beat < $2
            or (s.status = 'starting' and s.updated_at < $3)
          )
        "#,
    )
    .bind(work_pool_id)
    .bind(worker_cutoff)
    .bind(starting_cutoff)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_session).collect()
}

/// Delete terminal sessions older than `max_age` (§4.7 step 6).
pub async fn delete_terminal_older_than(pool: &PgPool, max_age: Duration) -> StoreResult<u64> {
    let cutoff = Utc::now() - max_age;
    let result = sqlx::query(
        r#"
        delete from sessions
        where status in ('completed','failed','expired','crashed','timed_out','terminated')
          and created_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await
    .map_err(StoreError::from)?;
    Ok(result.rows_affected())
}
