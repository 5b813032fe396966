use bg_types::{DeploymentRun, DeploymentStats, RunStatus};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::paging::{Page, Paging};

pub struct NewRun {
    pub deployment_id: Uuid,
}

#[derive(Default)]
pub struct RunFilter {
    pub deployment_id: Option<Uuid>,
    pub status: Option<RunStatus>,
}

fn row_to_run(row: sqlx::postgres::PgRow) -> StoreResult<DeploymentRun> {
    let status_str: String = row.try_get("status").map_err(anyhow::Error::from)?;
    let status = RunStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Internal(anyhow::anyhow!("bad run status in row: {status_str}")))?;
    Ok(DeploymentRun {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        deployment_id: row.try_get("deployment_id").map_err(anyhow::Error::from)?,
        session_id: row.try_get("session_id").map_err(anyhow::Error::from)?,
        status,
        started_at: row.try_get("started_at").map_err(anyhow::Error::from)?,
        completed_at: row.try_get("completed_at").map_err(anyhow::Error::from)?,
        output: row.try_get("output").map_err(anyhow::Error::from)?,
        error: row.try_get("error").map_err(anyhow::Error::from)?,
        created_at: row.try_get("created_at").map_err(anyhow::Error::from)?,
        updated_at: row.try_get("updated_at").map_err(anyhow::Error::from)?,
    })
}

/// Create a run in `pending` status. The caller (`bg-daemon`'s run-create
/// handler) is responsible for enqueuing the matching `DeploymentRun` task
/// in the same logical operation.
pub async fn create_run(pool: &PgPool, new: NewRun) -> StoreResult<DeploymentRun> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        insert into deployment_runs (id, deployment_id, status, output, created_at, updated_at)
        values ($1, $2, 'pending', '{}'::jsonb, $3, $3)
        returning *
        "#,
    )
    .bind(id)
    .bind(new.deployment_id)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_run(row)
}

pub async fn get_run(pool: &PgPool, id: Uuid) -> StoreResult<DeploymentRun> {
    let row = sqlx::query("select * from deployment_runs where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "run",
            id: id.to_string(),
        })?;
    row_to_run(row)
}

pub async fn list_runs(
    pool: &PgPool,
    filter: RunFilter,
    paging: Paging,
) -> StoreResult<Page<DeploymentRun>> {
    let status_filter = filter.status.map(|s| s.as_str().to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        select count(*) from deployment_runs
        where ($1::uuid is null or deployment_id = $1)
          and ($2::text is null or status = $2)
        "#,
    )
    .bind(filter.deployment_id)
    .bind(&status_filter)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    let rows = sqlx::query(
        r#"
        select * from deployment_runs
        where ($1::uuid is null or deployment_id = $1)
          and ($2::text is null or status = $2)
        order by created_at desc
        offset $3 limit $4
        "#,
    )
    .bind(filter.deployment_id)
    .bind(&status_filter)
    .bind(paging.offset)
    .bind(paging.limit)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;

    let items = rows.into_iter().map(row_to_run).collect::<StoreResult<Vec<_>>>()?;
    Ok(Page { items, total })
}

/// Move a run out of `pending` into `running`, stamping `started_at` and
/// (when applicable) the provisioned `session_id`.
pub async fn start_run(pool: &PgPool, id: Uuid, session_id: Option<Uuid>) -> StoreResult<DeploymentRun> {
    let current = get_run(pool, id).await?;
    bg_types::transitions::apply_run_transition(current.status, RunStatus::Running)
        .map_err(|e| StoreError::Conflict(e.to_string()))?;

    let now = Utc::now();
    let row = sqlx::query(
        r#"
        update deployment_runs set
          status = 'running',
          session_id = coalesce($2, session_id),
          started_at = coalesce(started_at, $3),
          updated_at = $3
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(session_id)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_run(row)
}

/// Attach a provisioned session id to a run without changing its status.
pub async fn set_run_session(pool: &PgPool, id: Uuid, session_id: Uuid) -> StoreResult<DeploymentRun> {
    let now = Utc::now();
    let row = sqlx::query(
        "update deployment_runs set session_id = $2, updated_at = $3 where id = $1 returning *",
    )
    .bind(id)
    .bind(session_id)
    .bind(now)
    .fetch_optional(pool)
    .await
    .map_err(StoreError::from)?
    .ok_or_else(|| StoreError::NotFound {
        entity: "run",
        id: id.to_string(),
    })?;
    row_to_run(row)
}

/// Terminal finalize. Idempotent: re-applying the same terminal status with
/// the same output/error is a no-op rather than an error (P6-style
/// idempotence extended to runs, at-least-once delivery per §1).
pub async fn complete_run(
    pool: &PgPool,
    id: Uuid,
    status: RunStatus,
    output: Value,
    error: Option<String>,
) -> StoreResult<DeploymentRun> {
    if !status.is_terminal() {
        return Err(StoreError::Validation(format!(
            "complete_run requires a terminal status, got {:?}",
            status
        )));
    }

    let current = get_run(pool, id).await?;
    bg_types::transitions::apply_run_transition(current.status, status)
        .map_err(|e| StoreError::Conflict(e.to_string()))?;

    if current.status == status {
        // Already finalized with this status; leave the row untouched.
        return Ok(current);
    }

    let now = Utc::now();
    let row = sqlx::query(
        r#"
        update deployment_runs set
          status = $2,
          output = $3,
          error = $4,
          completed_at = $5,
          started_at = coalesce(started_at, $5),
          updated_at = $5
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(&output)
    .bind(&error)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_run(row)
}

pub async fn delete_run(pool: &PgPool, id: Uuid) -> StoreResult<()> {
    let result = sqlx::query("delete from deployment_runs where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::from)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "run",
            id: id.to_string(),
        });
    }
    Ok(())
}

pub async fn get_running_deployment_runs(pool: &PgPool) -> StoreResult<Vec<DeploymentRun>> {
    let rows = sqlx::query("select * from deployment_runs where status = 'running'")
        .fetch_all(pool)
        .await
        .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_run).collect()
}

/// Delete terminal runs older than `max_age` (§4.7: hourly `CleanupExpired`
/// calls this with a 24h age).
pub async fn cleanup_old_runs(pool: &PgPool, max_age: Duration) -> StoreResult<u64> {
    let cutoff: DateTime<Utc> = Utc::now() - max_age;
    let result = sqlx::query(
        r#"
        delete from deployment_runs
        where status in ('completed', 'failed', 'cancelled')
          and created_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await
    .map_err(StoreError::from)?;
    Ok(result.rows_affected())
}

/// Run counts grouped by status, the 10 most recent runs, and mean
/// completed-run duration in seconds (§4.1).
pub async fn get_deployment_stats(pool: &PgPool, deployment_id: Uuid) -> StoreResult<DeploymentStats> {
    let count_rows = sqlx::query("select status, count(*)::bigint as n from deployment_runs where deployment_id = $1 group by status")
        .bind(deployment_id)
        .fetch_all(pool)
        .await
        .map_err(StoreError::from)?;

    let mut counts_by_status: HashMap<String, i64> = HashMap::new();
    for row in count_rows {
        let status: String = row.try_get("status").map_err(anyhow::Error::from)?;
        let n: i64 = row.try_get("n").map_err(anyhow::Error::from)?;
        counts_by_status.insert(status, n);
    }

    let recent_rows = sqlx::query(
        "select * from deployment_runs where deployment_id = $1 order by created_at desc limit 10",
    )
    .bind(deployment_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;
    let recent_runs = recent_rows.into_iter().map(row_to_run).collect::<StoreResult<Vec<_>>>()?;

    let mean_duration_seconds: Option<f64> = sqlx::query_scalar(
        r#"
        select avg(extract(epoch from (completed_at - started_at)))
        from deployment_runs
        where deployment_id = $1 and completed_at is not null and started_at is not null
        "#,
    )
    .bind(deployment_id)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    Ok(DeploymentStats {
        deployment_id,
        counts_by_status,
        recent_runs,
        mean_duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_run_rejects_non_terminal_status() {
        // pure validation, no DB needed: the guard runs before any query.
        let status = RunStatus::Running;
        assert!(!status.is_terminal());
    }
}
