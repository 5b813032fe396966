use bg_types::Worker;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

fn row_to_worker(row: sqlx::postgres::PgRow) -> StoreResult<Worker> {
    Ok(Worker {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        work_pool_id: row.try_get("work_pool_id").map_err(anyhow::Error::from)?,
        max_slots: row.try_get::<i32, _>("max_slots").map_err(anyhow::Error::from)? as u32,
        active: row.try_get::<i32, _>("active").map_err(anyhow::Error::from)? as u32,
        last_beat: row.try_get("last_beat").map_err(anyhow::Error::from)?,
    })
}

pub async fn heartbeat(pool: &PgPool, id: Uuid, work_pool_id: Uuid, max_slots: u32) -> StoreResult<Worker> {
    let row = sqlx::query(
        r#"
        insert into workers (id, work_pool_id, max_slots, active, last_beat)
        values ($1, $2, $3, 0, now())
        on conflict (id) do update set last_beat = now()
        returning *
        "#,
    )
    .bind(id)
    .bind(work_pool_id)
    .bind(max_slots as i32)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_worker(row)
}

/// Delete workers whose heartbeat is older than `3 * worker_ttl` (§4.7
/// step 6).
pub async fn delete_stale_workers(pool: &PgPool, worker_ttl_secs: i64) -> StoreResult<u64> {
    let cutoff = Utc::now() - Duration::seconds(3 * worker_ttl_secs);
    let result = sqlx::query("delete from workers where last_beat < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(StoreError::from)?;
    Ok(result.rows_affected())
}
