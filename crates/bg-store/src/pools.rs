use bg_types::WorkPool;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub struct NewWorkPool {
    pub name: String,
    pub provider: String,
    pub min_size: u32,
    pub max_concurrency: u32,
    pub auto_scale: bool,
    pub max_idle_time: i64,
    pub max_session_duration: i64,
    pub default_image: Option<String>,
    pub default_env: Option<Value>,
}

/// Partial update, primarily used by the CLI's `scale` command (min_size /
/// max_concurrency) and by pausing/resuming auto-scale.
#[derive(Default)]
pub struct PatchWorkPool {
    pub min_size: Option<u32>,
    pub max_concurrency: Option<u32>,
    pub auto_scale: Option<bool>,
    pub paused: Option<bool>,
}

fn row_to_pool(row: sqlx::postgres::PgRow) -> StoreResult<WorkPool> {
    Ok(WorkPool {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        name: row.try_get("name").map_err(anyhow::Error::from)?,
        provider: row.try_get("provider").map_err(anyhow::Error::from)?,
        min_size: row.try_get::<i32, _>("min_size").map_err(anyhow::Error::from)? as u32,
        max_concurrency: row
            .try_get::<i32, _>("max_concurrency")
            .map_err(anyhow::Error::from)? as u32,
        auto_scale: row.try_get("auto_scale").map_err(anyhow::Error::from)?,
        paused: row.try_get("paused").map_err(anyhow::Error::from)?,
        max_idle_time: row.try_get("max_idle_time").map_err(anyhow::Error::from)?,
        max_session_duration: row
            .try_get("max_session_duration")
            .map_err(anyhow::Error::from)?,
        default_image: row.try_get("default_image").map_err(anyhow::Error::from)?,
        default_env: row.try_get("default_env").map_err(anyhow::Error::from)?,
    })
}

pub async fn create_pool(pool: &PgPool, new: NewWorkPool) -> StoreResult<WorkPool> {
    if new.min_size > new.max_concurrency {
        return Err(StoreError::Validation(format!(
            "min_size ({}) must be <= max_concurrency ({})",
            new.min_size, new.max_concurrency
        )));
    }
    let id = Uuid::new_v4();
    let env = new.default_env.unwrap_or_else(|| Value::Object(Default::default()));
    let row = sqlx::query(
        r#"
        insert into work_pools (
          id, name, provider, min_size, max_concurrency, auto_scale,
          max_idle_time, max_session_duration, default_image, default_env
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        returning *
        "#,
    )
    .bind(id)
    .bind(&new.name)
    .bind(&new.provider)
    .bind(new.min_size as i32)
    .bind(new.max_concurrency as i32)
    .bind(new.auto_scale)
    .bind(new.max_idle_time)
    .bind(new.max_session_duration)
    .bind(&new.default_image)
    .bind(&env)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_pool(row)
}

pub async fn get_pool(pool: &PgPool, id: Uuid) -> StoreResult<WorkPool> {
    let row = sqlx::query("select * from work_pools where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "work_pool",
            id: id.to_string(),
        })?;
    row_to_pool(row)
}

/// Every pool eligible for reconciliation (`paused = false`), used by the
/// reconciler tick (§4.7).
pub async fn list_active_pools(pool: &PgPool) -> StoreResult<Vec<WorkPool>> {
    let rows = sqlx::query("select * from work_pools where paused = false")
        .fetch_all(pool)
        .await
        .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_pool).collect()
}

/// Every pool, paused or not — the HTTP listing (`GET /pools`) needs the
/// full set, unlike the reconciler tick's `list_active_pools`.
pub async fn list_pools(pool: &PgPool) -> StoreResult<Vec<WorkPool>> {
    let rows = sqlx::query("select * from work_pools order by name")
        .fetch_all(pool)
        .await
        .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_pool).collect()
}

/// Partial update. Re-validates `min_size <= max_concurrency` against the
/// merged values, same invariant `create_pool` enforces.
pub async fn patch_pool(pool: &PgPool, id: Uuid, patch: PatchWorkPool) -> StoreResult<WorkPool> {
    let current = get_pool(pool, id).await?;
    let min_size = patch.min_size.unwrap_or(current.min_size);
    let max_concurrency = patch.max_concurrency.unwrap_or(current.max_concurrency);
    if min_size > max_concurrency {
        return Err(StoreError::Validation(format!(
            "min_size ({min_size}) must be <= max_concurrency ({max_concurrency})"
        )));
    }

    let row = sqlx::query(
        r#"
        update work_pools set
          min_size = $2,
          max_concurrency = $3,
          auto_scale = coalesce($4, auto_scale),
          paused = coalesce($5, paused)
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(min_size as i32)
    .bind(max_concurrency as i32)
    .bind(patch.auto_scale)
    .bind(patch.paused)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;
    row_to_pool(row)
}

pub async fn delete_pool(pool: &PgPool, id: Uuid) -> StoreResult<()> {
    let result = sqlx::query("delete from work_pools where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::from)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "work_pool",
            id: id.to_string(),
        });
    }
    Ok(())
}
