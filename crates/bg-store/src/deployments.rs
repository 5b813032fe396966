use bg_types::{Deployment, DeploymentStatus};
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::paging::{Page, Paging};

pub struct NewDeployment {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub runtime: String,
    pub package_url: String,
    pub package_hash: String,
    pub config: Option<Value>,
}

#[derive(Default)]
pub struct DeploymentFilter {
    pub status: Option<DeploymentStatus>,
    pub runtime: Option<String>,
}

#[derive(Default)]
pub struct PatchDeployment {
    pub description: Option<String>,
    pub config: Option<Value>,
    pub status: Option<DeploymentStatus>,
}

fn row_to_deployment(row: sqlx::postgres::PgRow) -> StoreResult<Deployment> {
    let status_str: String = row.try_get("status").map_err(anyhow::Error::from)?;
    let status = DeploymentStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Internal(anyhow::anyhow!("bad status in row: {status_str}")))?;
    Ok(Deployment {
        id: row.try_get("id").map_err(anyhow::Error::from)?,
        name: row.try_get("name").map_err(anyhow::Error::from)?,
        description: row.try_get("description").map_err(anyhow::Error::from)?,
        version: row.try_get("version").map_err(anyhow::Error::from)?,
        runtime: row.try_get("runtime").map_err(anyhow::Error::from)?,
        package_url: row.try_get("package_url").map_err(anyhow::Error::from)?,
        package_hash: row.try_get("package_hash").map_err(anyhow::Error::from)?,
        config: row.try_get("config").map_err(anyhow::Error::from)?,
        status,
        created_at: row.try_get("created_at").map_err(anyhow::Error::from)?,
        updated_at: row.try_get("updated_at").map_err(anyhow::Error::from)?,
    })
}

/// Create a deployment. Rejects an empty name (§4.1 contract). Defaults
/// `config = {}` and `status = active` when not supplied.
pub async fn create_deployment(pool: &PgPool, new: NewDeployment) -> StoreResult<Deployment> {
    if new.name.trim().is_empty() {
        return Err(StoreError::Validation("deployment name must not be empty".into()));
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let config = new.config.unwrap_or_else(|| Value::Object(Default::default()));

    let row = sqlx::query(
        r#"
        insert into deployments (
          id, name, description, version, runtime, package_url, package_hash,
          config, status, created_at, updated_at
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9, $9)
        returning *
        "#,
    )
    .bind(id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.version)
    .bind(&new.runtime)
    .bind(&new.package_url)
    .bind(&new.package_hash)
    .bind(&config)
    .bind(now)
    .fetch_one(pool)
    .await?;

    row_to_deployment(row)
}

pub async fn get_deployment(pool: &PgPool, id: Uuid) -> StoreResult<Deployment> {
    let row = sqlx::query("select * from deployments where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "deployment",
            id: id.to_string(),
        })?;
    row_to_deployment(row)
}

/// `(name, version)` is the declared unique key (P4).
pub async fn get_deployment_by_name_version(
    pool: &PgPool,
    name: &str,
    version: &str,
) -> StoreResult<Deployment> {
    let row = sqlx::query("select * from deployments where name = $1 and version = $2")
        .bind(name)
        .bind(version)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "deployment",
            id: format!("{name}@{version}"),
        })?;
    row_to_deployment(row)
}

pub async fn list_deployments(
    pool: &PgPool,
    filter: DeploymentFilter,
    paging: Paging,
) -> StoreResult<Page<Deployment>> {
    let status_filter = filter.status.map(|s| s.as_str().to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        select count(*) from deployments
        where ($1::text is null or status = $1)
          and ($2::text is null or runtime = $2)
        "#,
    )
    .bind(&status_filter)
    .bind(&filter.runtime)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    let rows = sqlx::query(
        r#"
        select * from deployments
        where ($1::text is null or status = $1)
          and ($2::text is null or runtime = $2)
        order by created_at desc
        offset $3 limit $4
        "#,
    )
    .bind(&status_filter)
    .bind(&filter.runtime)
    .bind(paging.offset)
    .bind(paging.limit)
    .fetch_all(pool)
    .await
    .map_err(StoreError::from)?;

    let items = rows
        .into_iter()
        .map(row_to_deployment)
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Page { items, total })
}

/// Partial update. Refreshes `updated_at`. Errors distinctly on a missing
/// row (§4.1: the Open Question in §9 mandates error-on-not-found here,
/// unlike some paths in the original source).
pub async fn patch_deployment(
    pool: &PgPool,
    id: Uuid,
    patch: PatchDeployment,
) -> StoreResult<Deployment> {
    // Ensure the row exists first so a missing id is reported distinctly
    // from an underlying DB failure.
    get_deployment(pool, id).await?;

    let now = Utc::now();
    let status_str = patch.status.map(|s| s.as_str().to_string());

    let row = sqlx::query(
        r#"
        update deployments set
          description = coalesce($2, description),
          config = coalesce($3, config),
          status = coalesce($4, status),
          updated_at = $5
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(&patch.description)
    .bind(&patch.config)
    .bind(&status_str)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(StoreError::from)?;

    row_to_deployment(row)
}

pub async fn delete_deployment(pool: &PgPool, id: Uuid) -> StoreResult<()> {
    let result = sqlx::query("delete from deployments where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::from)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "deployment",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Deployments with `status = active`, used by the CLI/daemon to decide
/// whether a run may be triggered.
pub async fn get_active_deployments(pool: &PgPool) -> StoreResult<Vec<Deployment>> {
    let rows = sqlx::query("select * from deployments where status = 'active' order by created_at desc")
        .fetch_all(pool)
        .await
        .map_err(StoreError::from)?;
    rows.into_iter().map(row_to_deployment).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_default_touches_nothing() {
        let p = PatchDeployment::default();
        assert!(p.description.is_none());
        assert!(p.config.is_none());
        assert!(p.status.is_none());
    }
}
