//! Transactional CRUD over the control-plane entities (§4.1, C2).
//!
//! All DB errors propagate through [`error::StoreError`]; callers translate
//! `NotFound` to a 404, `Conflict`/`Validation` to 400/409, everything else
//! to 500 (§7). The store performs no in-process locking — row updates are
//! the only fence (§5).

pub mod deployments;
pub mod error;
pub mod events;
pub mod paging;
pub mod pools;
pub mod runs;
pub mod sessions;
pub mod workers;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub const ENV_DB_URL: &str = "BROWSERGRID_DATABASE_URL";

/// Connect to Postgres using `BROWSERGRID_DATABASE_URL`.
pub async fn connect_from_env() -> anyhow::Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_core_tables: bool,
}

pub async fn status(pool: &PgPool) -> anyhow::Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'deployments'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_core_tables: exists,
    })
}

pub use error::{StoreError, StoreResult};
pub use paging::{Page, Paging};
