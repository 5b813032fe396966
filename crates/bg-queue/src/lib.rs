//! Task queue (§4.4, C4): a Postgres-backed outbox. Producers enqueue a
//! `TaskKind`; workers claim a batch from one named queue with
//! `FOR UPDATE SKIP LOCKED` so two dispatchers never claim the same row,
//! then report back success (`complete`) or failure (`retry`, which either
//! reschedules the row or dead-letters it once retries are exhausted).
//!
//! The claim/complete split is the same single-dispatcher-invariant shape
//! `mqk-db`'s order outbox uses: a row is only ever touched by the worker
//! that currently holds its claim.

pub mod error;
pub mod task;

pub use error::{QueueError, QueueResult};
pub use task::{QueueName, Task, TaskKind};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Default claim visibility timeout (§4.4's "configurable per-task
/// `max_retries` and `timeout` (visibility)"): a row claimed longer than
/// this ago without being completed or retried is assumed to belong to a
/// dispatcher that crashed or hung, and becomes reclaimable again. Longer
/// than the longest single task's own budget (`bg-executor`'s 5-minute
/// session-ready wait is the longest in this workspace) so a healthy,
/// still-working dispatcher never loses its own claim mid-task.
pub const DEFAULT_CLAIM_VISIBILITY_TIMEOUT: Duration = Duration::minutes(10);

/// Enqueue a task onto `queue` (or the task kind's default queue, if the
/// caller passes `None`), with `max_retries` (or the task kind's default,
/// if the caller passes `None`). Returns the new task id.
pub async fn enqueue(
    pool: &PgPool,
    kind: &TaskKind,
    queue: Option<QueueName>,
    max_retries: Option<i32>,
) -> QueueResult<Uuid> {
    let id = Uuid::new_v4();
    let queue = queue.unwrap_or_else(|| kind.default_queue());
    let max_retries = max_retries.unwrap_or_else(|| kind.default_max_retries());

    sqlx::query(
        r#"
        insert into outbox_tasks (id, queue, task_type, payload, max_retries)
        values ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(queue.as_str().into_owned())
    .bind(kind.type_name())
    .bind(kind.to_payload())
    .bind(max_retries)
    .execute(pool)
    .await
    .context("enqueue failed")?;

    Ok(id)
}

/// Atomically claim up to `batch_size` visible, undone rows from `queue`.
/// A row is visible once `visible_at <= now()`. A row already claimed by
/// someone else is also eligible once its claim is older than
/// `visibility_timeout` — the claimant never reported back (crashed or
/// hung), so the row is reclaimed under a new `claimed_by` rather than
/// stuck forever.
pub async fn claim_batch(
    pool: &PgPool,
    queue: QueueName,
    batch_size: i64,
    claimed_by: &str,
    visibility_timeout: Duration,
) -> QueueResult<Vec<Task>> {
    let reclaim_cutoff = Utc::now() - visibility_timeout;
    let rows = sqlx::query(
        r#"
        with to_claim as (
            select id
            from outbox_tasks
            where queue = $1
              and not done
              and visible_at <= now()
              and (claimed_by is null or claimed_at < $4)
            order by enqueue_time asc
            limit $2
            for update skip locked
        )
        update outbox_tasks
           set claimed_by = $3,
               claimed_at = now()
         where id in (select id from to_claim)
        returning id, queue, task_type, payload, enqueue_time, visible_at,
                  attempts, max_retries, claimed_by, claimed_at, done
        "#,
    )
    .bind(queue.as_str().into_owned())
    .bind(batch_size)
    .bind(claimed_by)
    .bind(reclaim_cutoff)
    .fetch_all(pool)
    .await
    .context("claim_batch failed")?;

    rows.into_iter().map(row_to_task).collect()
}

/// Mark a claimed task done. Returns `Err(NotClaimed)` if the task wasn't
/// claimed (guards against a worker that lost its claim completing stale
/// work).
pub async fn complete(pool: &PgPool, id: Uuid, claimed_by: &str) -> QueueResult<()> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        update outbox_tasks
           set done = true
         where id = $1
           and claimed_by = $2
           and not done
        returning id
        "#,
    )
    .bind(id)
    .bind(claimed_by)
    .fetch_optional(pool)
    .await
    .context("complete failed")?;

    row.map(|_| ()).ok_or(QueueError::NotClaimed(id))
}

/// Report a failed attempt. If the task has exhausted `max_retries` it is
/// dead-lettered (`done = true`, left with its final `attempts` count so a
/// caller can tell a dead letter from a successful completion via
/// `Task::exhausted`); otherwise the claim is released and `visible_at` is
/// pushed out by `backoff`.
pub async fn retry(
    pool: &PgPool,
    id: Uuid,
    claimed_by: &str,
    backoff: Duration,
) -> QueueResult<Task> {
    let next_visible_at = Utc::now() + backoff;
    let row = sqlx::query(
        r#"
        update outbox_tasks
           set attempts   = attempts + 1,
               claimed_by = null,
               claimed_at = null,
               visible_at = $3,
               done       = (attempts + 1) >= max_retries
         where id = $1
           and claimed_by = $2
        returning id, queue, task_type, payload, enqueue_time, visible_at,
                  attempts, max_retries, claimed_by, claimed_at, done
        "#,
    )
    .bind(id)
    .bind(claimed_by)
    .bind(next_visible_at)
    .fetch_optional(pool)
    .await
    .context("retry failed")?
    .ok_or(QueueError::NotClaimed(id))?;

    row_to_task(row)
}

/// Pending (not done) tasks for a queue, regardless of claim state — used
/// by the reconciler to report backlog depth.
pub async fn pending_count(pool: &PgPool, queue: QueueName) -> QueueResult<i64> {
    let row: (i64,) = sqlx::query_as(
        "select count(*) from outbox_tasks where queue = $1 and not done",
    )
    .bind(queue.as_str().into_owned())
    .fetch_one(pool)
    .await
    .context("pending_count failed")?;
    Ok(row.0)
}

/// Delete done tasks older than `now - max_age` so the table doesn't grow
/// unbounded.
pub async fn cleanup_done_older_than(
    pool: &PgPool,
    now: DateTime<Utc>,
    max_age: Duration,
) -> QueueResult<u64> {
    let cutoff = now - max_age;
    let result = sqlx::query("delete from outbox_tasks where done and enqueue_time < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .context("cleanup_done_older_than failed")?;
    Ok(result.rows_affected())
}

fn row_to_task(row: sqlx::postgres::PgRow) -> QueueResult<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        queue: row.try_get("queue")?,
        task_type: row.try_get("task_type")?,
        payload: row.try_get("payload")?,
        enqueue_time: row.try_get("enqueue_time")?,
        visible_at: row.try_get("visible_at")?,
        attempts: row.try_get("attempts")?,
        max_retries: row.try_get("max_retries")?,
        claimed_by: row.try_get("claimed_by")?,
        claimed_at: row.try_get("claimed_at")?,
        done: row.try_get("done")?,
    })
}

#[cfg(feature = "testkit")]
pub fn test_task_kind(session_id: Uuid) -> TaskKind {
    TaskKind::SessionStart {
        session_id,
        work_pool_id: Uuid::new_v4(),
        max_session_duration: 3600,
        queue_name: "test".to_string(),
    }
}
