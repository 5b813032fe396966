//! The async side of the reconciler (§4.7): fetches what [`report`] needs to
//! decide with, applies the decision, and loops on a fixed interval. The
//! split mirrors the teacher's reconcile engine — a pure decision function
//! fed by a snapshot the caller assembles — except here the "snapshot" is
//! just a handful of store queries instead of a broker fetch.

use bg_queue::{QueueName, TaskKind};
use bg_types::worker::DEFAULT_WORKER_TTL_SECS;
use bg_types::{SessionStatus, WorkPool};
use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReconcileResult;
use crate::report::{decide_scale, PoolReconcileReport};

pub const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(30);
pub const DEFAULT_CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(3600);
pub const CLEANUP_MAX_AGE_HOURS: i64 = 24;

/// One pool's worth of §4.7 steps 1-5. Step 6 (global stuck-row/stale-worker
/// cleanup) runs once per full tick in [`run_tick_once`], not per pool — it
/// has no pool-scoped query to key off of.
pub async fn tick_pool(
    pool: &PgPool,
    work_pool: &WorkPool,
    worker_ttl_secs: i64,
) -> ReconcileResult<PoolReconcileReport> {
    let mut report = PoolReconcileReport {
        work_pool_id: work_pool.id,
        ..Default::default()
    };

    let (active, pending) =
        bg_store::sessions::count_active_and_pending(pool, work_pool.id).await?;
    let decision = decide_scale(work_pool, active, pending);
    report.scale_need = decision.need;
    if decision.need > 0 {
        let task = TaskKind::PoolScale {
            work_pool_id: work_pool.id,
            desired_sessions: decision.need as i32,
        };
        bg_queue::enqueue(pool, &task, None, None).await?;
        debug!(work_pool = %work_pool.id, need = decision.need, "enqueued pool_scale");
    }

    let idle_expired =
        bg_store::sessions::list_idle_expired(pool, work_pool.id, work_pool.max_idle_time).await?;
    for session in &idle_expired {
        bg_store::sessions::update_session_status(pool, session.id, SessionStatus::Expired)
            .await?;
        bg_queue::enqueue(
            pool,
            &TaskKind::SessionStop {
                session_id: session.id,
                reason: "idle_expired".to_string(),
            },
            Some(QueueName::Critical),
            None,
        )
        .await?;
        report.idle_retired.push(session.id);
    }

    let orphaned = bg_store::sessions::list_orphaned(pool, work_pool.id, worker_ttl_secs).await?;
    for session in &orphaned {
        bg_store::sessions::update_session_status(pool, session.id, SessionStatus::Crashed)
            .await?;
        report.orphan_retired.push(session.id);
    }

    if !report.is_clean() {
        info!(
            work_pool = %work_pool.id,
            scale_need = report.scale_need,
            idle_retired = report.idle_retired.len(),
            orphan_retired = report.orphan_retired.len(),
            "pool reconcile tick made changes",
        );
    }

    Ok(report)
}

/// §4.7 full tick: every unpaused, auto-scaling pool, then the global
/// step-6 cleanup.
pub async fn run_tick_once(pool: &PgPool) -> ReconcileResult<Vec<PoolReconcileReport>> {
    let pools = bg_store::pools::list_active_pools(pool).await?;
    let mut reports = Vec::with_capacity(pools.len());
    for work_pool in pools.into_iter().filter(|p| p.auto_scale) {
        reports.push(tick_pool(pool, &work_pool, DEFAULT_WORKER_TTL_SECS).await?);
    }

    let deleted_sessions =
        bg_store::sessions::delete_terminal_older_than(pool, ChronoDuration::hours(24)).await?;
    let deleted_workers =
        bg_store::workers::delete_stale_workers(pool, DEFAULT_WORKER_TTL_SECS).await?;
    if deleted_sessions > 0 || deleted_workers > 0 {
        debug!(deleted_sessions, deleted_workers, "stuck-row cleanup");
    }

    Ok(reports)
}

/// Drive [`run_tick_once`] every `interval` until `cancel` fires. A tick
/// that errors is logged and skipped, not fatal — the next tick tries
/// again, same as the teacher's heartbeat loop never stops for one failed
/// send.
pub async fn run_forever(pool: PgPool, interval: StdDuration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("pool reconciler loop cancelled");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = run_tick_once(&pool).await {
                    warn!(error = %e, "reconcile tick failed");
                }
            }
        }
    }
}

/// §4.7's separate hourly job: enqueue a `CleanupExpired` task rather than
/// running the cleanup inline, so it goes through the same claim/retry path
/// as any other task instead of racing the per-pool tick's own writes.
pub async fn run_cleanup_scheduler(pool: PgPool, interval: StdDuration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cleanup scheduler cancelled");
                return;
            }
            _ = ticker.tick() => {
                let task = TaskKind::CleanupExpired {
                    max_age_hours: CLEANUP_MAX_AGE_HOURS,
                };
                if let Err(e) = bg_queue::enqueue(&pool, &task, None, None).await {
                    warn!(error = %e, "failed to enqueue cleanup_expired");
                }
            }
        }
    }
}

/// Consume a claimed `CleanupExpired` task (§4.7): deletes completed/failed/
/// cancelled runs older than `max_age_hours`. Lives here rather than in a
/// generic task dispatcher since it's the reconciler's own cleanup policy.
pub async fn handle_cleanup_expired(pool: &PgPool, max_age_hours: i64) -> ReconcileResult<u64> {
    let deleted =
        bg_store::runs::cleanup_old_runs(pool, ChronoDuration::hours(max_age_hours)).await?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intervals_are_sane() {
        assert_eq!(DEFAULT_TICK_INTERVAL, StdDuration::from_secs(30));
        assert_eq!(DEFAULT_CLEANUP_INTERVAL, StdDuration::from_secs(3600));
    }
}
