//! Worker dispatcher loop (§4.4, §5): claims tasks off the outbox and
//! routes each by `TaskKind` to the handler crate that owns it. Polls
//! `critical` first, then each registered provider queue, then `default`,
//! then `low`, so a flood of cleanup work never starves a session start
//! (§4.4) — the same priority-tier shape the teacher's order-matching loop
//! gives to its own priority queues.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use bg_queue::{QueueName, Task, TaskKind};
use chrono::Duration as ChronoDuration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::state::AppState;

const BATCH_SIZE: i64 = 10;
const POLL_INTERVAL: StdDuration = StdDuration::from_secs(2);
const RETRY_BACKOFF: ChronoDuration = ChronoDuration::seconds(30);
/// `max_slots` a dispatcher process reports on its `Worker` row. Nothing in
/// this workspace schedules against it (unlike the spec's capacity-aware
/// placement, scale decisions only look at session counts), so it's a fixed
/// upper bound rather than a real measured capacity.
const WORKER_MAX_SLOTS: u32 = 64;

/// Runs until `cancel` fires. `claimed_by` should be unique per dispatcher
/// process (a hostname+pid style identity works; tests can pass anything).
/// `worker_id` is this dispatcher's own identity in the `workers` table
/// (§3) — it heartbeats itself for every pool it has started a session in,
/// so the reconciler's orphan sweep (§4.7 step 5) can tell "this session's
/// owning worker is dead" apart from "this session was never assigned a
/// worker at all" (which would otherwise mark it crashed within one tick).
pub async fn run_forever(state: Arc<AppState>, claimed_by: String, worker_id: Uuid, cancel: CancellationToken) {
    info!(%claimed_by, %worker_id, "task dispatcher starting");
    let mut known_pools: HashSet<Uuid> = HashSet::new();
    loop {
        if cancel.is_cancelled() {
            info!("task dispatcher shutting down");
            return;
        }

        for work_pool_id in known_pools.iter().copied() {
            if let Err(e) =
                bg_store::workers::heartbeat(&state.pool, worker_id, work_pool_id, WORKER_MAX_SLOTS).await
            {
                warn!(%worker_id, %work_pool_id, error = %e, "worker heartbeat failed");
            }
        }

        let claimed = tokio::select! {
            _ = cancel.cancelled() => return,
            n = run_tick(&state, &claimed_by, worker_id, &mut known_pools) => n,
        };

        if claimed == 0 {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }
}

/// One polling pass across every tier. Returns the number of tasks claimed
/// (used by [`run_forever`] to decide whether to back off before the next
/// pass).
async fn run_tick(state: &AppState, claimed_by: &str, worker_id: Uuid, known_pools: &mut HashSet<Uuid>) -> usize {
    let mut queues = vec![QueueName::Critical];
    queues.extend(state.providers.scheme_names().into_iter().map(QueueName::Provider));
    queues.push(QueueName::Default);
    queues.push(QueueName::Low);

    let mut claimed_total = 0usize;
    for queue in queues {
        let tasks = match bg_queue::claim_batch(
            &state.pool,
            queue.clone(),
            BATCH_SIZE,
            claimed_by,
            bg_queue::DEFAULT_CLAIM_VISIBILITY_TIMEOUT,
        )
        .await
        {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(%queue, error = %e, "claim_batch failed");
                continue;
            }
        };
        claimed_total += tasks.len();
        for task in tasks {
            dispatch_one(state, claimed_by, worker_id, known_pools, task).await;
        }
    }
    claimed_total
}

async fn dispatch_one(
    state: &AppState,
    claimed_by: &str,
    worker_id: Uuid,
    known_pools: &mut HashSet<Uuid>,
    task: Task,
) {
    let task_id = task.id;
    let kind = match task.kind() {
        Ok(k) => k,
        Err(e) => {
            error!(%task_id, error = %e, "task payload failed to parse; marking done to avoid a poison-pill loop");
            let _ = bg_queue::complete(&state.pool, task_id, claimed_by).await;
            return;
        }
    };

    let cancel = CancellationToken::new();
    let outcome = run_task(state, &kind, worker_id, known_pools, &cancel).await;

    match outcome {
        Ok(()) => {
            if let Err(e) = bg_queue::complete(&state.pool, task_id, claimed_by).await {
                warn!(%task_id, error = %e, "complete failed");
            }
        }
        Err(e) => {
            warn!(%task_id, kind = kind.type_name(), error = %e, "task failed; scheduling retry");
            match bg_queue::retry(&state.pool, task_id, claimed_by, RETRY_BACKOFF).await {
                Ok(retried) if retried.exhausted() => {
                    error!(%task_id, kind = kind.type_name(), "task dead-lettered after exhausting retries");
                    dead_letter(state, &kind).await;
                }
                Ok(_) => {}
                Err(e) => warn!(%task_id, error = %e, "retry failed"),
            }
        }
    }
}

/// §7: "after exhaustion, the handler marks the entity terminal." Routes
/// back through the owning handler's own terminalization path rather than
/// writing a status directly, so event history and `Retryable` classification
/// stay consistent with every other path into that entity.
async fn dead_letter(state: &AppState, kind: &TaskKind) {
    let result = match kind {
        TaskKind::SessionStart { session_id, .. } => bg_session::record_session_event(
            &state.pool,
            *session_id,
            bg_types::event::SessionEventKind::StartupFailed,
            Some(serde_json::json!({ "error": "task dead-lettered after exhausting retries" })),
        )
        .await
        .map(|_| ())
        .map_err(anyhow::Error::from),
        // A dead-lettered stop has already failed to tear the workload down
        // cleanly several times; forcing the session terminal anyway is more
        // correct than leaving it stuck non-terminal forever.
        TaskKind::SessionStop { session_id, .. } => bg_session::record_session_event(
            &state.pool,
            *session_id,
            bg_types::event::SessionEventKind::SessionTerminated,
            Some(serde_json::json!({ "error": "task dead-lettered after exhausting retries" })),
        )
        .await
        .map(|_| ())
        .map_err(anyhow::Error::from),
        TaskKind::DeploymentRun { run_id, .. } => bg_store::runs::complete_run(
            &state.pool,
            *run_id,
            bg_types::run::RunStatus::Failed,
            serde_json::Value::Null,
            Some("task dead-lettered after exhausting retries".to_string()),
        )
        .await
        .map(|_| ())
        .map_err(anyhow::Error::from),
        // Pool scale/cleanup ticks have no single entity to terminalize —
        // the next reconciler tick simply re-evaluates and re-enqueues.
        TaskKind::PoolScale { .. } | TaskKind::CleanupExpired { .. } => Ok(()),
    };
    if let Err(e) = result {
        error!(error = %e, "failed to terminalize entity after dead-letter");
    }
}

async fn run_task(
    state: &AppState,
    kind: &TaskKind,
    worker_id: Uuid,
    known_pools: &mut HashSet<Uuid>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match kind {
        TaskKind::SessionStart {
            session_id,
            work_pool_id,
            queue_name,
            ..
        } => {
            // Nil is the ad-hoc, run-provisioned-session sentinel (no real
            // pool, see bg-executor); those sessions are never subject to
            // the reconciler's pool-scoped orphan sweep, so there's nothing
            // to assign them a worker against.
            if *work_pool_id != Uuid::nil() {
                bg_store::workers::heartbeat(&state.pool, worker_id, *work_pool_id, WORKER_MAX_SLOTS).await?;
                bg_store::sessions::assign_worker(&state.pool, *session_id, worker_id).await?;
                known_pools.insert(*work_pool_id);
            }
            let provider = resolve_provider(state, queue_name)?;
            bg_session::handle_session_start(&state.pool, &provider, *session_id).await?;
            Ok(())
        }
        TaskKind::SessionStop { session_id, reason } => {
            let session = bg_store::sessions::get_session(&state.pool, *session_id).await?;
            let provider = resolve_provider(state, &session.provider)?;
            bg_session::handle_session_stop(&state.pool, &provider, *session_id, reason).await?;
            Ok(())
        }
        TaskKind::DeploymentRun {
            run_id,
            environment,
            config,
            ..
        } => {
            state
                .executor
                .handle_deployment_run(*run_id, environment, config, cancel)
                .await?;
            Ok(())
        }
        TaskKind::PoolScale {
            work_pool_id,
            desired_sessions,
        } => {
            bg_reconcile::handle_pool_scale(&state.pool, *work_pool_id, *desired_sessions).await?;
            Ok(())
        }
        TaskKind::CleanupExpired { max_age_hours } => {
            bg_reconcile::handle_cleanup_expired(&state.pool, *max_age_hours).await?;
            Ok(())
        }
    }
}

fn resolve_provider(state: &AppState, scheme: &str) -> anyhow::Result<Arc<dyn bg_provider::Provider>> {
    state
        .provider_for(scheme)
        .or_else(|| state.provider_for(&state.default_provider_scheme))
        .ok_or_else(|| anyhow::anyhow!("no provider registered for scheme '{scheme}'"))
}

/// A claim identity unique to this process, used as `claimed_by`.
pub fn new_claimant_id() -> String {
    format!("bg-daemon-{}", Uuid::new_v4())
}
