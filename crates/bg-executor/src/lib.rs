//! Deployment-run executor (§4.6, C7): drives a single `DeploymentRun`
//! through `pending → running → {completed, failed, cancelled}`. This is the
//! pipeline's busiest seam — artifact fetch, package extraction, optional
//! session provisioning, and the opaque runtime call all happen here — so it
//! is kept as a straight-line sequence of steps rather than spread across
//! helper traits, the same way `mqk-execution`'s order lifecycle functions
//! read top to bottom instead of hiding control flow in callbacks.

pub mod error;
pub mod extract;
pub mod manifest;
pub mod runtime;

pub use error::{ExecutorError, ExecutorResult};
pub use runtime::{ExecutionOutcome, ProcessRuntimeExecutor, RuntimeExecutor};
#[cfg(feature = "testkit")]
pub use runtime::FakeRuntimeExecutor;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use bg_queue::{QueueName, TaskKind};
use bg_store::sessions::NewSession;
use bg_types::config::DeploymentConfig;
use bg_types::event::SessionEventKind;
use bg_types::run::RunStatus;
use bg_types::session::SessionStatus;
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Whether a `DeploymentRun` task should be retried once this run's
/// terminal outcome has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryable {
    Transient,
    Permanent,
}

const SESSION_WAIT_BUDGET: StdDuration = StdDuration::from_secs(5 * 60);
const SESSION_WAIT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(5);

pub struct DeploymentExecutor {
    pool: PgPool,
    artifact_store: Arc<dyn bg_artifacts::ArtifactStore>,
    runtime_executor: Arc<dyn RuntimeExecutor>,
    default_provider: String,
    work_dir: PathBuf,
}

impl DeploymentExecutor {
    pub fn new(
        pool: PgPool,
        artifact_store: Arc<dyn bg_artifacts::ArtifactStore>,
        runtime_executor: Arc<dyn RuntimeExecutor>,
        default_provider: impl Into<String>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            artifact_store,
            runtime_executor,
            default_provider: default_provider.into(),
            work_dir,
        }
    }

    /// Consume a `TaskKind::DeploymentRun` task. `task_environment`/
    /// `task_config` are the per-trigger overrides carried on the task
    /// (§4.4); they're shallow-merged over the deployment's stored defaults.
    pub async fn handle_deployment_run(
        &self,
        run_id: Uuid,
        task_environment: &serde_json::Map<String, Value>,
        task_config: &Value,
        cancel: &CancellationToken,
    ) -> ExecutorResult<()> {
        let run = bg_store::runs::get_run(&self.pool, run_id)
            .await
            .map_err(|_| ExecutorError::EntityMissing("run"))?;
        if run.status.is_terminal() {
            // Already finalized by a previous delivery of this task (P6):
            // ACK without redoing work.
            return Ok(());
        }

        let deployment = bg_store::deployments::get_deployment(&self.pool, run.deployment_id)
            .await
            .map_err(|_| ExecutorError::EntityMissing("deployment"))?;

        bg_store::runs::start_run(&self.pool, run_id, None).await?;

        let config = merge_config(&deployment.config, task_config);
        let environment = merge_environment(&config.environment, task_environment);

        let extract_dir = self.work_dir.join("extracted").join(run_id.to_string());
        let mut session_id: Option<Uuid> = None;

        let outcome = self
            .drive(
                run_id,
                &deployment.package_url,
                &deployment.package_hash,
                &deployment.runtime,
                &config,
                &environment,
                &extract_dir,
                &mut session_id,
                cancel,
            )
            .await;

        extract::cleanup_extract_dir(&extract_dir);
        self.finalize(run_id, session_id, outcome, cancel).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        run_id: Uuid,
        package_url: &str,
        package_hash: &str,
        runtime: &str,
        config: &DeploymentConfig,
        environment: &BTreeMap<String, String>,
        extract_dir: &Path,
        session_id: &mut Option<Uuid>,
        cancel: &CancellationToken,
    ) -> ExecutorResult<ExecutionOutcome> {
        // Step 2: fetch artifact.
        let packages_dir = self.work_dir.join("packages");
        tokio::fs::create_dir_all(&packages_dir)
            .await
            .map_err(|e| ExecutorError::Internal(anyhow::anyhow!("create packages dir failed: {e}")))?;
        let archive_path = self
            .artifact_store
            .fetch(package_url, package_hash, &packages_dir)
            .await?;

        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        // Step 3: extract into a fresh working directory.
        extract::cleanup_extract_dir(extract_dir);
        extract::extract_package(archive_path, extract_dir.to_path_buf()).await?;

        let mut run_environment = environment.clone();

        // Step 4: session provisioning, only if the deployment requests one.
        if let Some(browser_request) = config.browser_requests.first() {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }

            let session = self.provision_session(run_id, browser_request, cancel).await?;
            *session_id = Some(session.id);

            run_environment.insert(
                "BROWSER_WS_ENDPOINT".to_string(),
                session.ws_endpoint.clone().unwrap_or_default(),
            );
            run_environment.insert(
                "BROWSER_LIVE_URL".to_string(),
                session.live_url.clone().unwrap_or_default(),
            );
            run_environment.insert("BROWSER_SESSION_ID".to_string(), session.id.to_string());
        }

        manifest::write_env_manifest(extract_dir, &run_environment)
            .await
            .map_err(ExecutorError::Internal)?;

        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        // Step 5: execute, retrying transient failures up to config.max_retries.
        let timeout = StdDuration::from_secs(config.timeout_seconds);
        let mut attempt: u32 = 0;
        loop {
            match self
                .runtime_executor
                .execute(runtime, extract_dir, &run_environment, timeout)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(ExecutorError::ExecutionTimedOut) => return Err(ExecutorError::ExecutionTimedOut),
                Err(e) if attempt < config.max_retries => {
                    attempt += 1;
                    warn!(%run_id, attempt, error = %e, "entry point execution failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Derive and provision a session from `browser_request` (step 4
    /// defaults), enqueue its `SessionStart` task, and wait up to 5 minutes
    /// for it to reach `running`. The session is never started in-process:
    /// `bg-session` remains the only module that calls into a provider, so
    /// this just dispatches the same task a pool-managed session would get.
    async fn provision_session(
        &self,
        run_id: Uuid,
        browser_request: &bg_types::config::BrowserRequest,
        cancel: &CancellationToken,
    ) -> ExecutorResult<bg_types::Session> {
        let resource_limits = bg_types::session::ResourceLimits::default();
        let expires_at = Utc::now() + Duration::hours(1);

        let session = bg_store::sessions::create_session(
            &self.pool,
            NewSession {
                work_pool_id: None,
                browser: browser_request.browser.clone(),
                version: browser_request.version.clone(),
                headless: browser_request.headless,
                operating_system: browser_request.operating_system.clone(),
                screen: browser_request.screen.clone(),
                resource_limits,
                environment: browser_request.environment.clone(),
                profile_id: browser_request.profile_id.clone(),
                provider: self.default_provider.clone(),
                expires_at,
            },
        )
        .await?;

        bg_store::runs::set_run_session(&self.pool, run_id, session.id).await?;

        let max_session_duration = i64::from(session.resource_limits.timeout_minutes) * 60;
        bg_queue::enqueue(
            &self.pool,
            &TaskKind::SessionStart {
                session_id: session.id,
                // Ad-hoc, run-provisioned sessions don't belong to a pool;
                // the field is informational to the handler, which derives
                // everything it needs from `session_id`.
                work_pool_id: Uuid::nil(),
                max_session_duration,
                queue_name: self.default_provider.clone(),
            },
            None,
            None,
        )
        .await?;

        let deadline = tokio::time::Instant::now() + SESSION_WAIT_BUDGET;
        loop {
            let current = bg_store::sessions::get_session(&self.pool, session.id).await?;
            if current.status == SessionStatus::Running {
                return Ok(current);
            }
            if current.status.is_terminal() {
                return Err(ExecutorError::SessionFailed(format!(
                    "session reached terminal state {:?} while waiting for running",
                    current.status
                )));
            }
            if cancel.is_cancelled() {
                self.stop_session(session.id, "run_cancelled").await;
                return Err(ExecutorError::Cancelled);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ExecutorError::SessionFailed(
                    "session did not reach running within the 5 minute wait budget".to_string(),
                ));
            }
            tokio::time::sleep(SESSION_WAIT_POLL_INTERVAL).await;
        }
    }

    async fn stop_session(&self, session_id: Uuid, reason: &str) {
        if let Err(e) = bg_queue::enqueue(
            &self.pool,
            &TaskKind::SessionStop {
                session_id,
                reason: reason.to_string(),
            },
            Some(QueueName::Critical),
            None,
        )
        .await
        {
            warn!(%session_id, error = %e, "failed to enqueue session_stop during run teardown");
        }
    }

    /// Step 6, finalize. Writes the run's terminal status/output/error and
    /// reclaims any provisioned session, regardless of which step failed.
    async fn finalize(
        &self,
        run_id: Uuid,
        session_id: Option<Uuid>,
        outcome: ExecutorResult<ExecutionOutcome>,
        cancel: &CancellationToken,
    ) -> ExecutorResult<()> {
        let (status, output, error, session_reason) = match outcome {
            Ok(outcome) if outcome.is_success() => {
                (RunStatus::Completed, outcome.output, None, "run_completed")
            }
            Ok(outcome) => (
                RunStatus::Failed,
                Value::Null,
                outcome.error,
                "run_failed",
            ),
            Err(ExecutorError::Cancelled) => (RunStatus::Cancelled, Value::Null, None, "run_cancelled"),
            Err(e) => (RunStatus::Failed, Value::Null, Some(e.run_error()), "run_failed"),
        };

        if let Some(session_id) = session_id {
            if status == RunStatus::Completed {
                self.emit_session_completed(session_id).await;
            } else {
                self.stop_session(session_id, session_reason).await;
            }
        }

        bg_store::runs::complete_run(&self.pool, run_id, status, output, error).await?;

        if cancel.is_cancelled() && status != RunStatus::Cancelled {
            // Cancellation arrived after the point of no return (§4.6
            // "orderings and tie-breaks"): the terminal write above already
            // recorded the real outcome, which takes precedence.
            warn!(%run_id, "cancellation observed after run reached a terminal outcome");
        }

        Ok(())
    }

    async fn emit_session_completed(&self, session_id: Uuid) {
        if let Err(e) =
            bg_store::events::insert_event(&self.pool, session_id, SessionEventKind::SessionCompleted, None)
                .await
        {
            warn!(%session_id, error = %e, "failed to append session_completed event");
        }
    }
}

/// Shallow-merge `overrides`' top-level keys over `base`, then parse the
/// result as a `DeploymentConfig`. Unknown/absent keys fall back to the
/// deployment's stored config and, beneath that, `DeploymentConfig`'s own
/// defaults.
fn merge_config(base: &Value, overrides: &Value) -> DeploymentConfig {
    let mut merged = base.clone();
    if let (Value::Object(merged_map), Value::Object(override_map)) = (&mut merged, overrides) {
        for (k, v) in override_map {
            merged_map.insert(k.clone(), v.clone());
        }
    }
    DeploymentConfig::from_value(&merged).unwrap_or_default()
}

/// `config.environment` with the task's per-trigger `environment` overrides
/// applied on top. Non-string override values are rendered as compact JSON
/// rather than rejected, matching `DeploymentConfig`'s "never fail on an
/// unrecognized shape" stance.
fn merge_environment(
    config_environment: &std::collections::HashMap<String, String>,
    overrides: &serde_json::Map<String, Value>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = config_environment
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (k, v) in overrides {
        let value = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        merged.insert(k.clone(), value);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_config_overrides_take_precedence() {
        let base = serde_json::json!({"timeout_seconds": 300, "max_retries": 0});
        let overrides = serde_json::json!({"timeout_seconds": 60});
        let merged = merge_config(&base, &overrides);
        assert_eq!(merged.timeout_seconds, 60);
        assert_eq!(merged.max_retries, 0);
    }

    #[test]
    fn merge_environment_overrides_win_and_stringify_non_strings() {
        let mut base = std::collections::HashMap::new();
        base.insert("A".to_string(), "1".to_string());
        let mut overrides = serde_json::Map::new();
        overrides.insert("A".to_string(), Value::String("2".to_string()));
        overrides.insert("B".to_string(), Value::Bool(true));

        let merged = merge_environment(&base, &overrides);
        assert_eq!(merged.get("A"), Some(&"2".to_string()));
        assert_eq!(merged.get("B"), Some(&"true".to_string()));
    }
}
