//! Deterministic in-memory [`Provider`], the equivalent of the teacher's
//! `PaperBroker`/`FakeBroker`: no network I/O, counters instead of real
//! workload handles, and injectable failures for exercising the retry/error
//! paths in `bg-session`/`bg-reconcile` without a container runtime.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use bg_provider::{Provider, ProviderError, SessionMetrics, StartResult};
use bg_types::session::Session;

#[derive(Default)]
struct State {
    next_id: u64,
    live: HashSet<String>,
    start_calls: usize,
    stop_calls: usize,
    fail_next_start: Option<String>,
    fail_health_for: HashSet<String>,
}

/// A provider backed entirely by process memory. `start` hands back a
/// deterministic `container_id` (`fake-1`, `fake-2`, ...) and marks it live;
/// `stop` is idempotent the same way the real contract requires.
pub struct FakeProvider {
    state: Mutex<State>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// The next call to `start` fails with `ProviderError::Transport(reason)`
    /// instead of succeeding, then reverts to normal behavior.
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().fail_next_start = Some(reason.into());
    }

    /// `health_check` returns `Unhealthy` for this container id until cleared.
    pub fn fail_health_for(&self, container_id: impl Into<String>) {
        self.state.lock().unwrap().fail_health_for.insert(container_id.into());
    }

    pub fn start_call_count(&self) -> usize {
        self.state.lock().unwrap().start_calls
    }

    pub fn stop_call_count(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    pub fn is_live(&self, container_id: &str) -> bool {
        self.state.lock().unwrap().live.contains(container_id)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn start(&self, session: &Session) -> Result<StartResult, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.start_calls += 1;

        if let Some(reason) = state.fail_next_start.take() {
            return Err(ProviderError::Transport(anyhow::anyhow!(reason)));
        }

        // Idempotent on an existing container_id, same contract as the real providers.
        let container_id = match &session.container_id {
            Some(id) => id.clone(),
            None => {
                state.next_id += 1;
                format!("fake-{}", state.next_id)
            }
        };
        state.live.insert(container_id.clone());

        Ok(StartResult {
            ws_endpoint: format!("ws://fake-provider/{container_id}"),
            live_url: format!("http://fake-provider/{container_id}"),
            container_id,
        })
    }

    async fn stop(&self, session: &Session) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        if let Some(container_id) = &session.container_id {
            state.live.remove(container_id);
        }
        Ok(())
    }

    async fn health_check(&self, session: &Session) -> Result<(), ProviderError> {
        let Some(container_id) = &session.container_id else {
            return Err(ProviderError::NotFound("no container_id".to_string()));
        };
        let state = self.state.lock().unwrap();
        if state.fail_health_for.contains(container_id) {
            return Err(ProviderError::Unhealthy("injected failure".to_string()));
        }
        if state.live.contains(container_id) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(container_id.clone()))
        }
    }

    async fn get_metrics(&self, _session: &Session) -> Result<SessionMetrics, ProviderError> {
        Ok(SessionMetrics {
            cpu_percent: Some(0.0),
            memory_mb: Some(0.0),
            rx_bytes: Some(0),
            tx_bytes: Some(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bg_types::config::Screen;
    use bg_types::session::{ResourceLimits, SessionStatus};
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn session(container_id: Option<&str>) -> Session {
        Session {
            id: Uuid::new_v4(),
            work_pool_id: None,
            worker_id: None,
            browser: "chrome".into(),
            version: "latest".into(),
            headless: true,
            operating_system: "linux".into(),
            screen: Screen::default(),
            resource_limits: ResourceLimits::default(),
            environment: HashMap::new(),
            profile_id: None,
            provider: "fake".into(),
            status: SessionStatus::Pending,
            container_id: container_id.map(str::to_string),
            ws_endpoint: None,
            live_url: None,
            expires_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_assigns_and_marks_live() {
        let provider = FakeProvider::new();
        let result = provider.start(&session(None)).await.unwrap();
        assert_eq!(result.container_id, "fake-1");
        assert!(provider.is_live("fake-1"));
    }

    #[tokio::test]
    async fn start_is_idempotent_on_existing_container_id() {
        let provider = FakeProvider::new();
        let result = provider.start(&session(Some("fake-existing"))).await.unwrap();
        assert_eq!(result.container_id, "fake-existing");
        assert_eq!(provider.start_call_count(), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent_when_already_gone() {
        let provider = FakeProvider::new();
        provider.stop(&session(Some("never-started"))).await.unwrap();
        assert_eq!(provider.stop_call_count(), 1);
    }

    #[tokio::test]
    async fn fail_next_start_triggers_once_then_recovers() {
        let provider = FakeProvider::new();
        provider.fail_next_start("capacity exhausted");
        assert!(provider.start(&session(None)).await.is_err());
        assert!(provider.start(&session(None)).await.is_ok());
    }

    #[tokio::test]
    async fn health_check_fails_for_unknown_container() {
        let provider = FakeProvider::new();
        let err = provider.health_check(&session(Some("ghost"))).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
