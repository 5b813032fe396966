use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Named queues a task is routed to. Workers subscribe to one queue at a
/// time so a flood of low-priority cleanup work never starves session
/// starts (§4.4). `Provider` is parameterized because the queue namespace
/// is open — one per provider backend, not a single shared queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueName {
    Critical,
    Default,
    Low,
    Provider(String),
}

impl QueueName {
    pub fn provider(name: impl Into<String>) -> Self {
        QueueName::Provider(name.into())
    }

    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            QueueName::Critical => "critical".into(),
            QueueName::Default => "default".into(),
            QueueName::Low => "low".into(),
            QueueName::Provider(name) => format!("provider:{name}").into(),
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Task kinds this system enqueues. Each variant owns its payload; `kind()`
/// and `to_payload()` are used to write a row, `from_payload()` to read one
/// back (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    SessionStart {
        session_id: Uuid,
        work_pool_id: Uuid,
        max_session_duration: i64,
        queue_name: String,
    },
    SessionStop {
        session_id: Uuid,
        reason: String,
    },
    DeploymentRun {
        deployment_id: Uuid,
        run_id: Uuid,
        environment: serde_json::Map<String, Value>,
        config: Value,
    },
    PoolScale {
        work_pool_id: Uuid,
        desired_sessions: i32,
    },
    CleanupExpired {
        max_age_hours: i64,
    },
}

impl TaskKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::SessionStart { .. } => "session_start",
            TaskKind::SessionStop { .. } => "session_stop",
            TaskKind::DeploymentRun { .. } => "deployment_run",
            TaskKind::PoolScale { .. } => "pool_scale",
            TaskKind::CleanupExpired { .. } => "cleanup_expired",
        }
    }

    /// Default queue/retry/timeout routing per §4.4. `SessionStart` routes
    /// to its own `queue_name` (the pool's provider queue), not a fixed
    /// default, since that's the whole point of the field.
    pub fn default_queue(&self) -> QueueName {
        match self {
            TaskKind::SessionStart { queue_name, .. } => QueueName::provider(queue_name.clone()),
            TaskKind::SessionStop { .. } => QueueName::Critical,
            TaskKind::DeploymentRun { .. } => QueueName::Default,
            TaskKind::PoolScale { .. } => QueueName::Low,
            TaskKind::CleanupExpired { .. } => QueueName::Low,
        }
    }

    /// Default `max_retries` per §4.4 (only `SessionStop` specifies one
    /// explicitly; others inherit the caller's policy).
    pub fn default_max_retries(&self) -> i32 {
        match self {
            TaskKind::SessionStop { .. } => 5,
            _ => 3,
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).expect("TaskKind always serializes")
    }

    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub queue: String,
    pub task_type: String,
    pub payload: Value,
    pub enqueue_time: chrono::DateTime<chrono::Utc>,
    pub visible_at: chrono::DateTime<chrono::Utc>,
    pub attempts: i32,
    pub max_retries: i32,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub done: bool,
}

impl Task {
    pub fn kind(&self) -> Result<TaskKind, serde_json::Error> {
        TaskKind::from_payload(&self.payload)
    }

    /// Whether this task has exhausted its retry budget and should be
    /// dead-lettered instead of retried again.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_start_routes_to_its_own_provider_queue() {
        let kind = TaskKind::SessionStart {
            session_id: Uuid::nil(),
            work_pool_id: Uuid::nil(),
            max_session_duration: 3600,
            queue_name: "docker".to_string(),
        };
        let payload = kind.to_payload();
        let back = TaskKind::from_payload(&payload).unwrap();
        assert_eq!(kind, back);
        assert_eq!(kind.type_name(), "session_start");
        assert_eq!(kind.default_queue().as_str(), "provider:docker");
    }

    #[test]
    fn session_stop_defaults_to_critical_with_five_retries() {
        let kind = TaskKind::SessionStop {
            session_id: Uuid::nil(),
            reason: "deployment_run_finalize".to_string(),
        };
        assert_eq!(kind.default_queue(), QueueName::Critical);
        assert_eq!(kind.default_max_retries(), 5);
    }

    #[test]
    fn cleanup_expired_routes_to_low_queue() {
        let kind = TaskKind::CleanupExpired { max_age_hours: 24 };
        assert_eq!(kind.default_queue(), QueueName::Low);
        assert_eq!(kind.type_name(), "cleanup_expired");
    }
}
