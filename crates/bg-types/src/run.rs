use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal set = {completed, failed, cancelled} (§3).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// One execution of a [`crate::Deployment`]; may provision a [`crate::Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRun {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub session_id: Option<Uuid>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRun {
    /// `completed_at - started_at`, floored to whole seconds, whenever both
    /// are set (P8). `None` for non-terminal or not-yet-started runs.
    pub fn duration_seconds(&self) -> Option<i64> {
        let (start, end) = (self.started_at?, self.completed_at?);
        Some((end - start).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_is_exactly_spec() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn duration_seconds_floors_to_whole_seconds() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2026-01-01T00:00:10.900Z")
            .unwrap()
            .with_timezone(&Utc);
        let run = DeploymentRun {
            id: Uuid::new_v4(),
            deployment_id: Uuid::new_v4(),
            session_id: None,
            status: RunStatus::Completed,
            started_at: Some(start),
            completed_at: Some(end),
            output: Value::Null,
            error: None,
            created_at: start,
            updated_at: end,
        };
        assert_eq!(run.duration_seconds(), Some(10));
    }

    #[test]
    fn duration_seconds_none_when_incomplete() {
        let now = Utc::now();
        let run = DeploymentRun {
            id: Uuid::new_v4(),
            deployment_id: Uuid::new_v4(),
            session_id: None,
            status: RunStatus::Running,
            started_at: Some(now),
            completed_at: None,
            output: Value::Null,
            error: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(run.duration_seconds(), None);
    }
}
