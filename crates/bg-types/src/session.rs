use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::Screen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Starting,
    Available,
    Claimed,
    Running,
    Idle,
    Completed,
    Failed,
    Expired,
    Crashed,
    TimedOut,
    Terminated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Starting => "starting",
            SessionStatus::Available => "available",
            SessionStatus::Claimed => "claimed",
            SessionStatus::Running => "running",
            SessionStatus::Idle => "idle",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Expired => "expired",
            SessionStatus::Crashed => "crashed",
            SessionStatus::TimedOut => "timed_out",
            SessionStatus::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => SessionStatus::Pending,
            "starting" => SessionStatus::Starting,
            "available" => SessionStatus::Available,
            "claimed" => SessionStatus::Claimed,
            "running" => SessionStatus::Running,
            "idle" => SessionStatus::Idle,
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            "expired" => SessionStatus::Expired,
            "crashed" => SessionStatus::Crashed,
            "timed_out" => SessionStatus::TimedOut,
            "terminated" => SessionStatus::Terminated,
            _ => return None,
        })
    }

    /// Terminal set (§3): no further transitions are allowed (P2).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Failed
                | SessionStatus::Expired
                | SessionStatus::Crashed
                | SessionStatus::TimedOut
                | SessionStatus::Terminated
        )
    }

    /// `active` partition used by the reconciler's scale-need computation (§4.7).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::Starting | SessionStatus::Running | SessionStatus::Idle
        )
    }

    /// `ws_endpoint`/`live_url` must be non-null once a session reaches this
    /// status or later in the non-terminal ordering (§3).
    pub fn requires_endpoints(&self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Idle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLimits {
    #[serde(default = "default_cpu")]
    pub cpu: f64,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u32,
}

fn default_cpu() -> f64 {
    2.0
}
fn default_memory() -> String {
    "2GB".to_string()
}
fn default_timeout_minutes() -> u32 {
    30
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
            timeout_minutes: default_timeout_minutes(),
        }
    }
}

/// A live browser instance exposing a WebSocket endpoint and a human-readable
/// live URL (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub work_pool_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub browser: String,
    pub version: String,
    pub headless: bool,
    pub operating_system: String,
    pub screen: Screen,
    pub resource_limits: ResourceLimits,
    pub environment: HashMap<String, String>,
    pub profile_id: Option<String>,
    pub provider: String,
    pub status: SessionStatus,
    pub container_id: Option<String>,
    pub ws_endpoint: Option<String>,
    pub live_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// P3: for status in {running, idle}, both endpoints must be populated.
    pub fn satisfies_endpoint_invariant(&self) -> bool {
        if self.status.requires_endpoints() {
            self.ws_endpoint.is_some() && self.live_url.is_some()
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_str_round_trips() {
        for s in [
            SessionStatus::Pending,
            SessionStatus::Starting,
            SessionStatus::Available,
            SessionStatus::Claimed,
            SessionStatus::Running,
            SessionStatus::Idle,
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::Expired,
            SessionStatus::Crashed,
            SessionStatus::TimedOut,
            SessionStatus::Terminated,
        ] {
            assert_eq!(SessionStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn terminal_set_matches_spec() {
        let terminal = [
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::Expired,
            SessionStatus::Crashed,
            SessionStatus::TimedOut,
            SessionStatus::Terminated,
        ];
        for s in terminal {
            assert!(s.is_terminal(), "{s:?} should be terminal");
        }
        for s in [
            SessionStatus::Pending,
            SessionStatus::Starting,
            SessionStatus::Available,
            SessionStatus::Claimed,
            SessionStatus::Running,
            SessionStatus::Idle,
        ] {
            assert!(!s.is_terminal(), "{s:?} should not be terminal");
        }
    }

    #[test]
    fn active_partition_matches_reconciler_definition() {
        assert!(SessionStatus::Starting.is_active());
        assert!(SessionStatus::Running.is_active());
        assert!(SessionStatus::Idle.is_active());
        assert!(!SessionStatus::Pending.is_active());
        assert!(!SessionStatus::Claimed.is_active());
    }
}
