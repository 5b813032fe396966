use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::session::SessionStatus;

/// The append-only vocabulary of session events (§4.3). Events not mapped to
/// a status transition here are informational and never mutate `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SessionCreated,
    SessionStarting,
    ContainerStarted,
    BrowserStarted,
    SessionAvailable,
    SessionClaimed,
    SessionAssigned,
    SessionReady,
    SessionActive,
    SessionIdle,
    SessionCompleted,
    SessionExpired,
    SessionTimedOut,
    SessionTerminated,
    BrowserCrashed,
    ContainerCrashed,
    StartupFailed,
    ResourceExhausted,
    NetworkError,
}

impl SessionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::SessionCreated => "session_created",
            SessionEventKind::SessionStarting => "session_starting",
            SessionEventKind::ContainerStarted => "container_started",
            SessionEventKind::BrowserStarted => "browser_started",
            SessionEventKind::SessionAvailable => "session_available",
            SessionEventKind::SessionClaimed => "session_claimed",
            SessionEventKind::SessionAssigned => "session_assigned",
            SessionEventKind::SessionReady => "session_ready",
            SessionEventKind::SessionActive => "session_active",
            SessionEventKind::SessionIdle => "session_idle",
            SessionEventKind::SessionCompleted => "session_completed",
            SessionEventKind::SessionExpired => "session_expired",
            SessionEventKind::SessionTimedOut => "session_timed_out",
            SessionEventKind::SessionTerminated => "session_terminated",
            SessionEventKind::BrowserCrashed => "browser_crashed",
            SessionEventKind::ContainerCrashed => "container_crashed",
            SessionEventKind::StartupFailed => "startup_failed",
            SessionEventKind::ResourceExhausted => "resource_exhausted",
            SessionEventKind::NetworkError => "network_error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "session_created" => SessionEventKind::SessionCreated,
            "session_starting" => SessionEventKind::SessionStarting,
            "container_started" => SessionEventKind::ContainerStarted,
            "browser_started" => SessionEventKind::BrowserStarted,
            "session_available" => SessionEventKind::SessionAvailable,
            "session_claimed" => SessionEventKind::SessionClaimed,
            "session_assigned" => SessionEventKind::SessionAssigned,
            "session_ready" => SessionEventKind::SessionReady,
            "session_active" => SessionEventKind::SessionActive,
            "session_idle" => SessionEventKind::SessionIdle,
            "session_completed" => SessionEventKind::SessionCompleted,
            "session_expired" => SessionEventKind::SessionExpired,
            "session_timed_out" => SessionEventKind::SessionTimedOut,
            "session_terminated" => SessionEventKind::SessionTerminated,
            "browser_crashed" => SessionEventKind::BrowserCrashed,
            "container_crashed" => SessionEventKind::ContainerCrashed,
            "startup_failed" => SessionEventKind::StartupFailed,
            "resource_exhausted" => SessionEventKind::ResourceExhausted,
            "network_error" => SessionEventKind::NetworkError,
            _ => return None,
        })
    }

    /// The §4.3 event→status mapping. `None` means the event is
    /// informational and does not drive a status transition.
    pub fn target_status(&self) -> Option<SessionStatus> {
        Some(match self {
            SessionEventKind::SessionCreated => SessionStatus::Pending,
            SessionEventKind::SessionStarting
            | SessionEventKind::ContainerStarted
            | SessionEventKind::BrowserStarted => SessionStatus::Starting,
            SessionEventKind::SessionAvailable => SessionStatus::Available,
            SessionEventKind::SessionClaimed | SessionEventKind::SessionAssigned => {
                SessionStatus::Claimed
            }
            SessionEventKind::SessionReady | SessionEventKind::SessionActive => {
                SessionStatus::Running
            }
            SessionEventKind::SessionIdle => SessionStatus::Idle,
            SessionEventKind::SessionCompleted => SessionStatus::Completed,
            SessionEventKind::SessionExpired => SessionStatus::Expired,
            SessionEventKind::SessionTimedOut => SessionStatus::TimedOut,
            SessionEventKind::SessionTerminated => SessionStatus::Terminated,
            SessionEventKind::BrowserCrashed | SessionEventKind::ContainerCrashed => {
                SessionStatus::Crashed
            }
            SessionEventKind::StartupFailed
            | SessionEventKind::ResourceExhausted
            | SessionEventKind::NetworkError => SessionStatus::Failed,
        })
    }
}

/// Append-only log entry describing a state-relevant occurrence for a
/// session. Events are the authoritative cause of status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    pub event: SessionEventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_str_round_trips() {
        let all = [
            SessionEventKind::SessionCreated,
            SessionEventKind::SessionStarting,
            SessionEventKind::ContainerStarted,
            SessionEventKind::BrowserStarted,
            SessionEventKind::SessionAvailable,
            SessionEventKind::SessionClaimed,
            SessionEventKind::SessionAssigned,
            SessionEventKind::SessionReady,
            SessionEventKind::SessionActive,
            SessionEventKind::SessionIdle,
            SessionEventKind::SessionCompleted,
            SessionEventKind::SessionExpired,
            SessionEventKind::SessionTimedOut,
            SessionEventKind::SessionTerminated,
            SessionEventKind::BrowserCrashed,
            SessionEventKind::ContainerCrashed,
            SessionEventKind::StartupFailed,
            SessionEventKind::ResourceExhausted,
            SessionEventKind::NetworkError,
        ];
        for e in all {
            assert_eq!(SessionEventKind::parse(e.as_str()), Some(e));
        }
    }

    #[test]
    fn mapping_matches_table_in_4_3() {
        assert_eq!(
            SessionEventKind::SessionReady.target_status(),
            Some(SessionStatus::Running)
        );
        assert_eq!(
            SessionEventKind::SessionActive.target_status(),
            Some(SessionStatus::Running)
        );
        assert_eq!(
            SessionEventKind::StartupFailed.target_status(),
            Some(SessionStatus::Failed)
        );
        assert_eq!(
            SessionEventKind::BrowserCrashed.target_status(),
            Some(SessionStatus::Crashed)
        );
    }
}
