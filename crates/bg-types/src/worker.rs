use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A capacity-bearing consumer heartbeated to the store; evidence of
/// liveness for the sessions it claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub work_pool_id: Uuid,
    pub max_slots: u32,
    pub active: u32,
    pub last_beat: DateTime<Utc>,
}

/// Default TTL (seconds) after which a worker's last heartbeat is considered
/// stale (§3: "online iff now - last_beat <= worker_ttl").
pub const DEFAULT_WORKER_TTL_SECS: i64 = 300;

impl Worker {
    pub fn is_online(&self, now: DateTime<Utc>, worker_ttl_secs: i64) -> bool {
        (now - self.last_beat).num_seconds() <= worker_ttl_secs
    }

    /// `0 <= active <= max_slots` (§3 invariant).
    pub fn slots_valid(&self) -> bool {
        self.active <= self.max_slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn worker(last_beat: DateTime<Utc>) -> Worker {
        Worker {
            id: Uuid::new_v4(),
            work_pool_id: Uuid::new_v4(),
            max_slots: 4,
            active: 1,
            last_beat,
        }
    }

    #[test]
    fn online_within_ttl() {
        let now = Utc::now();
        let w = worker(now - Duration::seconds(100));
        assert!(w.is_online(now, DEFAULT_WORKER_TTL_SECS));
    }

    #[test]
    fn offline_past_ttl() {
        let now = Utc::now();
        let w = worker(now - Duration::seconds(400));
        assert!(!w.is_online(now, DEFAULT_WORKER_TTL_SECS));
    }
}
