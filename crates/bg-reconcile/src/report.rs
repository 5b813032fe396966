//! Pure decision layer for a pool's tick (§4.7 steps 1-2): given counts
//! already fetched from the store, compute the scale need without touching
//! the database. Retirement (steps 4-5) is mostly pushed into the store's
//! own time-bounded queries (`list_idle_expired`, `list_orphaned`), so the
//! "pure" surface here is thin — but keeping it separate from `tick` means
//! the clamping arithmetic is unit-testable without a pool.

use bg_types::WorkPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDecision {
    pub need: u32,
}

/// `need = max(0, min_size - (active + pending))`, clamped so
/// `active + pending + need <= max_concurrency`.
pub fn decide_scale(pool: &WorkPool, active: i64, pending: i64) -> ScaleDecision {
    let occupied = active + pending;
    let raw_need = (pool.min_size as i64 - occupied).max(0);
    let headroom = (pool.max_concurrency as i64 - occupied).max(0);
    ScaleDecision {
        need: raw_need.min(headroom) as u32,
    }
}

/// One pool's tick outcome, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolReconcileReport {
    pub work_pool_id: Uuid,
    pub scale_need: u32,
    pub idle_retired: Vec<Uuid>,
    pub orphan_retired: Vec<Uuid>,
}

impl PoolReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.scale_need == 0 && self.idle_retired.is_empty() && self.orphan_retired.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(min: u32, max: u32) -> WorkPool {
        WorkPool {
            id: Uuid::new_v4(),
            name: "default".into(),
            provider: "docker".into(),
            min_size: min,
            max_concurrency: max,
            auto_scale: true,
            paused: false,
            max_idle_time: 600,
            max_session_duration: 3600,
            default_image: None,
            default_env: serde_json::Value::Null,
        }
    }

    #[test]
    fn needs_sessions_up_to_min_size() {
        let decision = decide_scale(&pool(3, 10), 1, 0);
        assert_eq!(decision.need, 2);
    }

    #[test]
    fn no_need_once_min_size_met() {
        let decision = decide_scale(&pool(3, 10), 3, 0);
        assert_eq!(decision.need, 0);
    }

    #[test]
    fn pending_counts_toward_min_size() {
        let decision = decide_scale(&pool(3, 10), 1, 2);
        assert_eq!(decision.need, 0);
    }

    #[test]
    fn need_clamped_by_max_concurrency() {
        let decision = decide_scale(&pool(5, 4), 0, 0);
        assert_eq!(decision.need, 4);
    }

    #[test]
    fn already_over_max_concurrency_yields_no_need() {
        let decision = decide_scale(&pool(5, 4), 6, 0);
        assert_eq!(decision.need, 0);
    }
}
