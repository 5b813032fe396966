use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A named set of capacity policies (min/max, timeouts, provider) against
/// which sessions are scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkPool {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub min_size: u32,
    pub max_concurrency: u32,
    pub auto_scale: bool,
    pub paused: bool,
    pub max_idle_time: i64,
    pub max_session_duration: i64,
    pub default_image: Option<String>,
    pub default_env: Value,
}

impl WorkPool {
    /// `0 <= min_size <= max_concurrency` (§3 invariant).
    pub fn bounds_valid(&self) -> bool {
        self.min_size <= self.max_concurrency
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
            default_env: Value::Null,
        }
    }

    #[test]
    fn bounds_valid_when_min_le_max() {
        assert!(pool(2, 5).bounds_valid());
        assert!(pool(0, 0).bounds_valid());
    }

    #[test]
    fn bounds_invalid_when_min_gt_max() {
        assert!(!pool(6, 5).bounds_valid());
    }
}
