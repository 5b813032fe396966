use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::DeploymentRun;

/// `GetDeploymentStats(id)` result (§4.1): run counts by status, the ten
/// most recent runs, and mean completed-run duration in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStats {
    pub deployment_id: Uuid,
    pub counts_by_status: HashMap<String, i64>,
    pub recent_runs: Vec<DeploymentRun>,
    pub mean_duration_seconds: Option<f64>,
}
