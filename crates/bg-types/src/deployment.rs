use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Active,
    Inactive,
    Deploying,
    Failed,
    Deprecated,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Active => "active",
            DeploymentStatus::Inactive => "inactive",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Deprecated => "deprecated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DeploymentStatus::Active),
            "inactive" => Some(DeploymentStatus::Inactive),
            "deploying" => Some(DeploymentStatus::Deploying),
            "failed" => Some(DeploymentStatus::Failed),
            "deprecated" => Some(DeploymentStatus::Deprecated),
            _ => None,
        }
    }
}

/// An immutable, hashed code package with a runtime and default
/// configuration. Immutable once created except `description`, `config`,
/// and `status` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub runtime: String,
    pub package_url: String,
    pub package_hash: String,
    /// Opaque JSON; parse with [`crate::DeploymentConfig::from_value`].
    pub config: Value,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            DeploymentStatus::Active,
            DeploymentStatus::Inactive,
            DeploymentStatus::Deploying,
            DeploymentStatus::Failed,
            DeploymentStatus::Deprecated,
        ] {
            assert_eq!(DeploymentStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn unknown_status_string_is_none() {
        assert_eq!(DeploymentStatus::parse("bogus"), None);
    }
}
