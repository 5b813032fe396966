use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Embedded JSON configuration for a [`crate::Deployment`].
///
/// Unknown keys are preserved by round-tripping through `serde_json::Value`
/// where the schema does not (yet) enumerate a field; the core never fails
/// on an unrecognized key, it simply ignores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub trigger_events: Vec<String>,
    #[serde(default)]
    pub browser_requests: Vec<BrowserRequest>,
    #[serde(default)]
    pub resource_limits: Value,
}

fn default_concurrency() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    300
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: 0,
            timeout_seconds: default_timeout_seconds(),
            environment: HashMap::new(),
            schedule: None,
            trigger_events: Vec::new(),
            browser_requests: Vec::new(),
            resource_limits: Value::Object(Default::default()),
        }
    }
}

impl DeploymentConfig {
    /// Parse from the opaque JSON stored on the `Deployment` row. Missing
    /// fields fall back to their defaults; unknown keys are dropped silently
    /// by the intermediate `Value` round trip only when re-serialized — the
    /// stored row itself keeps them verbatim.
    pub fn from_value(v: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(v.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserRequest {
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_os")]
    pub operating_system: String,
    #[serde(default)]
    pub screen: Screen,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub profile_id: Option<String>,
}

fn default_browser() -> String {
    "chrome".to_string()
}
fn default_version() -> String {
    "latest".to_string()
}
fn default_headless() -> bool {
    true
}
fn default_os() -> String {
    "linux".to_string()
}

impl Default for BrowserRequest {
    fn default() -> Self {
        Self {
            browser: default_browser(),
            version: default_version(),
            headless: default_headless(),
            operating_system: default_os(),
            screen: Screen::default(),
            environment: HashMap::new(),
            profile_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Screen {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub dpi: Option<u32>,
    #[serde(default)]
    pub scale: Option<f64>,
}

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            dpi: Some(96),
            scale: Some(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let cfg = DeploymentConfig::default();
        let v = serde_json::to_value(&cfg).unwrap();
        let back = DeploymentConfig::from_value(&v).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn unknown_keys_ignored_not_rejected() {
        let v = serde_json::json!({
            "concurrency": 3,
            "some_future_field": {"x": 1},
        });
        let cfg = DeploymentConfig::from_value(&v).unwrap();
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn browser_request_defaults() {
        let v = serde_json::json!({});
        let req: BrowserRequest = serde_json::from_value(v).unwrap();
        assert_eq!(req.browser, "chrome");
        assert_eq!(req.version, "latest");
        assert!(req.headless);
        assert_eq!(req.operating_system, "linux");
        assert_eq!(req.screen.width, 1920);
        assert_eq!(req.screen.height, 1080);
    }
}
