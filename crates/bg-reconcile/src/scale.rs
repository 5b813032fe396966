//! Consumes a `PoolScale` task (§4.7 step 3, §9: "the reconciler never
//! creates session rows directly"). The tick only decides *how many*
//! sessions a pool is short; turning that count into rows and `SessionStart`
//! tasks is a separate, queue-driven step so two reconciler processes can
//! never race each other into double-provisioning.

use bg_queue::TaskKind;
use bg_store::sessions::NewSession;
use bg_types::config::{BrowserRequest, Screen};
use bg_types::ResourceLimits;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ReconcileResult;

/// Create `desired_sessions` pending sessions against `work_pool_id` and
/// enqueue a `SessionStart` for each. Uses [`BrowserRequest::default`] for
/// the browser shape, since a `WorkPool` carries only `default_image` /
/// `default_env` — no per-session browser/version/OS fields to draw from.
pub async fn handle_pool_scale(
    pool: &PgPool,
    work_pool_id: Uuid,
    desired_sessions: i32,
) -> ReconcileResult<Vec<Uuid>> {
    let work_pool = bg_store::pools::get_pool(pool, work_pool_id).await?;
    let default_request = BrowserRequest::default();
    let environment = env_from_json_object(&work_pool.default_env);

    let mut created = Vec::with_capacity(desired_sessions.max(0) as usize);
    for _ in 0..desired_sessions.max(0) {
        let expires_at = Utc::now() + ChronoDuration::seconds(work_pool.max_session_duration);
        let session = bg_store::sessions::create_session(
            pool,
            NewSession {
                work_pool_id: Some(work_pool.id),
                browser: default_request.browser.clone(),
                version: default_request.version.clone(),
                headless: default_request.headless,
                operating_system: default_request.operating_system.clone(),
                screen: Screen::default(),
                resource_limits: ResourceLimits::default(),
                environment: environment.clone(),
                profile_id: None,
                provider: work_pool.provider.clone(),
                expires_at,
            },
        )
        .await?;

        bg_queue::enqueue(
            pool,
            &TaskKind::SessionStart {
                session_id: session.id,
                work_pool_id: work_pool.id,
                max_session_duration: work_pool.max_session_duration,
                queue_name: work_pool.provider.clone(),
            },
            None,
            None,
        )
        .await?;
        created.push(session.id);
    }

    Ok(created)
}

/// Flatten a JSON object's string-valued entries into a session
/// `environment` map; non-string values are rendered as compact JSON rather
/// than dropped, matching `DeploymentConfig`'s forward-compatible stance on
/// unrecognized shapes.
fn env_from_json_object(value: &Value) -> HashMap<String, String> {
    let Value::Object(map) = value else {
        return HashMap::new();
    };
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_from_json_object_stringifies_non_strings() {
        let value = serde_json::json!({"A": "1", "B": true});
        let env = env_from_json_object(&value);
        assert_eq!(env.get("A"), Some(&"1".to_string()));
        assert_eq!(env.get("B"), Some(&"true".to_string()));
    }

    #[test]
    fn env_from_json_object_empty_on_non_object() {
        assert!(env_from_json_object(&Value::Null).is_empty());
    }
}
