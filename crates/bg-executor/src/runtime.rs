//! Step 5, "Execute" (§4.6): an opaque call into the runtime-specific entry
//! point. The core only knows `{output_json, error?}` comes back; it does
//! not interpret what the entry point does. `RuntimeExecutor` is the seam a
//! real deployment runs through — test code and `bg-testkit` substitute a
//! fake that never shells out.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecutorError;

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub output: Value,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait]
pub trait RuntimeExecutor: Send + Sync {
    /// Run the entry point for `runtime` inside `extract_dir` with `env` set,
    /// bounded by `timeout`. A process that outlives `timeout` is killed and
    /// reported as `ExecutorError::ExecutionTimedOut`; any other failure to
    /// even start or parse output is reported as `ExecutorError::ExecutionFailed`
    /// (transient — the caller retries it up to `config.max_retries`).
    async fn execute(
        &self,
        runtime: &str,
        extract_dir: &Path,
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ExecutorError>;
}

/// Reference implementation: shells out to the runtime's interpreter against
/// a fixed entry-point filename per runtime, and expects a single line of
/// JSON (`{"output": ..., "error": "..."}`) on stdout.
pub struct ProcessRuntimeExecutor;

impl ProcessRuntimeExecutor {
    pub fn new() -> Self {
        Self
    }

    fn entry_point(runtime: &str) -> Result<&'static str, ExecutorError> {
        match runtime {
            "node" => Ok("index.js"),
            "python" => Ok("main.py"),
            other => Err(ExecutorError::ExecutionFailed(format!(
                "unsupported runtime: {other}"
            ))),
        }
    }

    fn interpreter(runtime: &str) -> &'static str {
        match runtime {
            "node" => "node",
            _ => "python3",
        }
    }
}

impl Default for ProcessRuntimeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeExecutor for ProcessRuntimeExecutor {
    async fn execute(
        &self,
        runtime: &str,
        extract_dir: &Path,
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let entry_point = Self::entry_point(runtime)?;
        if !extract_dir.join(entry_point).exists() {
            return Err(ExecutorError::ExecutionFailed(format!(
                "entry point {entry_point} not found in extracted package"
            )));
        }

        let mut command = tokio::process::Command::new(Self::interpreter(runtime));
        command
            .arg(entry_point)
            .current_dir(extract_dir)
            .envs(env.iter())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let child = command
            .spawn()
            .map_err(|e| ExecutorError::ExecutionFailed(format!("failed to spawn {runtime} entry point: {e}")))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ExecutorError::ExecutionFailed(format!(
                    "entry point process error: {e}"
                )))
            }
            Err(_) => return Err(ExecutorError::ExecutionTimedOut),
        };

        if !output.status.success() {
            return Err(ExecutorError::ExecutionFailed(format!(
                "entry point exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let last_line = stdout.lines().last().unwrap_or("").trim();
        if last_line.is_empty() {
            return Ok(ExecutionOutcome {
                output: Value::Null,
                error: None,
            });
        }

        let parsed: Value = serde_json::from_str(last_line)
            .map_err(|e| ExecutorError::ExecutionFailed(format!("entry point output wasn't JSON: {e}")))?;
        let error = parsed.get("error").and_then(Value::as_str).map(str::to_string);
        let result_output = parsed.get("output").cloned().unwrap_or(Value::Null);

        Ok(ExecutionOutcome {
            output: result_output,
            error,
        })
    }
}

/// Canned `RuntimeExecutor` for tests: returns a fixed outcome without
/// spawning a process. Gated behind `testkit` so no production binary can
/// link it in by accident, following the teacher's `#[cfg(feature =
/// "testkit")]` convention (mirrored from `Provider::for_test`-style fakes
/// elsewhere in this workspace).
#[cfg(feature = "testkit")]
pub struct FakeRuntimeExecutor {
    pub outcome: ExecutionOutcome,
}

#[cfg(feature = "testkit")]
impl FakeRuntimeExecutor {
    pub fn succeeding(output: Value) -> Self {
        Self {
            outcome: ExecutionOutcome { output, error: None },
        }
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            outcome: ExecutionOutcome {
                output: Value::Null,
                error: Some(error.into()),
            },
        }
    }
}

#[cfg(feature = "testkit")]
#[async_trait]
impl RuntimeExecutor for FakeRuntimeExecutor {
    async fn execute(
        &self,
        _runtime: &str,
        _extract_dir: &Path,
        _env: &BTreeMap<String, String>,
        _timeout: Duration,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        Ok(self.outcome.clone())
    }
}

#[cfg(all(test, feature = "testkit"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_executor_returns_its_canned_outcome() {
        let fake = FakeRuntimeExecutor::succeeding(serde_json::json!({"ok": true}));
        let outcome = fake
            .execute("node", Path::new("/tmp"), &BTreeMap::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.output, serde_json::json!({"ok": true}));
    }
}
