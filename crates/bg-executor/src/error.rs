use std::fmt;

use crate::Retryable;

/// Error kinds a run can fail with (§7). The string form of each variant is
/// what lands in `DeploymentRun.error` — callers should treat it as a short
/// human string, not a stable machine code.
#[derive(Debug)]
pub enum ExecutorError {
    EntityMissing(&'static str),
    ArtifactError(bg_artifacts::ArtifactError),
    PackageError(String),
    SessionFailed(String),
    ExecutionTimedOut,
    ExecutionFailed(String),
    Cancelled,
    Store(bg_store::StoreError),
    Queue(bg_queue::QueueError),
    Internal(anyhow::Error),
}

impl ExecutorError {
    /// §7 error-kind classification, used to decide whether the enclosing
    /// `DeploymentRun` task should be NACKed (retried) or ACKed with the run
    /// left terminal. Execution failures are the only class this executor
    /// itself retries (bounded by `config.max_retries`, handled in the
    /// execute-step loop); once that budget is spent the run fails for good,
    /// so every error that reaches `finalize` is permanent.
    pub fn retryable(&self) -> Retryable {
        Retryable::Permanent
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorError::EntityMissing(_) => "entity_missing",
            ExecutorError::ArtifactError(_) => "artifact_error",
            ExecutorError::PackageError(_) => "artifact_error",
            ExecutorError::SessionFailed(_) => "session_failed",
            ExecutorError::ExecutionTimedOut => "timeout",
            ExecutorError::ExecutionFailed(_) => "internal",
            ExecutorError::Cancelled => "cancelled",
            ExecutorError::Store(_) => "internal",
            ExecutorError::Queue(_) => "internal",
            ExecutorError::Internal(_) => "internal",
        }
    }

    /// The string recorded on the run row: `"{kind}: {detail}"`.
    pub fn run_error(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::EntityMissing(what) => write!(f, "{what} not found"),
            ExecutorError::ArtifactError(e) => write!(f, "{e}"),
            ExecutorError::PackageError(msg) => write!(f, "{msg}"),
            ExecutorError::SessionFailed(msg) => write!(f, "{msg}"),
            ExecutorError::ExecutionTimedOut => write!(f, "execution exceeded config.timeout_seconds"),
            ExecutorError::ExecutionFailed(msg) => write!(f, "{msg}"),
            ExecutorError::Cancelled => write!(f, "run cancelled"),
            ExecutorError::Store(e) => write!(f, "{e}"),
            ExecutorError::Queue(e) => write!(f, "{e}"),
            ExecutorError::Internal(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<bg_store::StoreError> for ExecutorError {
    fn from(e: bg_store::StoreError) -> Self {
        ExecutorError::Store(e)
    }
}

impl From<bg_artifacts::ArtifactError> for ExecutorError {
    fn from(e: bg_artifacts::ArtifactError) -> Self {
        ExecutorError::ArtifactError(e)
    }
}

impl From<bg_queue::QueueError> for ExecutorError {
    fn from(e: bg_queue::QueueError) -> Self {
        ExecutorError::Queue(e)
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
