use std::fmt;

#[derive(Debug)]
pub enum QueueError {
    NotFound(uuid::Uuid),
    NotClaimed(uuid::Uuid),
    Internal(anyhow::Error),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::NotFound(id) => write!(f, "task not found: {id}"),
            QueueError::NotClaimed(id) => write!(f, "task not claimed, cannot complete: {id}"),
            QueueError::Internal(e) => write!(f, "queue error: {e}"),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for QueueError {
    fn from(e: anyhow::Error) -> Self {
        QueueError::Internal(e)
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Internal(e.into())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
