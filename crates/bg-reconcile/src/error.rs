use std::fmt;

#[derive(Debug)]
pub enum ReconcileError {
    Store(bg_store::StoreError),
    Queue(bg_queue::QueueError),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Store(e) => write!(f, "{e}"),
            ReconcileError::Queue(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<bg_store::StoreError> for ReconcileError {
    fn from(e: bg_store::StoreError) -> Self {
        ReconcileError::Store(e)
    }
}

impl From<bg_queue::QueueError> for ReconcileError {
    fn from(e: bg_queue::QueueError) -> Self {
        ReconcileError::Queue(e)
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
