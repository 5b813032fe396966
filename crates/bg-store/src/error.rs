use std::fmt;

/// Typed error kinds the store surfaces to callers (§7). HTTP handlers in
/// `bg-daemon` map these to status codes; everything else propagates via
/// `anyhow`.
#[derive(Debug)]
pub enum StoreError {
    NotFound { entity: &'static str, id: String },
    Conflict(String),
    Validation(String),
    Internal(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            StoreError::Conflict(msg) => write!(f, "{msg}"),
            StoreError::Validation(msg) => write!(f, "{msg}"),
            StoreError::Internal(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Internal(e) => e.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Internal(e)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "row",
                id: String::new(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("unique constraint violated: {db_err}"))
            }
            other => StoreError::Internal(anyhow::Error::new(other)),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
