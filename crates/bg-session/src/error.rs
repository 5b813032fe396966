use std::fmt;

/// Whether a `SessionStart` failure should be retried (NACK) or is final
/// (ACK with the session left in a terminal row state) — §4.5 step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryable {
    Transient,
    Permanent,
}

#[derive(Debug)]
pub enum SessionHandlerError {
    Store(bg_store::StoreError),
    Provider(bg_provider::ProviderError),
    StartTimedOut,
    Internal(anyhow::Error),
}

impl SessionHandlerError {
    /// Classifies whether the task that produced this error should be
    /// retried. Provider-side failures are transient (the provider may be
    /// temporarily overloaded) *unless* the provider itself says the
    /// failure is permanent (bad config, quota, auth — §4.5 step 5); store
    /// errors and a start timeout are permanent — retrying them would just
    /// repeat the same outcome.
    pub fn retryable(&self) -> Retryable {
        match self {
            SessionHandlerError::Provider(bg_provider::ProviderError::Permanent(_)) => Retryable::Permanent,
            SessionHandlerError::Provider(_) => Retryable::Transient,
            _ => Retryable::Permanent,
        }
    }
}

impl fmt::Display for SessionHandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionHandlerError::Store(e) => write!(f, "session handler store error: {e}"),
            SessionHandlerError::Provider(e) => write!(f, "session handler provider error: {e}"),
            SessionHandlerError::StartTimedOut => write!(f, "session start exceeded start budget"),
            SessionHandlerError::Internal(e) => write!(f, "session handler error: {e}"),
        }
    }
}

impl std::error::Error for SessionHandlerError {}

impl From<bg_store::StoreError> for SessionHandlerError {
    fn from(e: bg_store::StoreError) -> Self {
        SessionHandlerError::Store(e)
    }
}

impl From<bg_provider::ProviderError> for SessionHandlerError {
    fn from(e: bg_provider::ProviderError) -> Self {
        SessionHandlerError::Provider(e)
    }
}

pub type SessionHandlerResult<T> = Result<T, SessionHandlerError>;
