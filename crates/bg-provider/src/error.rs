use std::fmt;

#[derive(Debug)]
pub enum ProviderError {
    NotFound(String),
    Unhealthy(String),
    /// A non-retryable provider-side failure: bad config, quota exceeded,
    /// unauthorized — a 4xx from the workload daemon, which retrying would
    /// just reproduce (§4.5 step 5, §7 `provider_permanent`).
    Permanent(String),
    Transport(anyhow::Error),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::NotFound(handle) => write!(f, "workload not found: {handle}"),
            ProviderError::Unhealthy(reason) => write!(f, "workload unhealthy: {reason}"),
            ProviderError::Permanent(reason) => write!(f, "provider permanent error: {reason}"),
            ProviderError::Transport(e) => write!(f, "provider transport error: {e}"),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(e: anyhow::Error) -> Self {
        ProviderError::Transport(e)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.into())
    }
}
