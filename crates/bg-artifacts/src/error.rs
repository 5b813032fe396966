use std::fmt;

#[derive(Debug)]
pub enum ArtifactError {
    HashMismatch { expected: String, actual: String },
    NotFound(String),
    Transport(anyhow::Error),
    Io(std::io::Error),
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::HashMismatch { expected, actual } => {
                write!(f, "hash_mismatch: expected {expected}, got {actual}")
            }
            ArtifactError::NotFound(key) => write!(f, "artifact not found: {key}"),
            ArtifactError::Transport(e) => write!(f, "artifact transport error: {e}"),
            ArtifactError::Io(e) => write!(f, "artifact io error: {e}"),
        }
    }
}

impl std::error::Error for ArtifactError {}

impl From<std::io::Error> for ArtifactError {
    fn from(e: std::io::Error) -> Self {
        ArtifactError::Io(e)
    }
}

impl From<anyhow::Error> for ArtifactError {
    fn from(e: anyhow::Error) -> Self {
        ArtifactError::Transport(e)
    }
}
