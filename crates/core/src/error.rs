use thiserror::Error;

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot perform this operation at all.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("object not found: gs://{bucket}/{name}")]
    NotFound { bucket: String, name: String },

    #[error("upload size mismatch for {name}: declared {declared} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    #[error("invalid object name: {0}")]
    InvalidName(String),

    #[error("invalid storage configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything the remote client reports, passed through as-is.
    #[error(transparent)]
    Transport(anyhow::Error),
}

impl StorageError {
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(err.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
