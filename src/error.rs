use std::path::PathBuf;
use thiserror::Error;

/// Error type for index operations
#[derive(Error, Debug)]
pub enum HootError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted structure failed validation. Never retried or repaired.
    #[error("Corrupt data in {path} at offset {offset}: {reason}")]
    Corrupt {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid wildcard pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(u32),

    #[error("Record not found: {0}")]
    RecordNotFound(u32),

    #[error("Word id {0} was never allocated")]
    UnknownWord(u32),

    #[error("Document storage is disabled for this index")]
    NoDocuments,

    #[error("Engine was shut down")]
    Closed,
}

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, HootError>;

impl HootError {
    pub fn corrupt(path: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        HootError::Corrupt {
            path: path.into(),
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error indicates on-disk corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, HootError::Corrupt { .. })
    }
}
