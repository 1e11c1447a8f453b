use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid root directory: {0}")]
    InvalidRoot(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Checkpoint {} is locked by another run", .0.display())]
    CheckpointLocked(PathBuf),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl IndexerError {
    pub fn pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }
}
