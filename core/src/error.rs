use thiserror::Error;

/// Error taxonomy shared by every engine operation.
///
/// Component-level functions return the most specific kind; orchestration
/// code propagates the first failure unchanged. `Io` and `Corrupt` are
/// fatal to the in-progress operation and are never retried.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("No space left on volume: {0}")]
    OutOfSpace(String),

    #[error("Invalid offset {offset} (file size {size})")]
    InvalidOffset { offset: u64, size: u64 },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Volume corrupt: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
