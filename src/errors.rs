// meshrestore/src/errors.rs
use thiserror::Error;

/// Failure taxonomy for the restore engine. Everything raised here is folded
/// into a `RestoreResult` at the orchestrator boundary; no error escapes
/// `restore_from_backup` to the caller.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Backup validation failed: {0}")]
    Validation(String),

    #[error("Backup metadata unreadable: {0}")]
    Metadata(String),

    #[error("Schema compatibility: {0}")]
    Compatibility(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup data file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RestoreError>;
