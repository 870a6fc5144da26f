// Error types raised by the task store and CSV import

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("task {0} is already completed")]
    AlreadyCompleted(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("task store lock was poisoned")]
    LockPoisoned,
}

impl TrackerError {
    pub fn task_not_found(id: &str) -> Self {
        TrackerError::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub fn creature_not_found(id: &str) -> Self {
        TrackerError::NotFound {
            kind: "creature",
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
