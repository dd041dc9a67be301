use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid session state: {0}")]
    InvalidSession(String),
    #[error("Snapshot rejected: {0}")]
    InvalidSnapshot(String),
    #[error("Not enough coins: need {required}, have {available}")]
    InsufficientCoins { required: u64, available: u64 },
    #[error("State lock poisoned: {0}")]
    LockPoisoned(String),
}
