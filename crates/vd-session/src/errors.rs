use thiserror::Error;

/// Session and registry layer error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Crypto failure: {0}")]
    Crypto(String),

    #[error("Stored session data is corrupted or was written with another key")]
    CorruptedStore,

    #[error("Session id contains characters that never appear in generated ids")]
    InvalidSessionId,

    #[error("Internal lock poisoned")]
    LockPoisoned,

    #[error("Timed out waiting for the store lock")]
    LockTimeout,

    #[error("Could not determine a storage directory")]
    NoStorageDir,

    #[error("Account {0} is not in the registry")]
    UnknownAccount(String),

    #[error("No stored session for account {0} - a fresh login is required")]
    AccountSessionMissing(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
