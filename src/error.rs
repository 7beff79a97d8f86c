use thiserror::Error;

#[derive(Debug, Error)]
pub enum KmapError {
    #[error("invalid difficulty level {0}: expected 1..=4")]
    InvalidDifficulty(u8),
    #[error("knowledge grid not initialized")]
    NotInitialized,
    #[error("unknown domain: {0}")]
    UnknownDomain(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KmapError>;
