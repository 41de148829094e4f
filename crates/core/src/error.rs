//! Unified error type for the coordination engine.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the coordination engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("registry error: {0}")]
    Registry(String),

    #[error("broker connect error: {0}")]
    Connect(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("produce error: {0}")]
    Produce(String),

    #[error("metadata fetch returned no topics")]
    NoMetadata,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn produce(msg: impl Into<String>) -> Self {
        Self::Produce(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
