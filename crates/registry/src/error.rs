//! Registry-specific error type, convertible into the shared engine error.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    #[error("key not found")]
    NotFound,
    #[error("redis error: {0}")]
    Redis(String),
    #[error("timeout waiting on registry")]
    Timeout,
}

impl From<redis::RedisError> for RegistryError {
    fn from(err: redis::RedisError) -> Self {
        RegistryError::Redis(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for RegistryError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RegistryError::Timeout
    }
}

impl From<RegistryError> for engine_core::Error {
    fn from(err: RegistryError) -> Self {
        engine_core::Error::registry(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
