//! Core types, errors, and configuration shared across the coordination engine.

pub mod config;
pub mod error;
pub mod model;

pub use config::{EngineConfig, RedisConf};
pub use error::{Error, Result};
pub use model::{Broker, FetchError, Message, PartitionState};
