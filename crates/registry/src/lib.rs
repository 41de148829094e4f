//! Group membership, distributed partition locks, and offset persistence.

pub mod client;
pub mod config;
pub mod error;

pub use client::{GroupRegistry, RedisGroupRegistry};
pub use error::{RegistryError, Result};
