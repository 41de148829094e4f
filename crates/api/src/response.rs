//! Standardized API responses.

use serde::{Deserialize, Serialize};

/// Health check response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub broker_connected: bool,
    pub registry_connected: bool,
    pub owned_partitions: u64,
}
