//! Internal telemetry: in-process metrics and health aggregation for the
//! coordination engine.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
