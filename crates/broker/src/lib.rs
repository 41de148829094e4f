//! Kafka-compatible broker connectivity: metadata resolution, per-partition
//! fetch, and offset lookup.

pub mod config;
pub mod fetch;
pub mod health;
pub mod metadata;
pub mod offset;

pub use fetch::{FetchProducer, RskafkaFetchProducer};
pub use metadata::get_metadata;
pub use offset::{OffsetProducer, RskafkaOffsetProducer};
