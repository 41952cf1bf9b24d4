//! Observability: tracing/logging initialization for storekeeper services.

pub mod tracing;

pub use tracing::init;
