//! Read-side projections fed by the event bus.

pub mod stock_levels;

pub use stock_levels::{StockLevelRow, StockLevelsProjection, StockProjectionError};
