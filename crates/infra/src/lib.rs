//! `storekeeper-infra` — infrastructure composition for the stock ledger.
//!
//! Composes the append-only movement log (event store), the command
//! dispatcher, the stock-levels projection, the adjustment service and the
//! read-only query service. Domain crates stay pure; everything with IO or
//! shared state lives here.

pub mod adjustment;
pub mod command_dispatcher;
pub mod event_store;
pub mod inventory_query;
pub mod projections;
pub mod read_model;

mod integration_tests;

pub use adjustment::{AdjustmentRequest, AdjustmentService};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventFilter, EventQuery, EventQueryResult, EventStore, EventStoreError, InMemoryEventStore,
    Pagination, PostgresEventStore, StoredEvent, UncommittedEvent,
};
pub use inventory_query::{InventoryQueryService, InventoryRow, MovementPage, QueryError, ReconciliationReport};
pub use projections::stock_levels::{StockLevelRow, StockLevelsProjection, StockProjectionError};
pub use read_model::{InMemoryReadModelStore, ReadModelStore};
