//! Append-only movement log boundary.
//!
//! This module defines the storage abstraction behind the ledger: streams of
//! immutable events keyed by aggregate, with optimistic concurrency on
//! append and a read-only query interface for the movement feed. No update
//! or delete operation exists anywhere in this module; audit integrity
//! depends on that.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::{EventFilter, EventQuery, EventQueryResult, Pagination};
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
