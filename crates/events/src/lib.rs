//! `storekeeper-events` — event abstractions shared by the ledger pipeline.
//!
//! Defines the event contract, the committed-event envelope, and the pub/sub
//! bus boundary that distributes committed events to projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
