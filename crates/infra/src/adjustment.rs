//! The adjustment service: the single writer of stock movements.
//!
//! Validates and applies one stock change by dispatching an `AdjustStock`
//! command through the event-sourcing pipeline. Movement creation and the
//! stock update are one committed event; a rejected adjustment persists
//! nothing.
//!
//! Per-product serialization comes from the store's optimistic version
//! check: when two adjustments race on the same product, the loser reloads
//! the winner's committed stock and retries, up to a bounded budget.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storekeeper_core::{ActorId, VariantId};
use storekeeper_events::{EventBus, EventEnvelope};
use storekeeper_ledger::{
    AdjustStock, MovementKind, Product, ProductCommand, ProductEvent, ProductId, StockMovement,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, EventStoreError, StoredEvent};

/// Stream type identifier for product aggregates.
pub const PRODUCT_AGGREGATE_TYPE: &str = "ledger.product";

/// Bounded local retry budget for optimistic concurrency conflicts.
const MAX_ADJUST_ATTEMPTS: usize = 3;

/// One requested stock change, as received from the transport layer.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub product_id: ProductId,
    pub delta: i64,
    pub kind: MovementKind,
    pub variant_id: Option<VariantId>,
    pub notes: Option<String>,
    pub actor_id: Option<ActorId>,
    /// Client-supplied key making timeout retries safe.
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Applies stock adjustments through the command pipeline.
#[derive(Debug)]
pub struct AdjustmentService<S, B> {
    store: S,
    dispatcher: CommandDispatcher<S, B>,
}

impl<S, B> AdjustmentService<S, B>
where
    S: EventStore + Clone,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store: store.clone(),
            dispatcher: CommandDispatcher::new(store, bus),
        }
    }

    /// Apply a single signed stock change and return the recorded movement.
    ///
    /// Retries concurrency conflicts locally with fresh state before
    /// surfacing them; every other error is returned verbatim. When the
    /// request's idempotency key was already applied, the previously
    /// recorded movement is returned and nothing new is appended.
    pub fn apply_adjustment(
        &self,
        request: AdjustmentRequest,
    ) -> Result<StockMovement, DispatchError> {
        let mut attempt = 0;
        loop {
            let command = ProductCommand::AdjustStock(AdjustStock {
                product_id: request.product_id,
                variant_id: request.variant_id,
                delta: request.delta,
                kind: request.kind,
                notes: request.notes.clone(),
                actor_id: request.actor_id,
                idempotency_key: request.idempotency_key.clone(),
                occurred_at: request.occurred_at,
            });

            match self.dispatcher.dispatch::<Product>(
                request.product_id.0,
                PRODUCT_AGGREGATE_TYPE,
                command,
                |id| Product::empty(ProductId::new(id)),
            ) {
                Ok(committed) => {
                    if let Some(movement) = movement_from_committed(&committed)? {
                        return Ok(movement);
                    }
                    // Nothing emitted: the idempotency key was seen before.
                    return self.find_recorded_movement(&request);
                }
                Err(DispatchError::Concurrency(msg)) => {
                    attempt += 1;
                    if attempt >= MAX_ADJUST_ATTEMPTS {
                        return Err(DispatchError::Concurrency(msg));
                    }
                    tracing::debug!(
                        attempt,
                        product_id = %request.product_id,
                        "concurrent adjustment detected, retrying with fresh state"
                    );
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Look up the movement originally recorded for a replayed idempotency
    /// key.
    fn find_recorded_movement(
        &self,
        request: &AdjustmentRequest,
    ) -> Result<StockMovement, DispatchError> {
        let Some(key) = request.idempotency_key.as_deref() else {
            // The aggregate only decides "nothing" for replayed keys.
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "adjustment committed no event and carried no idempotency key".to_string(),
            )));
        };

        let stream = self.store.load_stream(request.product_id.0)?;
        for stored in stream.iter().rev() {
            let event: ProductEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            if let ProductEvent::StockAdjusted(e) = event {
                if e.idempotency_key.as_deref() == Some(key) {
                    return Ok(StockMovement::from_event(stored.event_id, &e));
                }
            }
        }

        Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
            "no recorded movement for idempotency key '{key}'"
        ))))
    }
}

fn movement_from_committed(
    committed: &[StoredEvent],
) -> Result<Option<StockMovement>, DispatchError> {
    for stored in committed.iter().rev() {
        let event: ProductEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        if let ProductEvent::StockAdjusted(e) = event {
            return Ok(Some(StockMovement::from_event(stored.event_id, &e)));
        }
    }
    Ok(None)
}
