use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use storekeeper_core::AggregateId;
use storekeeper_events::EventEnvelope;
use storekeeper_ledger::{ProductEvent, ProductId};

use crate::read_model::ReadModelStore;

/// Queryable stock read model: the cached projection of a product's movement
/// history. This is the fast-read "current stock" cache; the movement log
/// stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevelRow {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub min_stock_level: i64,
}

#[derive(Debug, Error)]
pub enum StockProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("event stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock levels projection.
///
/// Consumes published envelopes (JSON payloads) and maintains the per-product
/// stock cache. Read models are disposable and rebuildable from the log.
///
/// The projection is the only writer of the cache; query paths only read.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevelRow>,
{
    store: S,
    /// Per-stream cursor supporting at-least-once delivery (idempotent apply).
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevelRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the cached row for one product.
    pub fn get(&self, product_id: &ProductId) -> Option<StockLevelRow> {
        self.store.get(product_id)
    }

    /// List all cached rows.
    pub fn list(&self) -> Vec<StockLevelRow> {
        self.store.list()
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut cursors = self
            .cursors
            .write()
            .map_err(|_| StockProjectionError::StreamMismatch("cursor lock poisoned".to_string()))?;

        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if seq == 0 {
            return Err(StockProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }

        if last != 0 && seq != last + 1 {
            // The first event may carry any positive sequence (stores start at
            // 1); after that only strict increments are accepted.
            return Err(StockProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockProjectionError::Deserialize(e.to_string()))?;

        let product_id = match &event {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::StockAdjusted(e) => e.product_id,
            ProductEvent::MinStockLevelSet(e) => e.product_id,
        };

        if product_id.0 != aggregate_id {
            return Err(StockProjectionError::StreamMismatch(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    StockLevelRow {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.name,
                        stock: 0,
                        min_stock_level: e.min_stock_level,
                    },
                );
            }
            ProductEvent::StockAdjusted(e) => {
                let mut row = self.store.get(&e.product_id).unwrap_or(StockLevelRow {
                    product_id: e.product_id,
                    sku: String::new(),
                    name: String::new(),
                    stock: 0,
                    min_stock_level: 0,
                });
                // The recorded post-movement stock is authoritative.
                row.stock = e.new_stock;
                self.store.upsert(e.product_id, row);
            }
            ProductEvent::MinStockLevelSet(e) => {
                if let Some(mut row) = self.store.get(&e.product_id) {
                    row.min_stock_level = e.min_stock_level;
                    self.store.upsert(e.product_id, row);
                }
            }
        }

        // Advance cursor after successful apply.
        cursors.insert(aggregate_id, seq);

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        // Deterministic replay order: aggregate, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
