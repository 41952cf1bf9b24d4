//! Read-only inventory views.
//!
//! Listings come from the stock cache, history from the movement log.
//! Nothing here mutates state or blocks writers.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use storekeeper_ledger::{ProductEvent, ProductId, StockMovement, StockStatus, classify};

use crate::adjustment::PRODUCT_AGGREGATE_TYPE;
use crate::event_store::{EventFilter, EventQuery, EventStore, EventStoreError, Pagination};
use crate::projections::stock_levels::{StockLevelRow, StockLevelsProjection};
use crate::read_model::ReadModelStore;

/// One inventory listing entry: the cached stock row plus its derived status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub level: StockLevelRow,
    pub status: StockStatus,
}

/// One page of the movement feed, newest first.
#[derive(Debug, Clone)]
pub struct MovementPage {
    pub movements: Vec<StockMovement>,
    pub total: u64,
    pub has_more: bool,
}

/// Result of replaying a product's movements against the cached stock.
///
/// Divergence is a defect, not an expected state; the report only surfaces
/// it, nothing repairs the cache silently.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub product_id: ProductId,
    /// Stock derived by summing all movements from zero.
    pub replayed_stock: i64,
    /// Stock currently held by the cache (absent when the projection has not
    /// seen the product yet).
    pub cached_stock: Option<i64>,
    pub movement_count: u64,
    /// Every recorded `new_stock` matched the running sum at its prefix.
    pub history_consistent: bool,
    /// History is consistent and the cache agrees with the replayed total.
    pub consistent: bool,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("product not found")]
    UnknownProduct,

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),
}

/// Read-only query service over the stock cache and the movement log.
#[derive(Debug)]
pub struct InventoryQueryService<P, Q>
where
    P: ReadModelStore<ProductId, StockLevelRow>,
{
    projection: Arc<StockLevelsProjection<P>>,
    store: Q,
}

impl<P, Q> InventoryQueryService<P, Q>
where
    P: ReadModelStore<ProductId, StockLevelRow>,
    Q: EventStore + EventQuery,
{
    pub fn new(projection: Arc<StockLevelsProjection<P>>, store: Q) -> Self {
        Self { projection, store }
    }

    /// List current stock with computed status badges.
    ///
    /// `search` matches name or SKU case-insensitively; `status` keeps only
    /// rows with that badge. Unset filters pass everything through. Ordering
    /// is deterministic, so repeated calls without intervening writes return
    /// identical results.
    pub fn list_inventory(
        &self,
        search: Option<&str>,
        status: Option<StockStatus>,
    ) -> Vec<InventoryRow> {
        let needle = search.map(|s| s.to_lowercase());

        let mut rows: Vec<InventoryRow> = self
            .projection
            .list()
            .into_iter()
            .filter(|row| match &needle {
                Some(n) => {
                    row.name.to_lowercase().contains(n.as_str())
                        || row.sku.to_lowercase().contains(n.as_str())
                }
                None => true,
            })
            .map(|level| {
                let status = classify(level.stock, level.min_stock_level);
                InventoryRow { level, status }
            })
            .filter(|row| status.is_none_or(|wanted| row.status == wanted))
            .collect();

        rows.sort_by(|a, b| {
            a.level
                .name
                .cmp(&b.level.name)
                .then_with(|| a.level.product_id.0.as_uuid().cmp(b.level.product_id.0.as_uuid()))
        });

        rows
    }

    /// Paginated movement history, newest first.
    ///
    /// Scoped to one product when `product_id` is given, the global feed
    /// otherwise.
    pub async fn list_movements(
        &self,
        product_id: Option<ProductId>,
        pagination: Pagination,
    ) -> Result<MovementPage, QueryError> {
        let filter = EventFilter {
            aggregate_id: product_id.map(|p| p.0),
            aggregate_type: Some(PRODUCT_AGGREGATE_TYPE.to_string()),
            event_type: Some("ledger.product.stock_adjusted".to_string()),
            ..Default::default()
        };

        let result = self.store.query_events(filter, pagination).await?;

        let mut movements = Vec::with_capacity(result.events.len());
        for stored in &result.events {
            let event: ProductEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| QueryError::Deserialize(e.to_string()))?;
            match event {
                ProductEvent::StockAdjusted(e) => {
                    movements.push(StockMovement::from_event(stored.event_id, &e));
                }
                other => {
                    return Err(QueryError::Deserialize(format!(
                        "unexpected event in movement feed: {other:?}"
                    )));
                }
            }
        }

        Ok(MovementPage {
            movements,
            total: result.total,
            has_more: result.has_more,
        })
    }

    /// Recompute a product's stock from its movement log and compare it to
    /// the cached value.
    pub fn reconcile(&self, product_id: ProductId) -> Result<ReconciliationReport, QueryError> {
        let stream = self.store.load_stream(product_id.0)?;
        if stream.is_empty() {
            return Err(QueryError::UnknownProduct);
        }

        let mut running = 0i64;
        let mut movement_count = 0u64;
        let mut history_consistent = true;

        for stored in &stream {
            let event: ProductEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| QueryError::Deserialize(e.to_string()))?;
            if let ProductEvent::StockAdjusted(e) = event {
                running += e.change_amount;
                if running != e.new_stock {
                    history_consistent = false;
                }
                movement_count += 1;
            }
        }

        let cached_stock = self.projection.get(&product_id).map(|row| row.stock);
        let consistent = history_consistent && cached_stock == Some(running);

        if !consistent {
            tracing::warn!(
                %product_id,
                replayed_stock = running,
                ?cached_stock,
                history_consistent,
                "stock cache diverged from movement log"
            );
        }

        Ok(ReconciliationReport {
            product_id,
            replayed_stock: running,
            cached_stock,
            movement_count,
            history_consistent,
            consistent,
        })
    }
}
