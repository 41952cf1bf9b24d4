//! Integration tests for the full ledger pipeline.
//!
//! Command → EventStore → EventBus → Projection → Queries
//!
//! Verifies:
//! - Adjustments update the movement log and the stock cache together
//! - Rejected adjustments leave both completely unchanged
//! - Concurrent adjustments on one product serialize without lost updates
//! - The movement feed and the reconciliation check agree with the log

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use storekeeper_core::{AggregateId, DomainError};
    use storekeeper_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use storekeeper_ledger::{
        CreateProduct, MovementKind, Product, ProductCommand, ProductId, StockMovement,
        StockStatus,
    };

    use crate::adjustment::{AdjustmentRequest, AdjustmentService, PRODUCT_AGGREGATE_TYPE};
    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{EventQuery, EventStore, InMemoryEventStore, Pagination};
    use crate::inventory_query::InventoryQueryService;
    use crate::projections::stock_levels::{StockLevelRow, StockLevelsProjection};
    use crate::read_model::InMemoryReadModelStore;

    type Store = Arc<InMemoryEventStore>;
    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type RowStore = Arc<InMemoryReadModelStore<ProductId, StockLevelRow>>;

    struct Harness {
        store: Store,
        dispatcher: CommandDispatcher<Store, Bus>,
        adjustments: Arc<AdjustmentService<Store, Bus>>,
        queries: InventoryQueryService<RowStore, Store>,
        projection: Arc<StockLevelsProjection<RowStore>>,
    }

    fn setup() -> Harness {
        let store: Store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());

        let row_store: RowStore = Arc::new(InMemoryReadModelStore::new());
        let projection = Arc::new(StockLevelsProjection::new(row_store));

        // Subscribe to the bus BEFORE any events are published.
        let projection_clone = projection.clone();
        let bus_clone = bus.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let sub = bus_clone.subscribe();
            let _ = ready_tx.send(());
            loop {
                match sub.recv() {
                    Ok(env) => {
                        if let Err(e) = projection_clone.apply_envelope(&env) {
                            eprintln!("Failed to apply envelope: {e:?}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        // Ensure the subscriber is ready before returning (prevents missing early events).
        let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

        Harness {
            store: store.clone(),
            dispatcher: CommandDispatcher::new(store.clone(), bus.clone()),
            adjustments: Arc::new(AdjustmentService::new(store.clone(), bus)),
            queries: InventoryQueryService::new(projection.clone(), store),
            projection,
        }
    }

    /// The subscriber thread applies events asynchronously; give it a moment.
    fn wait_for_processing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    fn create_product(h: &Harness, sku: &str, name: &str, min_stock_level: i64) -> ProductId {
        let agg = AggregateId::new();
        let product_id = ProductId::new(agg);
        h.dispatcher
            .dispatch::<Product>(
                agg,
                PRODUCT_AGGREGATE_TYPE,
                ProductCommand::CreateProduct(CreateProduct {
                    product_id,
                    sku: sku.to_string(),
                    name: name.to_string(),
                    min_stock_level,
                    occurred_at: Utc::now(),
                }),
                |id| Product::empty(ProductId::new(id)),
            )
            .unwrap();
        product_id
    }

    fn adjust(
        h: &Harness,
        product_id: ProductId,
        delta: i64,
        kind: MovementKind,
    ) -> Result<StockMovement, DispatchError> {
        h.adjustments.apply_adjustment(AdjustmentRequest {
            product_id,
            delta,
            kind,
            variant_id: None,
            notes: None,
            actor_id: None,
            idempotency_key: None,
            occurred_at: Utc::now(),
        })
    }

    fn status_of(h: &Harness, product_id: ProductId) -> StockStatus {
        h.queries
            .list_inventory(None, None)
            .into_iter()
            .find(|row| row.level.product_id == product_id)
            .map(|row| row.status)
            .expect("product missing from inventory listing")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn adjustments_corrections_and_history() {
        let h = setup();
        let product_id = create_product(&h, "SKU-P", "Widget", 5);

        // Seed on-hand stock.
        let seeded = adjust(&h, product_id, 20, MovementKind::Restock).unwrap();
        assert_eq!(seeded.new_stock, 20);

        // Deduct most of it: accepted, drops to the low-stock band.
        let m = adjust(&h, product_id, -18, MovementKind::ManualAdjustment).unwrap();
        assert_eq!(m.change_amount, -18);
        assert_eq!(m.new_stock, 2);
        wait_for_processing();
        assert_eq!(status_of(&h, product_id), StockStatus::LowStock);

        // Deduct below zero: rejected, stock unchanged.
        let err = adjust(&h, product_id, -5, MovementKind::ManualAdjustment).unwrap_err();
        match err {
            DispatchError::Domain(DomainError::InsufficientStock { on_hand, requested }) => {
                assert_eq!(on_hand, 2);
                assert_eq!(requested, -5);
            }
            e => panic!("expected InsufficientStock, got: {e:?}"),
        }
        wait_for_processing();
        assert_eq!(h.projection.get(&product_id).unwrap().stock, 2);

        // The same deduction as a correction: accepted, stock goes negative.
        let m = adjust(&h, product_id, -5, MovementKind::Correction).unwrap();
        assert_eq!(m.new_stock, -3);
        wait_for_processing();
        assert_eq!(status_of(&h, product_id), StockStatus::OutOfStock);

        // History holds exactly the accepted movements, newest first.
        let page = h
            .queries
            .list_movements(Some(product_id), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        let kinds: Vec<MovementKind> = page.movements.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::Correction,
                MovementKind::ManualAdjustment,
                MovementKind::Restock
            ]
        );
        assert_eq!(page.movements[0].new_stock, -3);
    }

    #[test]
    fn concurrent_adjustments_serialize_without_lost_updates() {
        let h = setup();
        let product_id = create_product(&h, "SKU-C", "Contended", 0);
        adjust(&h, product_id, 10, MovementKind::Restock).unwrap();

        let service_a = h.adjustments.clone();
        let service_b = h.adjustments.clone();

        let t1 = std::thread::spawn(move || {
            service_a.apply_adjustment(AdjustmentRequest {
                product_id,
                delta: 5,
                kind: MovementKind::Restock,
                variant_id: None,
                notes: None,
                actor_id: None,
                idempotency_key: None,
                occurred_at: Utc::now(),
            })
        });
        let t2 = std::thread::spawn(move || {
            service_b.apply_adjustment(AdjustmentRequest {
                product_id,
                delta: -3,
                kind: MovementKind::Sale,
                variant_id: None,
                notes: None,
                actor_id: None,
                idempotency_key: None,
                occurred_at: Utc::now(),
            })
        });

        t1.join().unwrap().unwrap();
        t2.join().unwrap().unwrap();

        // The loser of the optimistic race retried on the winner's committed
        // stock: both changes are recorded, nothing lost.
        wait_for_processing();
        let report = h.queries.reconcile(product_id).unwrap();
        assert_eq!(report.replayed_stock, 12);
        assert_eq!(report.cached_stock, Some(12));
        assert!(report.consistent);
    }

    #[test]
    fn rejected_adjustment_leaves_ledger_untouched() {
        let h = setup();
        let product_id = create_product(&h, "SKU-R", "Rejected", 0);
        adjust(&h, product_id, 2, MovementKind::Restock).unwrap();

        let before = h.store.load_stream(product_id.0).unwrap();

        let err = adjust(&h, product_id, -5, MovementKind::Sale).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Domain(DomainError::InsufficientStock { .. })
        ));

        let after = h.store.load_stream(product_id.0).unwrap();
        assert_eq!(before, after);

        wait_for_processing();
        assert_eq!(h.projection.get(&product_id).unwrap().stock, 2);
    }

    #[test]
    fn idempotent_retry_returns_original_movement() {
        let h = setup();
        let product_id = create_product(&h, "SKU-I", "Idempotent", 0);

        let request = AdjustmentRequest {
            product_id,
            delta: 10,
            kind: MovementKind::Restock,
            variant_id: None,
            notes: None,
            actor_id: None,
            idempotency_key: Some("retry-1".to_string()),
            occurred_at: Utc::now(),
        };

        let first = h.adjustments.apply_adjustment(request.clone()).unwrap();
        let events_after_first = h.store.load_stream(product_id.0).unwrap().len();

        // Timeout retry: same key, no new append, the original movement back.
        let second = h.adjustments.apply_adjustment(request).unwrap();
        assert_eq!(first, second);
        assert_eq!(h.store.load_stream(product_id.0).unwrap().len(), events_after_first);

        wait_for_processing();
        assert_eq!(h.projection.get(&product_id).unwrap().stock, 10);
    }

    #[test]
    fn inventory_listing_filters_and_repeats() {
        let h = setup();
        let blue = create_product(&h, "SKU-MUG-B", "Blue Mug", 3);
        let red = create_product(&h, "SKU-MUG-R", "Red Mug", 5);
        let _poster = create_product(&h, "SKU-POSTER", "Poster", 1);

        adjust(&h, blue, 10, MovementKind::Restock).unwrap();
        adjust(&h, red, 2, MovementKind::Restock).unwrap();
        wait_for_processing();

        let all = h.queries.list_inventory(None, None);
        let names: Vec<&str> = all.iter().map(|r| r.level.name.as_str()).collect();
        assert_eq!(names, vec!["Blue Mug", "Poster", "Red Mug"]);

        // Same query twice with no writes in between: identical results.
        assert_eq!(all, h.queries.list_inventory(None, None));

        let mugs = h.queries.list_inventory(Some("mug"), None);
        assert_eq!(mugs.len(), 2);

        let low = h.queries.list_inventory(None, Some(StockStatus::LowStock));
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].level.product_id, red);

        let out = h.queries.list_inventory(None, Some(StockStatus::OutOfStock));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].level.name, "Poster");

        // Search and status filters compose.
        let low_mugs = h.queries.list_inventory(Some("mug"), Some(StockStatus::LowStock));
        assert_eq!(low_mugs.len(), 1);
        assert_eq!(low_mugs[0].level.product_id, red);
    }

    #[test]
    fn reconciliation_confirms_cache_matches_ledger() {
        let h = setup();
        let product_id = create_product(&h, "SKU-W", "Widget", 0);

        for delta in [5, 10, -3, 7] {
            adjust(&h, product_id, delta, MovementKind::ManualAdjustment).unwrap();
        }
        wait_for_processing();

        let report = h.queries.reconcile(product_id).unwrap();
        assert_eq!(report.movement_count, 4);
        assert_eq!(report.replayed_stock, 19);
        assert_eq!(report.cached_stock, Some(19));
        assert!(report.history_consistent);
        assert!(report.consistent);

        // Unknown products have no stream to reconcile.
        let missing = ProductId::new(AggregateId::new());
        assert!(matches!(
            h.queries.reconcile(missing),
            Err(crate::inventory_query::QueryError::UnknownProduct)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn movement_feed_paginates_newest_first() {
        let h = setup();
        let product_id = create_product(&h, "SKU-F", "Feed", 0);

        for delta in [1, 2, 3, 4, 5] {
            adjust(&h, product_id, delta, MovementKind::Restock).unwrap();
        }

        let page = h
            .queries
            .list_movements(Some(product_id), Pagination::new(Some(2), Some(0)))
            .await
            .unwrap();
        assert_eq!(page.movements.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        // Newest first: the +5 movement (running stock 15) leads.
        assert_eq!(page.movements[0].new_stock, 15);
        assert_eq!(page.movements[1].new_stock, 10);

        let tail = h
            .queries
            .list_movements(Some(product_id), Pagination::new(Some(2), Some(4)))
            .await
            .unwrap();
        assert_eq!(tail.movements.len(), 1);
        assert!(!tail.has_more);
        assert_eq!(tail.movements[0].new_stock, 1);

        // The global feed spans products.
        let other = create_product(&h, "SKU-G", "Other", 0);
        adjust(&h, other, 9, MovementKind::Restock).unwrap();

        let global = h
            .queries
            .list_movements(None, Pagination::default())
            .await
            .unwrap();
        assert_eq!(global.total, 6);
        assert_eq!(global.movements[0].product_id, other);

        // A movement's id is its event id in the log.
        let stored = h
            .store
            .get_event_by_id(global.movements[0].id)
            .await
            .unwrap()
            .expect("movement missing from log");
        assert_eq!(stored.event_type, "ledger.product.stock_adjusted");
    }

    #[test]
    fn projection_rebuilds_from_log() {
        let h = setup();
        let product_id = create_product(&h, "SKU-RB", "Rebuild", 2);
        adjust(&h, product_id, 4, MovementKind::ManualAdjustment).unwrap();
        adjust(&h, product_id, -1, MovementKind::ManualAdjustment).unwrap();
        wait_for_processing();

        let before = h.projection.get(&product_id).unwrap();
        assert_eq!(before.stock, 3);

        // Read models are disposable: replaying the log reproduces the cache.
        let envelopes: Vec<_> = h
            .store
            .load_stream(product_id.0)
            .unwrap()
            .iter()
            .map(|e| e.to_envelope())
            .collect();
        h.projection.rebuild_from_scratch(envelopes).unwrap();

        assert_eq!(h.projection.get(&product_id).unwrap(), before);
    }
}
