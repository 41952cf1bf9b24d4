use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use storekeeper_core::{Aggregate, AggregateId};
use storekeeper_events::{EventEnvelope, InMemoryEventBus};
use storekeeper_infra::adjustment::PRODUCT_AGGREGATE_TYPE;
use storekeeper_infra::command_dispatcher::CommandDispatcher;
use storekeeper_infra::event_store::InMemoryEventStore;
use storekeeper_ledger::{
    AdjustStock, CreateProduct, MovementKind, Product, ProductCommand, ProductEvent, ProductId,
    StockAdjusted,
};

fn setup_dispatcher() -> CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>
{
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    CommandDispatcher::new(store, bus)
}

fn create_cmd(product_id: ProductId) -> ProductCommand {
    ProductCommand::CreateProduct(CreateProduct {
        product_id,
        sku: "SKU-BENCH".to_string(),
        name: "Bench Product".to_string(),
        min_stock_level: 5,
        occurred_at: Utc::now(),
    })
}

fn adjust_cmd(product_id: ProductId, delta: i64) -> ProductCommand {
    ProductCommand::AdjustStock(AdjustStock {
        product_id,
        variant_id: None,
        delta,
        kind: MovementKind::Restock,
        notes: None,
        actor_id: None,
        idempotency_key: None,
        occurred_at: Utc::now(),
    })
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // CreateProduct on a fresh stream (no history to replay).
    group.bench_function("create_product_fresh", |b| {
        let dispatcher = setup_dispatcher();
        b.iter(|| {
            let agg = AggregateId::new();
            let product_id = ProductId::new(agg);
            dispatcher
                .dispatch::<Product>(
                    agg,
                    PRODUCT_AGGREGATE_TYPE,
                    black_box(create_cmd(product_id)),
                    |id| Product::empty(ProductId::new(id)),
                )
                .unwrap();
        });
    });

    // AdjustStock on a stream that keeps growing (replay cost included).
    group.bench_function("adjust_stock_with_history", |b| {
        let dispatcher = setup_dispatcher();
        let agg = AggregateId::new();
        let product_id = ProductId::new(agg);
        dispatcher
            .dispatch::<Product>(agg, PRODUCT_AGGREGATE_TYPE, create_cmd(product_id), |id| {
                Product::empty(ProductId::new(id))
            })
            .unwrap();

        b.iter(|| {
            dispatcher
                .dispatch::<Product>(
                    agg,
                    PRODUCT_AGGREGATE_TYPE,
                    black_box(adjust_cmd(product_id, 1)),
                    |id| Product::empty(ProductId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_replay_rehydration(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_rehydration");

    for event_count in [100u64, 1_000, 10_000] {
        let product_id = ProductId::new(AggregateId::new());

        let mut events = vec![ProductEvent::ProductCreated(storekeeper_ledger::ProductCreated {
            product_id,
            sku: "SKU-BENCH".to_string(),
            name: "Bench Product".to_string(),
            min_stock_level: 5,
            occurred_at: Utc::now(),
        })];
        let mut stock = 0i64;
        for _ in 0..event_count {
            stock += 1;
            events.push(ProductEvent::StockAdjusted(StockAdjusted {
                product_id,
                variant_id: None,
                change_amount: 1,
                new_stock: stock,
                kind: MovementKind::Restock,
                notes: None,
                actor_id: None,
                idempotency_key: None,
                occurred_at: Utc::now(),
            }));
        }

        group.throughput(Throughput::Elements(event_count));
        group.bench_with_input(
            BenchmarkId::from_parameter(event_count),
            &events,
            |b, events| {
                b.iter(|| {
                    let mut product = Product::empty(product_id);
                    for event in events {
                        product.apply(black_box(event));
                    }
                    black_box(product.stock())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_command_execution_latency, bench_replay_rehydration);
criterion_main!(benches);
