use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use storekeeper_core::{AggregateId, DomainError};
use storekeeper_events::{EventBus, EventEnvelope, InMemoryEventBus};
use storekeeper_infra::{
    adjustment::{AdjustmentRequest, AdjustmentService},
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, Pagination, PostgresEventStore, StoredEvent},
    inventory_query::{InventoryQueryService, InventoryRow, MovementPage, QueryError, ReconciliationReport},
    projections::stock_levels::{StockLevelRow, StockLevelsProjection},
    read_model::InMemoryReadModelStore,
};
use storekeeper_ledger::{ProductId, StockMovement, StockStatus};

use crate::config::AppConfig;

/// Realtime message broadcasted via SSE.
///
/// Cache invalidation only: it tells a UI that a projection moved, never the
/// authoritative state. Clients re-query; they do not apply these.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type RowStore = Arc<InMemoryReadModelStore<ProductId, StockLevelRow>>;
type Projection = Arc<StockLevelsProjection<RowStore>>;

// Type-erased dispatchers per storage backend.
type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type PersistentDispatcher = CommandDispatcher<Arc<PostgresEventStore>, Bus>;

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        dispatcher: Arc<InMemoryDispatcher>,
        adjustments: Arc<AdjustmentService<Arc<InMemoryEventStore>, Bus>>,
        queries: Arc<InventoryQueryService<RowStore, Arc<InMemoryEventStore>>>,
        projection: Projection,
        realtime_tx: broadcast::Sender<RealtimeMessage>,
    },
    Persistent {
        dispatcher: Arc<PersistentDispatcher>,
        adjustments: Arc<AdjustmentService<Arc<PostgresEventStore>, Bus>>,
        queries: Arc<InventoryQueryService<RowStore, Arc<PostgresEventStore>>>,
        projection: Projection,
        realtime_tx: broadcast::Sender<RealtimeMessage>,
    },
}

pub async fn build_services(config: &AppConfig) -> AppServices {
    if config.use_persistent_stores {
        match &config.database_url {
            Some(url) => return build_persistent_services(url).await,
            None => {
                tracing::warn!(
                    "USE_PERSISTENT_STORES=true but DATABASE_URL not set, falling back to in-memory"
                );
            }
        }
    }

    build_in_memory_services()
}

fn build_in_memory_services() -> AppServices {
    // In-memory infra wiring (dev/test): store + bus + projection.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let row_store: RowStore = Arc::new(InMemoryReadModelStore::new());
    let projection: Projection = Arc::new(StockLevelsProjection::new(row_store));

    // Realtime channel (SSE): lossy broadcast.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    spawn_projection_subscriber(&bus, projection.clone(), realtime_tx.clone());

    let dispatcher: Arc<InMemoryDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
    let adjustments = Arc::new(AdjustmentService::new(store.clone(), bus));
    let queries = Arc::new(InventoryQueryService::new(projection.clone(), store));

    AppServices::InMemory {
        dispatcher,
        adjustments,
        queries,
        projection,
        realtime_tx,
    }
}

async fn build_persistent_services(database_url: &str) -> AppServices {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to Postgres");

    let store = Arc::new(PostgresEventStore::new(pool));
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    // The read model cache stays in-memory and is rebuilt on restart; the
    // durable movement log is the source of truth.
    let row_store: RowStore = Arc::new(InMemoryReadModelStore::new());
    let projection: Projection = Arc::new(StockLevelsProjection::new(row_store));

    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    spawn_projection_subscriber(&bus, projection.clone(), realtime_tx.clone());

    let dispatcher: Arc<PersistentDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
    let adjustments = Arc::new(AdjustmentService::new(store.clone(), bus));
    let queries = Arc::new(InventoryQueryService::new(projection.clone(), store));

    AppServices::Persistent {
        dispatcher,
        adjustments,
        queries,
        projection,
        realtime_tx,
    }
}

/// Background subscriber: bus -> projection -> realtime notifications.
fn spawn_projection_subscriber(bus: &Bus, projection: Projection, realtime_tx: broadcast::Sender<RealtimeMessage>) {
    let sub = bus.subscribe();
    tokio::task::spawn_blocking(move || {
        loop {
            match sub.recv() {
                Ok(env) => {
                    if let Err(e) = projection.apply_envelope(&env) {
                        tracing::warn!("projection apply failed: {e}");
                        continue;
                    }

                    // Broadcast projection update (lossy; no backpressure on core).
                    let _ = realtime_tx.send(RealtimeMessage {
                        topic: "ledger.projection_updated".to_string(),
                        payload: serde_json::json!({
                            "kind": "projection_update",
                            "aggregate_type": env.aggregate_type(),
                            "aggregate_id": env.aggregate_id().to_string(),
                            "sequence_number": env.sequence_number(),
                        }),
                    });
                }
                Err(_) => break,
            }
        }
    });
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        match self {
            AppServices::InMemory { realtime_tx, .. } => realtime_tx,
            AppServices::Persistent { realtime_tx, .. } => realtime_tx,
        }
    }

    /// Dispatch a product command through the event-sourcing pipeline.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: storekeeper_core::Aggregate<Error = DomainError>,
        A::Event: storekeeper_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        match self {
            AppServices::InMemory { dispatcher, .. } => {
                dispatcher.dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
            }
            AppServices::Persistent { dispatcher, .. } => {
                dispatcher.dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
            }
        }
    }

    /// Apply one stock adjustment and return the recorded movement.
    pub fn apply_adjustment(
        &self,
        request: AdjustmentRequest,
    ) -> Result<StockMovement, DispatchError> {
        match self {
            AppServices::InMemory { adjustments, .. } => adjustments.apply_adjustment(request),
            AppServices::Persistent { adjustments, .. } => adjustments.apply_adjustment(request),
        }
    }

    pub fn list_inventory(
        &self,
        search: Option<&str>,
        status: Option<StockStatus>,
    ) -> Vec<InventoryRow> {
        match self {
            AppServices::InMemory { queries, .. } => queries.list_inventory(search, status),
            AppServices::Persistent { queries, .. } => queries.list_inventory(search, status),
        }
    }

    pub async fn list_movements(
        &self,
        product_id: Option<ProductId>,
        pagination: Pagination,
    ) -> Result<MovementPage, QueryError> {
        match self {
            AppServices::InMemory { queries, .. } => {
                queries.list_movements(product_id, pagination).await
            }
            AppServices::Persistent { queries, .. } => {
                queries.list_movements(product_id, pagination).await
            }
        }
    }

    pub fn reconcile(&self, product_id: ProductId) -> Result<ReconciliationReport, QueryError> {
        match self {
            AppServices::InMemory { queries, .. } => queries.reconcile(product_id),
            AppServices::Persistent { queries, .. } => queries.reconcile(product_id),
        }
    }

    pub fn stock_level(&self, product_id: &ProductId) -> Option<StockLevelRow> {
        match self {
            AppServices::InMemory { projection, .. } => projection.get(product_id),
            AppServices::Persistent { projection, .. } => projection.get(product_id),
        }
    }
}

/// Build the SSE stream used by `/stream`.
pub fn realtime_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
