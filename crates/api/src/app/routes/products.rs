use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storekeeper_core::AggregateId;
use storekeeper_infra::adjustment::{AdjustmentRequest, PRODUCT_AGGREGATE_TYPE};
use storekeeper_ledger::{
    CreateProduct, Product, ProductCommand, ProductId, SetMinStockLevel, classify,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/min-stock", post(set_min_stock_level))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/reconcile", get(reconcile))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        sku: body.sku,
        name: body.name,
        min_stock_level: body.min_stock_level,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Product>(agg, PRODUCT_AGGREGATE_TYPE, cmd, |id| {
        Product::empty(ProductId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let product_id = ProductId::new(agg);
    match services.stock_level(&product_id) {
        Some(level) => {
            let status = classify(level.stock, level.min_stock_level);
            (
                StatusCode::OK,
                Json(dto::inventory_row_to_json(
                    &storekeeper_infra::inventory_query::InventoryRow { level, status },
                )),
            )
                .into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "product_not_found", "product not found"),
    }
}

pub async fn set_min_stock_level(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetMinStockLevelRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let product_id = ProductId::new(agg);
    let cmd = ProductCommand::SetMinStockLevel(SetMinStockLevel {
        product_id,
        min_stock_level: body.min_stock_level,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Product>(agg, PRODUCT_AGGREGATE_TYPE, cmd, |id| {
        Product::empty(ProductId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let kind = match errors::parse_movement_kind(&body.kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let request = AdjustmentRequest {
        product_id: ProductId::new(agg),
        delta: body.delta,
        kind,
        variant_id: body.variant_id,
        notes: body.notes,
        actor_id: body.actor_id,
        idempotency_key: body.idempotency_key,
        occurred_at: Utc::now(),
    };

    match services.apply_adjustment(request) {
        Ok(movement) => (StatusCode::OK, Json(dto::movement_to_json(&movement))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    match services.reconcile(ProductId::new(agg)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::query_error_to_response(e),
    }
}
