use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use storekeeper_core::AggregateId;
use storekeeper_infra::event_store::Pagination;
use storekeeper_ledger::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(movement_feed))
}

/// Paginated movement history, newest first.
///
/// Scoped to one product via `product_id`, the global feed otherwise.
pub async fn movement_feed(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::MovementFeedParams>,
) -> axum::response::Response {
    let product_id = match params.product_id.as_deref() {
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(agg) => Some(ProductId::new(agg)),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid product id",
                );
            }
        },
        None => None,
    };

    let pagination = Pagination::new(params.limit, params.offset);

    match services.list_movements(product_id, pagination).await {
        Ok(page) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "movements": page.movements.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
                "total": page.total,
                "has_more": page.has_more,
                "limit": pagination.limit,
                "offset": pagination.offset,
            })),
        )
            .into_response(),
        Err(e) => errors::query_error_to_response(e),
    }
}
