use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_inventory))
}

/// Current stock listing with computed status badges.
///
/// `search` filters by name/SKU substring (case-insensitive); `status`
/// filters by badge. Both optional.
pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::InventoryListParams>,
) -> axum::response::Response {
    let status = match params.status.as_deref() {
        Some(raw) => match errors::parse_status_filter(raw) {
            Ok(s) => Some(s),
            Err(resp) => return resp,
        },
        None => None,
    };

    let rows = services.list_inventory(params.search.as_deref(), status);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "count": rows.len(),
            "items": rows.iter().map(dto::inventory_row_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}
