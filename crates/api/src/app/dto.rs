use serde::Deserialize;

use storekeeper_core::{ActorId, VariantId};
use storekeeper_infra::inventory_query::InventoryRow;
use storekeeper_ledger::StockMovement;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub min_stock_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    /// Movement kind, e.g. "manual_adjustment" or "correction".
    #[serde(rename = "type")]
    pub kind: String,
    pub variant_id: Option<VariantId>,
    pub notes: Option<String>,
    pub actor_id: Option<ActorId>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetMinStockLevelRequest {
    pub min_stock_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct InventoryListParams {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementFeedParams {
    pub product_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn movement_to_json(m: &StockMovement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id.to_string(),
        "product_id": m.product_id.to_string(),
        "variant_id": m.variant_id.map(|v| v.to_string()),
        "change_amount": m.change_amount,
        "new_stock": m.new_stock,
        "type": m.kind.as_str(),
        "notes": m.notes,
        "created_by": m.created_by.map(|a| a.to_string()),
        "created_at": m.created_at.to_rfc3339(),
    })
}

pub fn inventory_row_to_json(row: &InventoryRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.level.product_id.to_string(),
        "sku": row.level.sku,
        "name": row.level.name,
        "stock": row.level.stock,
        "min_stock_level": row.level.min_stock_level,
        "status": row.status.as_str(),
    })
}
