use axum::{Router, routing::get};

pub mod inventory;
pub mod movements;
pub mod products;
pub mod system;

/// Router for all API endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/stream", get(system::stream))
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/movements", movements::router())
}
