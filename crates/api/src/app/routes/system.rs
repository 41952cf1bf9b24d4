use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
};

use crate::app::services::{AppServices, realtime_sse_stream};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// SSE cache-invalidation stream: emits projection-update notifications so a
/// UI knows when to re-fetch.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    realtime_sse_stream(services)
}
