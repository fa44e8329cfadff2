// HTTP surface: query + ingest on `/api/edit`, live sync on
// `/api/edit/sync`. CORS is wide open; the daemon binds loopback by
// default.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::runtime::SyncState;

pub mod http;
pub mod sse;

pub fn router(state: Arc<SyncState>) -> Router {
    Router::new()
        .route("/api/edit", get(http::query).post(http::ingest))
        .route("/api/edit/sync", get(sse::subscribe))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
