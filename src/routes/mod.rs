pub mod products;


use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new().merge(products::routes())
}

/// The full application, mounted under `/api`.
pub fn build_app(state: AppState) -> Router {
    let api = create_router()
        .route("/", get(|| async { "Inventory API" }))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
