use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes — no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected API routes — require Bearer token when API_TOKEN is set
    let protected = Router::new()
        // Trend state
        .route("/api/trend/:item_id", get(handlers::trend::latest))
        .route("/api/trend/:item_id/history", get(handlers::trend::history))
        .route("/api/trend/:item_id/update", post(handlers::trend::force_update))
        // Flash markets
        .route("/api/flash-markets/active", get(handlers::flash_markets::active))
        // Bonding-curve quotes
        .route("/api/markets/:item_id/quote", get(handlers::quote::quote))
        // Service introspection
        .route("/api/status", get(handlers::status::status))
        // Notification stream
        .route("/ws", get(handlers::ws::handler))
        .layer(middleware::from_fn(require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any) // the marketplace frontend proxies same-origin; direct access needs token
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
