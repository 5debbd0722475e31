use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::shared::state::AppState;

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Assembles every module router behind the shared state plus CORS and
/// request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/health", get(health))
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::scope::configure_scope_routes())
        .merge(crate::clients::configure_client_routes())
        .merge(crate::leads::configure_lead_routes())
        .merge(crate::portfolio::configure_portfolio_routes())
        .merge(crate::opportunities::configure_opportunity_routes())
        .merge(crate::opportunities::goals::configure_goals_routes());

    api_router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
