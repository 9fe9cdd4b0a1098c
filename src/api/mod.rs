//! HTTP router for frontdesk-connect.
//!
//! Everything is mounted under /api, matching the paths the SPA and the
//! Facebook app dashboard already use:
//! - /api/auth/facebook  — OAuth start + callback
//! - /api/facebook       — Lead Ads webhook + page connections
//! - /api/retell         — voice demo web calls
//! - /api/status         — health check

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
