//! API route definitions.

use axum::http::HeaderValue;
use axum::{Router, routing::get};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::ws;

use super::AppState;
use super::handlers;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server);

    // Tracing layer with request timing
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws/chat", get(ws::visitor::visitor_ws_handler))
        .route("/ws/agent", get(ws::agent::agent_ws_handler))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(server: &ServerConfig) -> CorsLayer {
    if server.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
