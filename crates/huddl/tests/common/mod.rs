//! Test utilities and common setup.

use axum::Router;

use huddl::api::{self, AppState};
use huddl::config::AppConfig;
use huddl::ws;

/// Build application state with the outbound dispatcher running, as
/// `handle_serve` does. Must be called from a tokio test.
pub fn test_state() -> AppState {
    let (state, outbox_rx) = AppState::new(AppConfig::default());
    ws::spawn_dispatcher(outbox_rx, state.hub.clone(), state.presence.clone());
    state
}

/// Create a test application router.
pub fn test_app() -> Router {
    api::create_router(test_state())
}
