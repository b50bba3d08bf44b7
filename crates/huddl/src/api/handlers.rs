//! Plain HTTP handlers.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::AppState;

/// Liveness probe with a little operational color.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "agents_online": state.presence.online_count(),
        "visitors_connected": state.hub.connected_count(),
    }))
}
