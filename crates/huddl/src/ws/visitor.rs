//! Visitor-side connection handler.
//!
//! A visitor socket owns exactly one live room. On connect the handler
//! creates or resumes the room, replays its transcript and reports agent
//! presence; on disconnect it marks uncommitted rooms for the abandon grace
//! period. Invalid commands are logged and dropped, never surfaced to the
//! visitor.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use log::debug;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use huddl_protocol::{ServerEvent, VisitorCommand};

use crate::api::AppState;
use crate::chat::RouteTarget;
use crate::chat::store::RoomSnapshot;

#[derive(Debug, Deserialize)]
pub struct VisitorQuery {
    /// Stable visitor identity from a previous session, if any.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Room to resume after a reconnect.
    #[serde(default)]
    pub room_id: Option<String>,
}

pub async fn visitor_ws_handler(
    State(state): State<AppState>,
    Query(query): Query<VisitorQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_visitor_socket(state, socket, query))
}

async fn handle_visitor_socket(state: AppState, socket: WebSocket, query: VisitorQuery) {
    let customer_id = query
        .customer_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let token = state.hub.register(&customer_id, tx);

    // Create-or-resume: resuming clears any pending abandon deadline; a
    // stale or foreign room id falls back to a fresh room.
    let snapshot = query
        .room_id
        .as_deref()
        .and_then(|room_id| state.store.resume_room(&customer_id, room_id))
        .unwrap_or_else(|| state.store.create_room(&customer_id));
    let mut room_id = snapshot.room_id.clone();

    send_room_intro(&state, &customer_id, snapshot);
    state.emit(
        RouteTarget::Visitor(customer_id.clone()),
        ServerEvent::AdminStatus {
            is_online: state.presence.any_online(),
        },
    );

    let (mut sink, mut stream) = socket.split();
    let forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let command = match serde_json::from_str::<VisitorCommand>(text.as_str()) {
            Ok(command) => command,
            Err(err) => {
                debug!("Visitor {customer_id} sent an unparseable frame: {err}");
                state.emit(
                    RouteTarget::Visitor(customer_id.clone()),
                    ServerEvent::Error {
                        message: "unrecognized message".to_string(),
                    },
                );
                continue;
            }
        };

        match command {
            VisitorCommand::SendMessage { text } => {
                if let Err(err) = state.store.ingest_visitor_message(&room_id, text) {
                    debug!("Dropped visitor message for room {room_id}: {err}");
                }
            }
            VisitorCommand::TypingStart => {
                if let Err(err) = state.store.notify_visitor_typing(&room_id, true) {
                    debug!("Dropped typing signal for room {room_id}: {err}");
                }
            }
            VisitorCommand::TypingStop => {
                if let Err(err) = state.store.notify_visitor_typing(&room_id, false) {
                    debug!("Dropped typing signal for room {room_id}: {err}");
                }
            }
            VisitorCommand::StartNewChat => {
                let snapshot = state.store.start_new_chat(&customer_id, &room_id);
                room_id = snapshot.room_id.clone();
                send_room_intro(&state, &customer_id, snapshot);
            }
        }
    }

    forward_task.abort();

    // Only the live connection tears down visitor state; a connection that
    // was replaced by a reconnect must leave the new session alone.
    if state.hub.unregister(&customer_id, token) {
        state.store.mark_visitor_disconnected(&customer_id);
    }
}

/// Tell the visitor which room backs the connection and replay its history.
fn send_room_intro(state: &AppState, customer_id: &str, snapshot: RoomSnapshot) {
    state.emit(
        RouteTarget::Visitor(customer_id.to_string()),
        ServerEvent::RoomCreated {
            room_id: snapshot.room_id.clone(),
            customer_id: customer_id.to_string(),
        },
    );
    state.emit(
        RouteTarget::Visitor(customer_id.to_string()),
        ServerEvent::ChatHistory {
            room_id: snapshot.room_id,
            messages: snapshot.messages,
        },
    );
}
