//! Agent-side connection handler.
//!
//! Registers presence on connect, pushes the claimable-rooms snapshot, and
//! relays room-addressed commands through the store. Disconnect cleanup is
//! the explicit two-step: unregister presence, then unassign every held room
//! so visitor messages never vanish into a dead connection.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use log::debug;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use huddl_protocol::{AgentCommand, ServerEvent};

use crate::api::AppState;
use crate::chat::{PresenceChange, RouteTarget};

#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    /// Stable agent identity; generated when absent.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Display name shown to visitors.
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn agent_ws_handler(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_agent_socket(state, socket, query))
}

async fn handle_agent_socket(state: AppState, socket: WebSocket, query: AgentQuery) {
    let agent_id = query
        .agent_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("agent-{}", Uuid::new_v4()));
    let agent_name = query
        .name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Support".to_string());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (change, token) = state.presence.register(&agent_id, &agent_name, tx);
    if change == PresenceChange::CameOnline {
        state.emit(
            RouteTarget::AllVisitors,
            ServerEvent::AdminStatus { is_online: true },
        );
    }
    state.emit(
        RouteTarget::Agent(agent_id.clone()),
        ServerEvent::ActiveRooms {
            rooms: state.store.snapshot_active_rooms(),
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

        let command = match serde_json::from_str::<AgentCommand>(text.as_str()) {
            Ok(command) => command,
            Err(err) => {
                debug!("Agent {agent_id} sent an unparseable frame: {err}");
                state.emit(
                    RouteTarget::Agent(agent_id.clone()),
                    ServerEvent::Error {
                        message: "unrecognized message".to_string(),
                    },
                );
                continue;
            }
        };

        // Invalid room operations fail quiet: log and drop, the agent UI
        // simply does not reflect the attempted action.
        let result = match command {
            AgentCommand::SendMessage { room_id, text } => {
                state.store.ingest_agent_message(&room_id, &agent_id, text)
            }
            AgentCommand::AssignToMe { room_id } => state
                .store
                .assign_agent(&room_id, &agent_id, &agent_name)
                .map(|_| ()),
            AgentCommand::CloseChat { room_id } => state.store.close_room(&room_id, &agent_id),
            AgentCommand::TypingStart { room_id } => {
                state.store.notify_agent_typing(&room_id, &agent_id, true)
            }
            AgentCommand::TypingStop { room_id } => {
                state.store.notify_agent_typing(&room_id, &agent_id, false)
            }
        };
        if let Err(err) = result {
            debug!("Dropped command from agent {agent_id}: {err}");
        }
    }

    forward_task.abort();

    // Stale cleanup after a same-id reconnect must not unassign the rooms
    // the new connection is serving.
    if let Some(change) = state.presence.unregister(&agent_id, token) {
        state.store.unassign_rooms_for_agent(&agent_id);
        if change == PresenceChange::WentOffline {
            state.emit(
                RouteTarget::AllVisitors,
                ServerEvent::AdminStatus { is_online: false },
            );
        }
    }
}
