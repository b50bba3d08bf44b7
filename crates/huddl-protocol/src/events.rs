//! WebSocket protocol events.
//!
//! Two inbound unions (one per connection role) and one outbound union. The
//! connect handshake selects the role, so a visitor socket only ever parses
//! [`VisitorCommand`] and an agent socket only [`AgentCommand`].

use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, RoomSummary};

// ============================================================================
// Commands (Client -> Server)
// ============================================================================

/// Commands sent by a visitor connection.
///
/// The visitor's room is implied by the connection; visitors never address
/// rooms by id.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisitorCommand {
    /// Send a chat message to the visitor's current room.
    SendMessage { text: String },

    /// Visitor started typing. Ephemeral, no persistence.
    TypingStart,

    /// Visitor stopped typing.
    TypingStop,

    /// Discard the current room (only if no message was ever sent) and start
    /// a fresh conversation.
    StartNewChat,
}

/// Commands sent by an agent connection.
///
/// Agents hold multiple rooms at once, so every command is room-addressed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentCommand {
    /// Send a chat message to an assigned room.
    SendMessage { room_id: String, text: String },

    /// Claim a waiting room.
    AssignToMe { room_id: String },

    /// Close an owned room.
    CloseChat { room_id: String },

    /// Agent started typing in a room.
    TypingStart { room_id: String },

    /// Agent stopped typing in a room.
    TypingStop { room_id: String },
}

impl AgentCommand {
    pub fn room_id(&self) -> &str {
        match self {
            AgentCommand::SendMessage { room_id, .. }
            | AgentCommand::AssignToMe { room_id }
            | AgentCommand::CloseChat { room_id }
            | AgentCommand::TypingStart { room_id }
            | AgentCommand::TypingStop { room_id } => room_id,
        }
    }
}

// ============================================================================
// Events (Server -> Client)
// ============================================================================

/// Events pushed by the server to visitor and agent connections.
///
/// One union for both roles; the router decides who receives what.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    // ========== Session lifecycle ==========
    /// A room now backs this visitor connection. Sent on connect, resume and
    /// `start_new_chat`; the visitor keeps `customer_id` for reconnects.
    RoomCreated { room_id: String, customer_id: String },

    /// Full transcript replay. Sent to a visitor on (re)connect and to an
    /// agent when it claims a room.
    ChatHistory {
        room_id: String,
        messages: Vec<ChatMessage>,
    },

    /// Presence summary: whether any support agent is online.
    AdminStatus { is_online: bool },

    // ========== Room activity ==========
    /// A room became visible to agents (first visitor message).
    NewCustomer {
        room: RoomSummary,
        message: ChatMessage,
    },

    /// Further visitor activity in a room no agent has claimed yet.
    CustomerMessage {
        room: RoomSummary,
        message: ChatMessage,
    },

    /// Message delivery to a room participant.
    ChatMessage { message: ChatMessage },

    // ========== Typing signals ==========
    /// Visitor typing state, relayed to agents.
    CustomerTyping { room_id: String, typing: bool },

    /// Agent typing state, relayed to the room's visitor.
    AgentTyping { typing: bool },

    // ========== Assignment ==========
    /// An agent claimed the visitor's room.
    AgentJoined { agent_name: String, message: String },

    /// A room was claimed; other agents drop it from their queues.
    RoomAssigned {
        room_id: String,
        agent_id: String,
        agent_name: String,
    },

    /// The assigned agent disconnected; the room is waiting again.
    RoomUnassigned { room_id: String },

    // ========== Closure ==========
    /// The conversation was closed, visitor-facing.
    ChatEnded { message: String },

    /// The conversation was closed, agent-facing.
    ChatClosed { room_id: String },

    // ========== Agent bootstrap ==========
    /// Snapshot of claimable and in-progress rooms, sent on agent connect.
    ActiveRooms { rooms: Vec<RoomSummary> },

    // ========== Errors ==========
    /// Protocol-level error (e.g. an unparseable frame). Invalid room
    /// operations are deliberately not reported here.
    Error { message: String },
}
