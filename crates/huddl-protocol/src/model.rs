//! Message and room model types.
//!
//! A [`ChatMessage`] is the persistent unit of a conversation. Messages are
//! created server-side at ingestion (ids and timestamps are never trusted
//! from the client) and are immutable afterwards. Rooms hold at most the 100
//! most recent messages; the store evicts the oldest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Visitor,
    Agent,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Visitor => write!(f, "visitor"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within the owning room (UUID v4, server-assigned).
    pub id: String,

    /// Free-form message body.
    pub text: String,

    /// Who sent it.
    pub sender: Sender,

    /// Server-assigned ingestion time.
    pub timestamp: DateTime<Utc>,

    /// Owning room. A relation, not ownership: the room owns the message.
    pub room_id: String,

    /// Sending agent, populated only for agent-sent messages. The synthetic
    /// welcome message is agent-sent with no agent id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl ChatMessage {
    /// Build a visitor message with a fresh id and the current time.
    pub fn from_visitor(room_id: &str, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender: Sender::Visitor,
            timestamp: Utc::now(),
            room_id: room_id.to_string(),
            agent_id: None,
        }
    }

    /// Build an agent message. `agent_id` is `None` only for the synthetic
    /// welcome message.
    pub fn from_agent(room_id: &str, agent_id: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender: Sender::Agent,
            timestamp: Utc::now(),
            room_id: room_id.to_string(),
            agent_id: agent_id.map(str::to_string),
        }
    }
}

/// Room lifecycle state.
///
/// `inactive → waiting` on the first visitor message, `waiting|inactive →
/// active` on agent assignment, `active → waiting` when the assigned agent
/// disconnects, and any state `→ closed` on explicit closure. Closed is
/// terminal; the room is physically removed after a grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Inactive,
    Waiting,
    Active,
    Closed,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Room metadata pushed to agents (snapshots and activity notifications).
///
/// Message bodies are not included; agents receive the full transcript via
/// `chat_history` when they claim the room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub customer_id: String,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    /// Number of messages currently retained for the room.
    pub message_count: usize,
}
