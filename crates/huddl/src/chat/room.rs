//! Room state.
//!
//! A [`ChatRoom`] is the unit of conversation between exactly one visitor and
//! at most one agent at a time. Rooms are pure data; every transition is
//! driven by [`super::store::RoomStore`], which is the only writer.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use huddl_protocol::{ChatMessage, RoomStatus, RoomSummary};

/// Maximum messages retained per room; the oldest is evicted first.
pub const MESSAGE_CAP: usize = 100;

/// Why a room is scheduled for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Visitor disconnected without ever sending a message.
    Abandoned,
    /// Room was explicitly closed; grace period lets late events settle.
    Closed,
}

/// A pending removal deadline. Deadlines are re-validated by the sweeper at
/// fire time; the state at schedule time is never trusted.
#[derive(Debug, Clone, Copy)]
pub struct RemovalDeadline {
    pub at: DateTime<Utc>,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone)]
pub struct ChatRoom {
    pub id: String,
    pub customer_id: String,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    messages: VecDeque<ChatMessage>,
    /// Weak reference to the assigned agent. Invariant: `Some` iff
    /// `status == Active`.
    pub assigned_agent: Option<String>,
    /// True once the visitor has sent at least one message. Gates agent
    /// visibility and survival of visitor disconnect.
    pub has_customer_message: bool,
    pub removal: Option<RemovalDeadline>,
}

impl ChatRoom {
    /// Create a room for a visitor connection, seeded with the synthetic
    /// welcome message. The store supplies the id (owning connection plus a
    /// uniqueness suffix).
    pub fn new(id: String, customer_id: &str, welcome_text: &str) -> Self {
        let now = Utc::now();
        let mut messages = VecDeque::new();
        messages.push_back(ChatMessage::from_agent(&id, None, welcome_text));
        Self {
            id,
            customer_id: customer_id.to_string(),
            status: RoomStatus::Inactive,
            created_at: now,
            last_activity: now,
            messages,
            assigned_agent: None,
            has_customer_message: false,
            removal: None,
        }
    }

    /// Append a message, evicting the oldest once the cap is reached.
    pub fn push_message(&mut self, message: ChatMessage) {
        if self.messages.len() >= MESSAGE_CAP {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        self.last_activity = Utc::now();
    }

    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.assigned_agent.as_deref() == Some(agent_id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Transcript copy for `chat_history` replay.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            customer_id: self.customer_id.clone(),
            status: self.status,
            created_at: self.created_at,
            last_activity: self.last_activity,
            assigned_agent: self.assigned_agent.clone(),
            message_count: self.messages.len(),
        }
    }
}
