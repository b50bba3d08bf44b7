//! Broadcast routing.
//!
//! Pure fan-out decisions: given current room state, compute who receives an
//! event. No state of its own; the store calls these while holding the room
//! lock and emits the results into the outbox.

use huddl_protocol::RoomStatus;

use super::room::ChatRoom;

/// Where an outbound event is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// The visitor connection owning a room.
    Visitor(String),
    /// A single agent connection.
    Agent(String),
    /// Every connected agent.
    AllAgents,
    /// Every connected visitor.
    AllVisitors,
}

/// Agent-side audience for visitor activity in a room: the assigned agent
/// when there is one, otherwise a global broadcast so any agent can pick the
/// room up.
pub fn customer_audience(room: &ChatRoom) -> RouteTarget {
    match room.assigned_agent {
        Some(ref agent_id) => RouteTarget::Agent(agent_id.clone()),
        None => RouteTarget::AllAgents,
    }
}

/// Targets for a visitor message: echo to the originating visitor plus the
/// agent-side audience.
pub fn visitor_message_targets(room: &ChatRoom) -> Vec<RouteTarget> {
    vec![RouteTarget::Visitor(room.customer_id.clone()), customer_audience(room)]
}

/// Targets for an agent message: exactly one copy to the customer and
/// exactly one echo to the sending agent. No other agent observes an
/// assigned room's traffic.
pub fn agent_message_targets(room: &ChatRoom, sender_id: &str) -> Vec<RouteTarget> {
    vec![
        RouteTarget::Visitor(room.customer_id.clone()),
        RouteTarget::Agent(sender_id.to_string()),
    ]
}

/// Whether visitor activity in this room is visible to agents at all.
pub fn visible_to_agents(room: &ChatRoom) -> bool {
    room.has_customer_message
        && matches!(room.status, RoomStatus::Waiting | RoomStatus::Active)
}
