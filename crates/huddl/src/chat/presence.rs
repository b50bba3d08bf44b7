//! Agent presence registry.
//!
//! Tracks which support agents are connected and owns their transport
//! handles: an entry's sender is the only way to push events to that agent,
//! and it is invalidated when the entry is removed. Registration is an
//! upsert so an agent reconnecting with the same id simply replaces its
//! stale handle.
//!
//! Unregistration is deliberately *not* coupled to room unassignment; the
//! connection handler performs `unassign_rooms_for_agent` as an explicit
//! follow-up (two separate concerns, one call site).

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::mpsc;

use huddl_protocol::ServerEvent;

/// Sender half of an agent connection's outbound queue.
pub type AgentSender = mpsc::UnboundedSender<ServerEvent>;

/// Effect of a presence mutation on the online/offline summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// The registry went from empty to non-empty: support just came online.
    CameOnline,
    /// The registry became empty: support just went offline.
    WentOffline,
    /// The summary did not cross zero.
    Unchanged,
}

struct AgentEntry {
    name: String,
    sender: AgentSender,
    token: u64,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct PresenceRegistry {
    agents: DashMap<String, AgentEntry>,
    next_token: AtomicU64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent connection (upsert). Returns the presence change
    /// and a connection token; the token lets the owning handler later
    /// unregister only its own entry, so a reconnect that replaced the entry
    /// is not torn down by the stale connection's cleanup.
    pub fn register(&self, agent_id: &str, name: &str, sender: AgentSender) -> (PresenceChange, u64) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let was_empty = self.agents.is_empty();
        let replaced = self
            .agents
            .insert(
                agent_id.to_string(),
                AgentEntry {
                    name: name.to_string(),
                    sender,
                    token,
                    connected_at: Utc::now(),
                },
            )
            .is_some();
        if replaced {
            debug!("Agent {agent_id} reconnected, replacing stale handle");
        } else {
            info!("Agent {agent_id} ({name}) online");
        }
        let change = if was_empty {
            PresenceChange::CameOnline
        } else {
            PresenceChange::Unchanged
        };
        (change, token)
    }

    /// Remove an agent entry if it still belongs to this connection.
    /// Duplicate or stale disconnects are no-ops, reported as `None`.
    pub fn unregister(&self, agent_id: &str, token: u64) -> Option<PresenceChange> {
        let removed = self
            .agents
            .remove_if(agent_id, |_, entry| entry.token == token)
            .is_some();
        if !removed {
            return None;
        }
        info!("Agent {agent_id} offline");
        if self.agents.is_empty() {
            Some(PresenceChange::WentOffline)
        } else {
            Some(PresenceChange::Unchanged)
        }
    }

    /// Whether any support agent is currently connected. Gates the
    /// visitor-facing online/offline affordances.
    pub fn any_online(&self) -> bool {
        !self.agents.is_empty()
    }

    pub fn agent_name(&self, agent_id: &str) -> Option<String> {
        self.agents.get(agent_id).map(|entry| entry.name.clone())
    }

    /// Push an event to a single agent. Best-effort; a closed channel means
    /// the connection is already being torn down.
    pub fn send_to(&self, agent_id: &str, event: ServerEvent) {
        if let Some(entry) = self.agents.get(agent_id)
            && entry.sender.send(event).is_err()
        {
            debug!("Dropped event for disconnecting agent {agent_id}");
        }
    }

    /// Push an event to every connected agent.
    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.agents.iter() {
            if entry.value().sender.send(event.clone()).is_err() {
                debug!("Dropped broadcast for disconnecting agent {}", entry.key());
            }
        }
    }

    pub fn online_count(&self) -> usize {
        self.agents.len()
    }

    /// How long an agent has been connected. Diagnostics helper.
    pub fn connected_since(&self, agent_id: &str) -> Option<DateTime<Utc>> {
        self.agents.get(agent_id).map(|entry| entry.connected_at)
    }
}
