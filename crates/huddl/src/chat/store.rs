//! Room store.
//!
//! The single writer for all room state. Connection handlers never touch
//! room fields directly; every mutation goes through an operation here so
//! the lifecycle invariants stay centrally enforced.
//!
//! Each operation locks the room map, mutates, and pushes its outbound
//! events into the outbox channel *before* releasing the lock. The `ws`
//! dispatcher drains that channel from a single task, so observers see
//! room-scoped FIFO delivery without any per-connection coordination. At the
//! expected scale (tens of concurrent rooms) one map-wide lock is plenty.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use tokio::sync::mpsc;

use huddl_protocol::{ChatMessage, RoomStatus, ServerEvent};

use crate::config::ChatConfig;

use super::error::ChatError;
use super::room::{ChatRoom, RemovalDeadline, RemovalReason};
use super::router::{self, RouteTarget};

/// A routed outbound event, ready for the dispatcher.
pub type Outbound = (RouteTarget, ServerEvent);

/// What a connection handler needs after opening or resuming a room.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub customer_id: String,
    pub messages: Vec<ChatMessage>,
}

/// Result of a successful [`RoomStore::assign_agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The room was newly claimed; join notifications were emitted.
    Assigned,
    /// The room was already held by this agent; only the transcript was
    /// re-sent, no duplicate join side effects.
    AlreadyMine,
}

pub struct RoomStore {
    rooms: Mutex<HashMap<String, ChatRoom>>,
    outbox: mpsc::UnboundedSender<Outbound>,
    config: ChatConfig,
    room_seq: AtomicU64,
}

impl RoomStore {
    pub fn new(config: ChatConfig, outbox: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            outbox,
            config,
            room_seq: AtomicU64::new(0),
        }
    }

    /// Create a fresh room for a visitor connection. Always succeeds.
    pub fn create_room(&self, customer_id: &str) -> RoomSnapshot {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        self.create_room_locked(&mut rooms, customer_id)
    }

    fn create_room_locked(
        &self,
        rooms: &mut HashMap<String, ChatRoom>,
        customer_id: &str,
    ) -> RoomSnapshot {
        let seq = self.room_seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{customer_id}-{}-{seq}", Utc::now().timestamp_millis());
        let room = ChatRoom::new(id.clone(), customer_id, &self.config.welcome_message);
        let snapshot = RoomSnapshot {
            room_id: room.id.clone(),
            customer_id: room.customer_id.clone(),
            messages: room.history(),
        };
        rooms.insert(id, room);
        info!("Created room {} for customer {}", snapshot.room_id, customer_id);
        snapshot
    }

    /// Resume an existing room on visitor reconnect. Clears any pending
    /// abandon deadline. Returns `None` when the room is gone, closed, or
    /// owned by someone else; the caller falls back to `create_room`.
    pub fn resume_room(&self, customer_id: &str, room_id: &str) -> Option<RoomSnapshot> {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms.get_mut(room_id)?;
        if room.customer_id != customer_id || room.status == RoomStatus::Closed {
            return None;
        }
        if room.removal.is_some() {
            debug!("Resume cancelled pending removal of room {room_id}");
            room.removal = None;
        }
        Some(RoomSnapshot {
            room_id: room.id.clone(),
            customer_id: room.customer_id.clone(),
            messages: room.history(),
        })
    }

    /// Discard the current room if the visitor never committed to it, then
    /// open a fresh one. A room with customer messages is left in the store
    /// so an in-progress conversation is never silently dropped.
    pub fn start_new_chat(&self, customer_id: &str, current_room_id: &str) -> RoomSnapshot {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let discard = rooms
            .get(current_room_id)
            .is_some_and(|room| room.customer_id == customer_id && !room.has_customer_message);
        if discard {
            rooms.remove(current_room_id);
            debug!("Discarded uncommitted room {current_room_id}");
        }
        self.create_room_locked(&mut rooms, customer_id)
    }

    /// Ingest a visitor message: server-assigned id and timestamp, cap-bound
    /// append, `inactive → waiting` on the first message, fan-out per the
    /// router.
    pub fn ingest_visitor_message(&self, room_id: &str, text: String) -> Result<(), ChatError> {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;
        if room.status == RoomStatus::Closed {
            return Err(ChatError::RoomClosed(room_id.to_string()));
        }

        let message = ChatMessage::from_visitor(room_id, text);
        let first = !room.has_customer_message;
        room.has_customer_message = true;
        // A message arriving during the abandon grace window rescues the room.
        room.removal = None;
        if room.status == RoomStatus::Inactive {
            room.status = RoomStatus::Waiting;
        }
        room.push_message(message.clone());

        self.emit(
            RouteTarget::Visitor(room.customer_id.clone()),
            ServerEvent::ChatMessage { message: message.clone() },
        );
        match router::customer_audience(room) {
            RouteTarget::Agent(agent_id) => {
                self.emit(RouteTarget::Agent(agent_id), ServerEvent::ChatMessage { message });
            }
            _ if first => {
                self.emit(
                    RouteTarget::AllAgents,
                    ServerEvent::NewCustomer { room: room.summary(), message },
                );
            }
            _ => {
                self.emit(
                    RouteTarget::AllAgents,
                    ServerEvent::CustomerMessage { room: room.summary(), message },
                );
            }
        }
        Ok(())
    }

    /// Ingest an agent message. The room must be active and assigned to the
    /// sending agent; any-agent-may-send is deliberately not supported.
    pub fn ingest_agent_message(
        &self,
        room_id: &str,
        agent_id: &str,
        text: String,
    ) -> Result<(), ChatError> {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;
        if room.status == RoomStatus::Closed {
            return Err(ChatError::RoomClosed(room_id.to_string()));
        }
        if room.status != RoomStatus::Active || !room.is_assigned_to(agent_id) {
            return Err(ChatError::NotAssigned {
                room_id: room_id.to_string(),
                agent_id: agent_id.to_string(),
            });
        }

        let message = ChatMessage::from_agent(room_id, Some(agent_id), text);
        room.push_message(message.clone());

        for target in router::agent_message_targets(room, agent_id) {
            self.emit(target, ServerEvent::ChatMessage { message: message.clone() });
        }
        Ok(())
    }

    /// Claim a room for an agent. Fails when the room is closed or held by a
    /// different agent; re-claiming an owned room is idempotent.
    pub fn assign_agent(
        &self,
        room_id: &str,
        agent_id: &str,
        agent_name: &str,
    ) -> Result<AssignOutcome, ChatError> {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;
        if room.status == RoomStatus::Closed {
            return Err(ChatError::RoomClosed(room_id.to_string()));
        }
        if let Some(ref assigned) = room.assigned_agent {
            if assigned == agent_id {
                // Same agent re-claiming: re-send the transcript, skip the
                // join notifications.
                self.emit(
                    RouteTarget::Agent(agent_id.to_string()),
                    ServerEvent::ChatHistory {
                        room_id: room.id.clone(),
                        messages: room.history(),
                    },
                );
                return Ok(AssignOutcome::AlreadyMine);
            }
            return Err(ChatError::AlreadyAssigned {
                room_id: room_id.to_string(),
                assigned_to: assigned.clone(),
            });
        }

        room.assigned_agent = Some(agent_id.to_string());
        room.status = RoomStatus::Active;
        room.last_activity = Utc::now();
        info!("Agent {agent_id} assigned to room {room_id}");

        self.emit(
            RouteTarget::Agent(agent_id.to_string()),
            ServerEvent::ChatHistory {
                room_id: room.id.clone(),
                messages: room.history(),
            },
        );
        self.emit(
            RouteTarget::Visitor(room.customer_id.clone()),
            ServerEvent::AgentJoined {
                agent_name: agent_name.to_string(),
                message: format!("{agent_name} has joined the conversation"),
            },
        );
        self.emit(
            RouteTarget::AllAgents,
            ServerEvent::RoomAssigned {
                room_id: room.id.clone(),
                agent_id: agent_id.to_string(),
                agent_name: agent_name.to_string(),
            },
        );
        Ok(AssignOutcome::Assigned)
    }

    /// Close a room. Only the owning agent may close; the room leaves the
    /// active snapshot immediately and is physically removed after the close
    /// grace period.
    pub fn close_room(&self, room_id: &str, by_agent_id: &str) -> Result<(), ChatError> {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;
        if room.status == RoomStatus::Closed {
            return Err(ChatError::RoomClosed(room_id.to_string()));
        }
        if !room.is_assigned_to(by_agent_id) {
            return Err(ChatError::NotAssigned {
                room_id: room_id.to_string(),
                agent_id: by_agent_id.to_string(),
            });
        }

        room.status = RoomStatus::Closed;
        room.assigned_agent = None;
        room.removal = Some(RemovalDeadline {
            at: Utc::now() + Duration::seconds(self.config.close_grace_secs as i64),
            reason: RemovalReason::Closed,
        });
        info!("Agent {by_agent_id} closed room {room_id}");

        self.emit(
            RouteTarget::Visitor(room.customer_id.clone()),
            ServerEvent::ChatEnded {
                message: "The chat has ended. Thanks for reaching out!".to_string(),
            },
        );
        self.emit(
            RouteTarget::AllAgents,
            ServerEvent::ChatClosed { room_id: room.id.clone() },
        );
        Ok(())
    }

    /// Clear every assignment held by a disconnecting agent: each affected
    /// room reverts `active → waiting` and agents are notified once per
    /// room. Returns the affected room ids.
    pub fn unassign_rooms_for_agent(&self, agent_id: &str) -> Vec<String> {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let mut affected = Vec::new();
        for room in rooms.values_mut() {
            if !room.is_assigned_to(agent_id) {
                continue;
            }
            room.assigned_agent = None;
            if room.status == RoomStatus::Active {
                room.status = RoomStatus::Waiting;
            }
            self.emit(
                RouteTarget::AllAgents,
                ServerEvent::RoomUnassigned { room_id: room.id.clone() },
            );
            affected.push(room.id.clone());
        }
        if !affected.is_empty() {
            info!("Unassigned {} room(s) for agent {agent_id}", affected.len());
        }
        affected
    }

    /// Relay a visitor typing signal. Ephemeral; nothing is persisted.
    pub fn notify_visitor_typing(&self, room_id: &str, typing: bool) -> Result<(), ChatError> {
        let rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms
            .get(room_id)
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;
        if room.status == RoomStatus::Closed {
            return Err(ChatError::RoomClosed(room_id.to_string()));
        }
        self.emit(
            router::customer_audience(room),
            ServerEvent::CustomerTyping { room_id: room.id.clone(), typing },
        );
        Ok(())
    }

    /// Relay an agent typing signal to the room's visitor. Same assignment
    /// policy as agent messages.
    pub fn notify_agent_typing(
        &self,
        room_id: &str,
        agent_id: &str,
        typing: bool,
    ) -> Result<(), ChatError> {
        let rooms = self.rooms.lock().expect("room store poisoned");
        let room = rooms
            .get(room_id)
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;
        if room.status == RoomStatus::Closed {
            return Err(ChatError::RoomClosed(room_id.to_string()));
        }
        if !room.is_assigned_to(agent_id) {
            return Err(ChatError::NotAssigned {
                room_id: room_id.to_string(),
                agent_id: agent_id.to_string(),
            });
        }
        self.emit(
            RouteTarget::Visitor(room.customer_id.clone()),
            ServerEvent::AgentTyping { typing },
        );
        Ok(())
    }

    /// Mark a visitor's uncommitted rooms for removal after the abandon
    /// grace period. Rooms with at least one customer message survive the
    /// disconnect untouched. Idempotent.
    pub fn mark_visitor_disconnected(&self, customer_id: &str) {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let deadline = Utc::now() + Duration::seconds(self.config.abandon_grace_secs as i64);
        for room in rooms.values_mut() {
            if room.customer_id == customer_id
                && !room.has_customer_message
                && room.status != RoomStatus::Closed
                && room.removal.is_none()
            {
                room.removal = Some(RemovalDeadline {
                    at: deadline,
                    reason: RemovalReason::Abandoned,
                });
                debug!("Room {} marked abandoned, removal at {deadline}", room.id);
            }
        }
    }

    /// Rooms a newly connected agent should see: waiting or active, with at
    /// least one customer message, most recently active first.
    pub fn snapshot_active_rooms(&self) -> Vec<huddl_protocol::RoomSummary> {
        let rooms = self.rooms.lock().expect("room store poisoned");
        let mut summaries: Vec<_> = rooms
            .values()
            .filter(|room| router::visible_to_agents(room))
            .map(ChatRoom::summary)
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries
    }

    /// Remove rooms whose removal deadline has passed, re-validating the
    /// condition at fire time: an abandoned room that has since received a
    /// message (or been resumed) is spared. Returns the number removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut rooms = self.rooms.lock().expect("room store poisoned");
        let before = rooms.len();
        rooms.retain(|room_id, room| {
            let Some(deadline) = room.removal else {
                return true;
            };
            if deadline.at > now {
                return true;
            }
            let expired = match deadline.reason {
                RemovalReason::Abandoned => !room.has_customer_message,
                RemovalReason::Closed => room.status == RoomStatus::Closed,
            };
            if expired {
                info!("Sweeping room {room_id} ({:?})", deadline.reason);
            } else {
                // State changed since scheduling; drop the stale deadline.
                room.removal = None;
            }
            !expired
        });
        before - rooms.len()
    }

    /// Whether a room currently exists in the store. Test and diagnostics
    /// helper.
    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.lock().expect("room store poisoned").contains_key(room_id)
    }

    fn emit(&self, target: RouteTarget, event: ServerEvent) {
        // Outbox closure means the dispatcher is gone (shutdown); delivery
        // is best-effort anyway.
        let _ = self.outbox.send((target, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddl_protocol::Sender;

    fn store() -> (RoomStore, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RoomStore::new(ChatConfig::default(), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_first_message_transitions_inactive_to_waiting() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        drain(&mut rx);

        store.ingest_visitor_message(&room.room_id, "Hello".to_string()).unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            (RouteTarget::Visitor(c), ServerEvent::ChatMessage { .. }) if c == "cust-1"
        ));
        // Exactly one new_customer broadcast, carrying the waiting status.
        let (target, event) = &events[1];
        assert_eq!(*target, RouteTarget::AllAgents);
        match event {
            ServerEvent::NewCustomer { room, message } => {
                assert_eq!(room.status, RoomStatus::Waiting);
                assert_eq!(message.text, "Hello");
                assert_eq!(message.sender, Sender::Visitor);
            }
            other => panic!("expected new_customer, got {other:?}"),
        }
    }

    #[test]
    fn test_second_unassigned_message_is_customer_message() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "one".to_string()).unwrap();
        drain(&mut rx);

        store.ingest_visitor_message(&room.room_id, "two".to_string()).unwrap();
        let events = drain(&mut rx);
        assert!(matches!(&events[1].1, ServerEvent::CustomerMessage { .. }));
    }

    #[test]
    fn test_message_to_unknown_room_is_rejected() {
        let (store, mut rx) = store();
        let err = store.ingest_visitor_message("nope", "hi".to_string()).unwrap_err();
        assert_eq!(err, ChatError::RoomNotFound("nope".to_string()));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_message_cap_holds_under_ingestion() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        for i in 0..250 {
            store.ingest_visitor_message(&room.room_id, format!("msg {i}")).unwrap();
        }
        drain(&mut rx);

        let snapshot = store.resume_room("cust-1", &room.room_id).unwrap();
        assert_eq!(snapshot.messages.len(), crate::chat::MESSAGE_CAP);
        // FIFO eviction: the survivors are the most recent 100.
        assert_eq!(snapshot.messages[0].text, "msg 150");
        assert_eq!(snapshot.messages[99].text, "msg 249");
    }

    #[test]
    fn test_assigned_room_routes_to_assigned_agent_only() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        drain(&mut rx);

        store.ingest_visitor_message(&room.room_id, "anyone there?".to_string()).unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0].0, RouteTarget::Visitor(_)));
        assert_eq!(events[1].0, RouteTarget::Agent("agent-1".to_string()));
        assert!(matches!(&events[1].1, ServerEvent::ChatMessage { .. }));
    }

    #[test]
    fn test_assign_transitions_and_notifies() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        drain(&mut rx);

        let outcome = store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        assert_eq!(outcome, AssignOutcome::Assigned);

        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            (RouteTarget::Agent(a), ServerEvent::ChatHistory { .. }) if a == "agent-1"
        ));
        assert!(matches!(
            &events[1],
            (RouteTarget::Visitor(_), ServerEvent::AgentJoined { agent_name, .. })
                if agent_name == "Ada"
        ));
        assert!(matches!(
            &events[2],
            (RouteTarget::AllAgents, ServerEvent::RoomAssigned { .. })
        ));

        let summaries = store.snapshot_active_rooms();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].status, RoomStatus::Active);
        assert_eq!(summaries[0].assigned_agent.as_deref(), Some("agent-1"));
    }

    #[test]
    fn test_second_agent_cannot_steal_assignment() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-a", "Ada").unwrap();
        drain(&mut rx);

        let err = store.assign_agent(&room.room_id, "agent-b", "Bob").unwrap_err();
        assert_eq!(
            err,
            ChatError::AlreadyAssigned {
                room_id: room.room_id.clone(),
                assigned_to: "agent-a".to_string(),
            }
        );
        assert!(drain(&mut rx).is_empty());

        let summaries = store.snapshot_active_rooms();
        assert_eq!(summaries[0].assigned_agent.as_deref(), Some("agent-a"));
    }

    #[test]
    fn test_reassign_by_same_agent_is_idempotent() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        drain(&mut rx);

        let outcome = store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        assert_eq!(outcome, AssignOutcome::AlreadyMine);

        // Transcript replay only; no duplicate agent_joined / room_assigned.
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0].1, ServerEvent::ChatHistory { .. }));
    }

    #[test]
    fn test_agent_message_requires_assignment() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        drain(&mut rx);

        // Unassigned room: nobody may send.
        let err = store
            .ingest_agent_message(&room.room_id, "agent-1", "hi".to_string())
            .unwrap_err();
        assert!(matches!(err, ChatError::NotAssigned { .. }));

        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        drain(&mut rx);

        // A different agent still may not send.
        let err = store
            .ingest_agent_message(&room.room_id, "agent-2", "hi".to_string())
            .unwrap_err();
        assert!(matches!(err, ChatError::NotAssigned { .. }));

        // The owner may, and the visitor gets exactly one copy.
        store
            .ingest_agent_message(&room.room_id, "agent-1", "Hi there".to_string())
            .unwrap();
        let events = drain(&mut rx);
        let visitor_copies = events
            .iter()
            .filter(|(t, _)| matches!(t, RouteTarget::Visitor(_)))
            .count();
        let agent_copies = events
            .iter()
            .filter(|(t, _)| *t == RouteTarget::Agent("agent-1".to_string()))
            .count();
        assert_eq!(visitor_copies, 1);
        assert_eq!(agent_copies, 1);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_close_requires_owning_agent() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        drain(&mut rx);

        let err = store.close_room(&room.room_id, "agent-2").unwrap_err();
        assert!(matches!(err, ChatError::NotAssigned { .. }));

        store.close_room(&room.room_id, "agent-1").unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            (RouteTarget::Visitor(_), ServerEvent::ChatEnded { .. })
        ));
        assert!(matches!(
            &events[1],
            (RouteTarget::AllAgents, ServerEvent::ChatClosed { .. })
        ));
    }

    #[test]
    fn test_closed_room_rejects_everything_but_still_exists() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        store.close_room(&room.room_id, "agent-1").unwrap();
        drain(&mut rx);

        assert!(matches!(
            store.ingest_visitor_message(&room.room_id, "x".to_string()),
            Err(ChatError::RoomClosed(_))
        ));
        assert!(matches!(
            store.ingest_agent_message(&room.room_id, "agent-1", "x".to_string()),
            Err(ChatError::RoomClosed(_))
        ));
        assert!(matches!(
            store.assign_agent(&room.room_id, "agent-1", "Ada"),
            Err(ChatError::RoomClosed(_))
        ));
        assert!(matches!(
            store.notify_visitor_typing(&room.room_id, true),
            Err(ChatError::RoomClosed(_))
        ));

        // Gone from the active snapshot immediately, deletion deferred.
        assert!(store.snapshot_active_rooms().is_empty());
        assert!(store.contains_room(&room.room_id));
    }

    #[test]
    fn test_closed_room_swept_after_grace() {
        let (store, _rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        store.close_room(&room.room_id, "agent-1").unwrap();

        let grace = ChatConfig::default().close_grace_secs as i64;
        assert_eq!(store.sweep(Utc::now()), 0);
        assert_eq!(store.sweep(Utc::now() + Duration::seconds(grace + 1)), 1);
        assert!(!store.contains_room(&room.room_id));
    }

    #[test]
    fn test_silent_visitor_room_removed_after_grace() {
        let (store, _rx) = store();
        let room = store.create_room("cust-1");
        store.mark_visitor_disconnected("cust-1");

        let grace = ChatConfig::default().abandon_grace_secs as i64;
        assert_eq!(store.sweep(Utc::now()), 0);
        assert!(store.contains_room(&room.room_id));
        assert_eq!(store.sweep(Utc::now() + Duration::seconds(grace + 1)), 1);
        assert!(!store.contains_room(&room.room_id));
    }

    #[test]
    fn test_committed_room_survives_visitor_disconnect() {
        let (store, _rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.mark_visitor_disconnected("cust-1");

        let grace = ChatConfig::default().abandon_grace_secs as i64;
        assert_eq!(store.sweep(Utc::now() + Duration::seconds(grace + 1)), 0);
        assert!(store.contains_room(&room.room_id));
    }

    #[test]
    fn test_sweep_revalidates_at_fire_time() {
        let (store, _rx) = store();
        let room = store.create_room("cust-1");
        store.mark_visitor_disconnected("cust-1");

        // The visitor came back and spoke before the deadline fired.
        store.ingest_visitor_message(&room.room_id, "still here".to_string()).unwrap();

        let grace = ChatConfig::default().abandon_grace_secs as i64;
        assert_eq!(store.sweep(Utc::now() + Duration::seconds(grace + 1)), 0);
        assert!(store.contains_room(&room.room_id));
    }

    #[test]
    fn test_resume_clears_pending_removal() {
        let (store, _rx) = store();
        let room = store.create_room("cust-1");
        store.mark_visitor_disconnected("cust-1");

        let snapshot = store.resume_room("cust-1", &room.room_id).unwrap();
        assert_eq!(snapshot.room_id, room.room_id);

        let grace = ChatConfig::default().abandon_grace_secs as i64;
        assert_eq!(store.sweep(Utc::now() + Duration::seconds(grace + 1)), 0);
    }

    #[test]
    fn test_resume_refuses_foreign_or_closed_rooms() {
        let (store, _rx) = store();
        let room = store.create_room("cust-1");
        assert!(store.resume_room("cust-2", &room.room_id).is_none());

        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        store.close_room(&room.room_id, "agent-1").unwrap();
        assert!(store.resume_room("cust-1", &room.room_id).is_none());
    }

    #[test]
    fn test_agent_disconnect_unassigns_all_held_rooms() {
        let (store, mut rx) = store();
        let room_a = store.create_room("cust-a");
        let room_b = store.create_room("cust-b");
        store.ingest_visitor_message(&room_a.room_id, "hi".to_string()).unwrap();
        store.ingest_visitor_message(&room_b.room_id, "hi".to_string()).unwrap();
        store.assign_agent(&room_a.room_id, "agent-1", "Ada").unwrap();
        store.assign_agent(&room_b.room_id, "agent-1", "Ada").unwrap();
        drain(&mut rx);

        let mut affected = store.unassign_rooms_for_agent("agent-1");
        affected.sort();
        let mut expected = vec![room_a.room_id.clone(), room_b.room_id.clone()];
        expected.sort();
        assert_eq!(affected, expected);

        // One room_unassigned per room, no more.
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(t, e)| {
            *t == RouteTarget::AllAgents && matches!(e, ServerEvent::RoomUnassigned { .. })
        }));

        // Both rooms are waiting and claimable again.
        let summaries = store.snapshot_active_rooms();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.status == RoomStatus::Waiting));
        assert!(summaries.iter().all(|s| s.assigned_agent.is_none()));

        // Duplicate disconnect is a no-op.
        assert!(store.unassign_rooms_for_agent("agent-1").is_empty());
    }

    #[test]
    fn test_start_new_chat_discards_only_uncommitted_rooms() {
        let (store, _rx) = store();
        let fresh = store.create_room("cust-1");
        let replacement = store.start_new_chat("cust-1", &fresh.room_id);
        assert!(!store.contains_room(&fresh.room_id));
        assert!(store.contains_room(&replacement.room_id));

        store
            .ingest_visitor_message(&replacement.room_id, "keep me".to_string())
            .unwrap();
        let third = store.start_new_chat("cust-1", &replacement.room_id);
        // The committed conversation is preserved alongside the new room.
        assert!(store.contains_room(&replacement.room_id));
        assert!(store.contains_room(&third.room_id));
    }

    #[test]
    fn test_typing_routes_like_messages() {
        let (store, mut rx) = store();
        let room = store.create_room("cust-1");
        store.ingest_visitor_message(&room.room_id, "hi".to_string()).unwrap();
        drain(&mut rx);

        store.notify_visitor_typing(&room.room_id, true).unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            (RouteTarget::AllAgents, ServerEvent::CustomerTyping { typing: true, .. })
        ));

        store.assign_agent(&room.room_id, "agent-1", "Ada").unwrap();
        drain(&mut rx);

        store.notify_visitor_typing(&room.room_id, false).unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            (RouteTarget::Agent(a), ServerEvent::CustomerTyping { typing: false, .. })
                if a == "agent-1"
        ));

        store.notify_agent_typing(&room.room_id, "agent-1", true).unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            (RouteTarget::Visitor(_), ServerEvent::AgentTyping { typing: true })
        ));

        // Unassigned agents cannot signal typing into the room.
        assert!(store.notify_agent_typing(&room.room_id, "agent-2", true).is_err());
    }

    #[test]
    fn test_welcome_message_comes_from_config() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = ChatConfig {
            welcome_message: "Howdy".to_string(),
            ..ChatConfig::default()
        };
        let store = RoomStore::new(config, tx);
        let room = store.create_room("cust-1");
        assert_eq!(room.messages[0].text, "Howdy");
        assert_eq!(room.messages[0].sender, Sender::Agent);
    }
}
