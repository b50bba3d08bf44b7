//! Visitor connection hub.
//!
//! Tracks the live WebSocket sender for each visitor connection. One live
//! connection per customer id: a reconnect replaces the previous entry, and
//! the replaced connection's cleanup is shielded by a connection token the
//! same way agent presence entries are.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::mpsc;

use huddl_protocol::ServerEvent;

/// Sender half of a visitor connection's outbound queue.
pub type VisitorSender = mpsc::UnboundedSender<ServerEvent>;

struct VisitorEntry {
    sender: VisitorSender,
    token: u64,
}

/// Hub of live visitor connections.
#[derive(Default)]
pub struct WsHub {
    visitors: DashMap<String, VisitorEntry>,
    next_token: AtomicU64,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visitor connection (upsert). Returns a token identifying
    /// this connection for [`WsHub::unregister`].
    pub fn register(&self, customer_id: &str, sender: VisitorSender) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .visitors
            .insert(customer_id.to_string(), VisitorEntry { sender, token })
            .is_some();
        if replaced {
            debug!("Visitor {customer_id} reconnected, replacing stale handle");
        } else {
            info!("Visitor {customer_id} connected");
        }
        token
    }

    /// Remove a visitor connection if the token still matches. Returns
    /// whether this connection was the live one; a stale cleanup after a
    /// reconnect returns false and must not touch room state.
    pub fn unregister(&self, customer_id: &str, token: u64) -> bool {
        let removed = self
            .visitors
            .remove_if(customer_id, |_, entry| entry.token == token)
            .is_some();
        if removed {
            info!("Visitor {customer_id} disconnected");
        }
        removed
    }

    /// Push an event to a single visitor. Best-effort.
    pub fn send_to(&self, customer_id: &str, event: ServerEvent) {
        if let Some(entry) = self.visitors.get(customer_id)
            && entry.sender.send(event).is_err()
        {
            debug!("Dropped event for disconnecting visitor {customer_id}");
        }
    }

    /// Push an event to every connected visitor (presence changes).
    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.visitors.iter() {
            if entry.value().sender.send(event.clone()).is_err() {
                debug!("Dropped broadcast for disconnecting visitor {}", entry.key());
            }
        }
    }

    pub fn connected_count(&self) -> usize {
        self.visitors.len()
    }
}
