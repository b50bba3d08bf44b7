//! WebSocket transport layer.
//!
//! Connection handlers for the two roles plus the outbound dispatcher. The
//! dispatcher is the single consumer of the store's outbox channel: it
//! resolves each [`RouteTarget`] against the hub and presence registry and
//! forwards the event, which preserves room-scoped FIFO ordering across all
//! observers.

pub mod agent;
pub mod hub;
pub mod visitor;

use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::{Outbound, PresenceRegistry, RouteTarget};
use self::hub::WsHub;

/// Spawn the outbound dispatch loop. Ends when the outbox closes (every
/// sender dropped, i.e. shutdown).
pub fn spawn_dispatcher(
    mut outbox: mpsc::UnboundedReceiver<Outbound>,
    ws_hub: Arc<WsHub>,
    presence: Arc<PresenceRegistry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((target, event)) = outbox.recv().await {
            match target {
                RouteTarget::Visitor(customer_id) => ws_hub.send_to(&customer_id, event),
                RouteTarget::Agent(agent_id) => presence.send_to(&agent_id, event),
                RouteTarget::AllAgents => presence.broadcast(event),
                RouteTarget::AllVisitors => ws_hub.broadcast(event),
            }
        }
        debug!("Outbound dispatcher stopped");
    })
}
