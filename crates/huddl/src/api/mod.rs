//! HTTP API: shared application state and route definitions.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use tokio::sync::mpsc;

use huddl_protocol::ServerEvent;

use crate::chat::{Outbound, PresenceRegistry, RoomStore, RouteTarget};
use crate::config::AppConfig;
use crate::ws::hub::WsHub;

pub use self::routes::create_router;

/// Shared application state injected into every handler.
///
/// The store and registries are the only shared mutable state in the
/// process; connection handlers go through their operations exclusively.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<RoomStore>,
    pub presence: Arc<PresenceRegistry>,
    pub hub: Arc<WsHub>,
    outbox: mpsc::UnboundedSender<Outbound>,
}

impl AppState {
    /// Build the state graph. The returned receiver is the outbox the
    /// caller hands to [`crate::ws::spawn_dispatcher`].
    pub fn new(config: AppConfig) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let store = Arc::new(RoomStore::new(config.chat.clone(), outbox.clone()));
        let state = Self {
            config: Arc::new(config),
            store,
            presence: Arc::new(PresenceRegistry::new()),
            hub: Arc::new(WsHub::new()),
            outbox,
        };
        (state, outbox_rx)
    }

    /// Emit an event through the ordered outbox.
    pub fn emit(&self, target: RouteTarget, event: ServerEvent) {
        let _ = self.outbox.send((target, event));
    }
}
