//! Periodic room cleanup.
//!
//! All delayed destruction funnels through one task: rooms carry their own
//! removal deadlines, and the sweeper re-validates each one at fire time
//! (see [`super::store::RoomStore::sweep`]). There are no per-room timers to
//! cancel, so a visitor racing the grace period simply clears the deadline
//! and the next sweep is none the wiser.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use tokio::task::JoinHandle;

use super::store::RoomStore;

/// Spawn the background sweep loop. The task runs for the life of the
/// process; dropping the handle detaches it.
pub fn spawn(store: Arc<RoomStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; harmless, but skip the noise.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep(Utc::now());
            if removed > 0 {
                debug!("Sweeper removed {removed} room(s)");
            }
        }
    })
}
