//! Chat core: room state machine, store, presence, routing, sweeper.
//!
//! Everything in this module is transport-agnostic. Connection handlers
//! mutate chat state exclusively through [`store::RoomStore`] and
//! [`presence::PresenceRegistry`] so the room invariants are enforced in one
//! place; outbound fan-out is emitted into a single ordered outbox channel
//! that the `ws` dispatcher drains.

pub mod error;
pub mod presence;
pub mod room;
pub mod router;
pub mod store;
pub mod sweeper;

pub use self::error::ChatError;
pub use self::presence::{PresenceChange, PresenceRegistry};
pub use self::room::{ChatRoom, MESSAGE_CAP};
pub use self::router::RouteTarget;
pub use self::store::{AssignOutcome, Outbound, RoomSnapshot, RoomStore};
