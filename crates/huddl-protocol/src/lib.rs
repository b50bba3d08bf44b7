//! Canonical wire types for the huddl support chat protocol.
//!
//! Everything that crosses the WebSocket boundary lives here: the message and
//! room model, the client command unions, and the server event union. The
//! server crate depends on these types; a future native client could too.
//!
//! Both directions of the protocol are closed tagged unions
//! (`#[serde(tag = "type", rename_all = "snake_case")]`), so adding or
//! renaming an event is a compile-time-checked change rather than a stringly
//! typed dispatch table.

pub mod events;
pub mod model;

pub use self::events::{AgentCommand, ServerEvent, VisitorCommand};
pub use self::model::{ChatMessage, RoomStatus, RoomSummary, Sender};
