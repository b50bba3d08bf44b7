use thiserror::Error;

/// Invalid room operations.
///
/// These are "fail quiet" conditions: handlers log them at debug level and
/// drop the offending command, the end user never sees an error. Nothing in
/// this taxonomy escalates to a crash.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChatError {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("room is closed: {0}")]
    RoomClosed(String),

    #[error("room {room_id} is not assigned to agent {agent_id}")]
    NotAssigned { room_id: String, agent_id: String },

    #[error("room {room_id} is already assigned to agent {assigned_to}")]
    AlreadyAssigned { room_id: String, assigned_to: String },
}
