use thiserror::Error;

/// Recoverable game-level failures surfaced to the originating connection.
///
/// Every variant maps to a `room:error` event, except [`RoomError::StaleProgress`]
/// which carries the data for a `room:sync` resynchronization instead. None of
/// these terminate the connection.
#[derive(Debug, Clone, Error)]
pub enum RoomError {
    /// No live room matches the requested code.
    #[error("room not found")]
    RoomNotFound,
    /// The supplied password does not match the room's.
    #[error("wrong password")]
    WrongPassword,
    /// The room has no free competitor seats left.
    #[error("room is full")]
    RoomFull,
    /// The match is already running and the request is lobby-only.
    #[error("match already started")]
    MatchAlreadyStarted,
    /// The requesting session is already bound to a room.
    #[error("already in a room")]
    AlreadyInRoom,
    /// The reconnect token is unknown, expired, or its room is gone.
    #[error("reconnect failed")]
    ReconnectFailed,
    /// A non-host attempted a host-only action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// A score submission disagreed with the server's progress bookkeeping.
    #[error("stale progress")]
    StaleProgress {
        /// The participant's canonical problem index.
        problem_index: u32,
        /// The room's canonical problem index.
        target_index: u32,
        /// Seed the client must regenerate its puzzle from.
        seed: String,
    },
    /// Input failed validation (name, settings, chat length, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<validator::ValidationErrors> for RoomError {
    fn from(err: validator::ValidationErrors) -> Self {
        RoomError::InvalidInput(format!("validation failed: {err}"))
    }
}
