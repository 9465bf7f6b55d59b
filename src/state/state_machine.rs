use thiserror::Error;

/// Lifecycle phases a room moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomPhase {
    /// Members gather and negotiate settings; the simulation clock is stopped.
    #[default]
    Lobby,
    /// A match is in progress and the tick loop is advancing.
    Running,
    /// The match has finished; scores are frozen until the room resets.
    Ended,
}

/// Events that can be applied to a room's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host launches the match from the lobby.
    Start,
    /// The match's time budget ran out.
    TimeExpired,
    /// At most one living competitor remains (battle mode).
    LastSurvivor,
    /// An ended room returns to the lobby ahead of a fresh start.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// State machine implementing the per-room match lifecycle.
///
/// Termination is idempotent by construction: the first end event moves the
/// machine to [`RoomPhase::Ended`], and any further end event is rejected,
/// so end-of-match effects (timer teardown, terminal broadcast) run once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomStateMachine {
    phase: RoomPhase,
}

impl RoomStateMachine {
    /// Create a new machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Lobby, RoomEvent::Start) => RoomPhase::Running,
            (RoomPhase::Running, RoomEvent::TimeExpired) => RoomPhase::Ended,
            (RoomPhase::Running, RoomEvent::LastSurvivor) => RoomPhase::Ended,
            (RoomPhase::Ended, RoomEvent::Reset) => RoomPhase::Lobby,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.phase = next;
        Ok(next)
    }
}
