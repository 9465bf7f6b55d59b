//! Battle orchestration: match start, the per-room tick loop, and termination.
//!
//! One timer task exists per started room. Each firing takes the room's
//! single-writer lock, advances the simulation fully (bots, cuts, ranks),
//! broadcasts, and only then checks termination, so no client ever sees a
//! partially applied cut and the end of a match tears the timer down
//! exactly once regardless of which condition fired first.

use std::sync::Arc;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    error::RoomError,
    services::{bot_pacing, elimination, events, placement},
    state::{
        SharedState,
        room::{ClientId, Room, RoomMode, RoomState},
        state_machine::{RoomEvent, RoomPhase},
    },
};

/// Host-issued `room:start`: move the room into a running match.
///
/// An ended room first passes back through the lobby reset, then the same
/// start path applies: clocks zeroed, cut pointer rewound, humans revived,
/// and the bot roster repopulated with freshly sampled rates.
pub async fn start_match(
    state: &SharedState,
    room: &Arc<Room>,
    requester: ClientId,
) -> Result<(), RoomError> {
    let mut inner = room.lock().await;
    if inner.host_id != requester {
        return Err(RoomError::Unauthorized(
            "only the host can start the match".into(),
        ));
    }

    if inner.phase() == RoomPhase::Ended {
        inner
            .machine
            .apply(RoomEvent::Reset)
            .map_err(|_| RoomError::MatchAlreadyStarted)?;
    }
    inner
        .machine
        .apply(RoomEvent::Start)
        .map_err(|_| RoomError::MatchAlreadyStarted)?;

    inner.t = 0;
    inner.cut_index = 0;
    inner.winner_id = None;
    inner.problem_index = 0;
    inner.time_left = match inner.mode {
        RoomMode::Battle => state.config().battle_duration,
        RoomMode::Classic => inner.settings.time_limit,
    };
    for participant in inner.participants.values_mut() {
        participant.score = 0;
        participant.alive = !participant.spectator;
        participant.last_score_tick = 0;
        participant.problem_index = 0;
    }
    bot_pacing::populate_bots(&mut rand::rng(), state.config(), &mut inner);
    inner.touch();

    if let Some(stale) = inner.ticker.take() {
        // Leftover handle from a previous match whose loop already exited.
        stale.abort();
    }
    inner.ticker = Some(spawn_ticker(state.clone(), room.clone()));

    info!(room = %room.code, mode = ?inner.mode, bots = inner.bots.len(), "match started");
    events::broadcast_room_state(state, &room.code, &inner);
    Ok(())
}

/// Spawn the per-room timer task driving [`run_tick`].
fn spawn_ticker(state: SharedState, room: Arc<Room>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(state.config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so the
        // simulation advances one real interval after start.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !run_tick(&state, &room).await {
                break;
            }
        }
        debug!(room = %room.code, "tick loop stopped");
    })
}

/// Advance one simulation tick. Returns `false` once the match has ended and
/// the loop should stop.
pub async fn run_tick(state: &SharedState, room: &Arc<Room>) -> bool {
    let mut inner = room.lock().await;
    if inner.phase() != RoomPhase::Running {
        return false;
    }

    inner.t += 1;
    inner.time_left = inner.time_left.saturating_sub(1);
    inner.touch();

    bot_pacing::advance_bots(&mut inner);

    if inner.mode == RoomMode::Battle {
        if let Some(cut) = state.config().cuts.get(inner.cut_index).copied() {
            if inner.t >= cut.at {
                let eliminated = elimination::apply_cut(&mut inner, cut.keep_percent);
                inner.cut_index += 1;
                if !eliminated.is_empty() {
                    info!(room = %room.code, count = eliminated.len(), "players eliminated at cut");
                }
            }
        }
    }

    let ended = check_termination(&mut inner);

    // Elimination completed above, so ranks and the eliminated flags in this
    // broadcast are consistent; the terminal tick also carries the winner.
    events::broadcast_tick(state, state.config(), &inner);

    if let Some(status) = ended {
        events::broadcast_room_end(state, &inner, &status);
        info!(room = %room.code, status, "match ended");
        return false;
    }
    true
}

/// Evaluate the terminal conditions, applying the end transition at most once.
///
/// Returns the terminal status banner when this tick ended the match.
fn check_termination(inner: &mut RoomState) -> Option<String> {
    let survivor_win = inner.mode == RoomMode::Battle && inner.alive_count() <= 1;
    let event = if inner.time_left == 0 {
        RoomEvent::TimeExpired
    } else if survivor_win {
        RoomEvent::LastSurvivor
    } else {
        return None;
    };

    // The machine rejects a second end event, so even if both conditions hold
    // in the same tick only one transition (and one terminal broadcast) runs.
    inner.machine.apply(event).ok()?;

    let status = match sole_survivor(inner) {
        Some((name, id)) => {
            inner.winner_id = id;
            format!("winner: {name}")
        }
        None => "time's up".to_string(),
    };
    Some(status)
}

/// The single living competitor, if exactly one remains.
///
/// Bot winners have no connection id, so only their name surfaces.
fn sole_survivor(room: &RoomState) -> Option<(String, Option<ClientId>)> {
    if placement::alive_remaining(room) != 1 {
        return None;
    }
    if let Some(p) = room
        .participants
        .values()
        .find(|p| !p.spectator && p.alive)
    {
        return Some((p.name.clone(), Some(p.id)));
    }
    room.bots
        .iter()
        .find(|b| b.alive)
        .map(|b| (b.name.clone(), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::AppState;
    use crate::state::room::{Difficulty, Participant, Settings};
    use uuid::Uuid;

    fn settings() -> Settings {
        Settings {
            time_limit: 120,
            range: 6,
            symmetric: false,
            size_min: 2,
            size_max: 3,
            difficulty: Difficulty::Medium,
        }
    }

    async fn seed_room(state: &SharedState, code: &str, mode: RoomMode) -> (Arc<Room>, ClientId) {
        let host = Uuid::new_v4();
        let mut inner = RoomState::new(
            "battle".into(),
            None,
            mode,
            settings(),
            "seed".into(),
            host,
        );
        let seq = inner.next_join_seq();
        inner
            .participants
            .insert(host, Participant::new(host, "host".into(), seq, false));
        let room = Arc::new(Room::new(code.to_string(), inner));
        state.rooms().insert(code.to_string(), room.clone());
        (room, host)
    }

    #[tokio::test]
    async fn only_the_host_can_start() {
        let state = AppState::new(AppConfig::default());
        let (room, _) = seed_room(&state, "AAAAA", RoomMode::Battle).await;

        let err = start_match(&state, &room, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RoomError::Unauthorized(_)));
        assert_eq!(room.lock().await.phase(), RoomPhase::Lobby);
    }

    #[tokio::test]
    async fn start_populates_bots_and_time_budget() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "BBBBB", RoomMode::Battle).await;

        start_match(&state, &room, host).await.unwrap();

        let mut inner = room.lock().await;
        assert_eq!(inner.phase(), RoomPhase::Running);
        assert_eq!(inner.time_left, state.config().battle_duration);
        assert_eq!(inner.bots.len(), state.config().capacity - 1);
        assert_eq!(inner.t, 0);
        // Stop the spawned timer so the test does not leak a ticking task.
        inner.ticker.take().unwrap().abort();
    }

    #[tokio::test]
    async fn classic_mode_uses_the_configured_time_limit() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "CCCCC", RoomMode::Classic).await;

        start_match(&state, &room, host).await.unwrap();
        let mut inner = room.lock().await;
        assert_eq!(inner.time_left, 120);
        inner.ticker.take().unwrap().abort();
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "DDDDD", RoomMode::Battle).await;

        start_match(&state, &room, host).await.unwrap();
        let err = start_match(&state, &room, host).await.unwrap_err();
        assert!(matches!(err, RoomError::MatchAlreadyStarted));
        room.lock().await.ticker.take().unwrap().abort();
    }

    #[tokio::test]
    async fn restart_after_end_passes_through_reset() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "EEEEE", RoomMode::Classic).await;

        start_match(&state, &room, host).await.unwrap();
        {
            let mut inner = room.lock().await;
            inner.ticker.take().unwrap().abort();
            inner.machine.apply(RoomEvent::TimeExpired).unwrap();
            let p = inner.participants.get_mut(&host).unwrap();
            p.score = 9;
        }

        start_match(&state, &room, host).await.unwrap();
        let mut inner = room.lock().await;
        assert_eq!(inner.phase(), RoomPhase::Running);
        assert_eq!(inner.participants[&host].score, 0);
        assert_eq!(inner.t, 0);
        inner.ticker.take().unwrap().abort();
    }

    #[tokio::test]
    async fn tick_advances_clock_and_fires_cut_at_checkpoint() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "FFFFF", RoomMode::Battle).await;

        start_match(&state, &room, host).await.unwrap();
        {
            let mut inner = room.lock().await;
            inner.ticker.take().unwrap().abort();
            // Shrink the field so arithmetic stays inspectable: one human,
            // two bots, like the three-way cut scenario.
            inner.bots.truncate(2);
            inner.bots[0].score = 5;
            inner.bots[1].score = 1;
            inner.participants.get_mut(&host).unwrap().score = 3;
        }

        let first_cut = state.config().cuts[0].at;
        for _ in 0..first_cut {
            assert!(run_tick(&state, &room).await);
        }

        let inner = room.lock().await;
        assert_eq!(inner.t, first_cut);
        assert_eq!(inner.cut_index, 1);
        // keep = ceil(3 * 0.8) = 3: the first checkpoint keeps everyone here.
        assert_eq!(inner.alive_count(), 3);
    }

    #[tokio::test]
    async fn survivor_termination_ends_match_once_and_names_winner() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "GGGGG", RoomMode::Battle).await;

        start_match(&state, &room, host).await.unwrap();
        {
            let mut inner = room.lock().await;
            inner.ticker.take().unwrap().abort();
            // Leave only the human alive; also exhaust the clock so both
            // terminal conditions hold on the same tick.
            inner.bots.clear();
            inner.time_left = 1;
        }

        assert!(!run_tick(&state, &room).await);

        let inner = room.lock().await;
        assert_eq!(inner.phase(), RoomPhase::Ended);
        assert_eq!(inner.winner_id, Some(host));

        // A further tick is a no-op: the machine already ended.
        drop(inner);
        assert!(!run_tick(&state, &room).await);
    }

    #[tokio::test]
    async fn bot_can_win_without_a_winner_id() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "HHHHH", RoomMode::Battle).await;

        start_match(&state, &room, host).await.unwrap();
        {
            let mut inner = room.lock().await;
            inner.ticker.take().unwrap().abort();
            inner.bots.truncate(1);
            inner.participants.get_mut(&host).unwrap().alive = false;
        }

        assert!(!run_tick(&state, &room).await);
        let inner = room.lock().await;
        assert_eq!(inner.phase(), RoomPhase::Ended);
        assert!(inner.winner_id.is_none());
    }

    #[tokio::test]
    async fn classic_mode_never_cuts() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "JJJJJ", RoomMode::Classic).await;

        start_match(&state, &room, host).await.unwrap();
        {
            let mut inner = room.lock().await;
            inner.ticker.take().unwrap().abort();
        }

        let past_first_cut = state.config().cuts[0].at + 5;
        for _ in 0..past_first_cut {
            assert!(run_tick(&state, &room).await);
        }
        let inner = room.lock().await;
        assert_eq!(inner.cut_index, 0);
        assert!(inner.participants[&host].alive);
    }
}
