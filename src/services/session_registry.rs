//! Reconnect token issuance, redemption, and expiry bookkeeping.
//!
//! A participant's identity is its connection id, so surviving a network drop
//! needs an out-of-band credential. Each participant holds at most one live
//! token; redeeming it swaps the bound connection id throughout the room's
//! records without touching score, alive state, or puzzle progress.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    error::RoomError,
    services::events,
    state::{
        ReconnectEntry, SharedState,
        room::{ClientId, Participant, Room},
        state_machine::RoomPhase,
    },
};

/// Issue (or rotate) the reconnect token for a participant.
///
/// Any previous token for the same participant is dropped first, keeping
/// exactly one live credential per (room, participant) pairing.
pub fn issue_token(state: &SharedState, room_code: &str, participant: &mut Participant) -> String {
    if let Some(old) = participant.token.take() {
        state.tokens().remove(&old);
    }

    let token = Uuid::new_v4().simple().to_string();
    state.tokens().insert(
        token.clone(),
        ReconnectEntry {
            room_code: room_code.to_string(),
            participant_id: participant.id,
            name: participant.name.clone(),
            last_seen: Instant::now(),
        },
    );
    participant.token = Some(token.clone());
    token
}

/// Drop a participant's outstanding token, if any.
pub fn revoke_token(state: &SharedState, participant: &mut Participant) {
    if let Some(token) = participant.token.take() {
        state.tokens().remove(&token);
    }
}

/// Restart the idle clock on a participant's token (called at disconnect).
pub fn touch_token(state: &SharedState, participant: &Participant) {
    if let Some(token) = participant.token.as_ref() {
        if let Some(mut entry) = state.tokens().get_mut(token) {
            entry.last_seen = Instant::now();
        }
    }
}

/// Redeem a reconnect token for a new connection.
///
/// On success the participant is re-keyed under `new_id` (host and winner
/// pointers follow), the token's idle timer restarts, and the reconnecting
/// session immediately receives its credential, a full room snapshot, and,
/// if a match is running, a tick snapshot.
pub async fn reconnect(
    state: &SharedState,
    token: &str,
    new_id: ClientId,
) -> Result<Arc<Room>, RoomError> {
    let entry = state
        .tokens()
        .get(token)
        .map(|entry| entry.value().clone())
        .ok_or(RoomError::ReconnectFailed)?;

    if entry.last_seen.elapsed() > state.config().idle_ttl {
        debug!(participant = %entry.participant_id, "rejecting expired reconnect token");
        state.tokens().remove(token);
        return Err(RoomError::ReconnectFailed);
    }

    let Some(room) = state.room(&entry.room_code) else {
        state.tokens().remove(token);
        return Err(RoomError::ReconnectFailed);
    };

    let mut inner = room.lock().await;
    let Some(mut participant) = inner.participants.shift_remove(&entry.participant_id) else {
        drop(inner);
        state.tokens().remove(token);
        return Err(RoomError::ReconnectFailed);
    };

    let old_id = participant.id;
    participant.id = new_id;
    participant.connected = true;

    if inner.host_id == old_id {
        inner.host_id = new_id;
    }
    if inner.winner_id == Some(old_id) {
        inner.winner_id = Some(new_id);
    }
    inner.participants.insert(new_id, participant);
    inner.touch();

    if let Some(mut live) = state.tokens().get_mut(token) {
        live.participant_id = new_id;
        live.last_seen = Instant::now();
    }
    state.bind_session_room(new_id, Some(room.code.clone()));

    info!(room = %room.code, %old_id, %new_id, "participant reconnected");

    // The reconnector needs its credential and a fresh view before the next
    // tick lands; everyone else learns about the connectivity change.
    events::send_to_client(
        state,
        new_id,
        &ServerMessage::Token {
            token: token.to_string(),
        },
        "reconnect token",
    );
    events::broadcast_room_state(state, &room.code, &inner);
    if inner.phase() == RoomPhase::Running {
        let recipient = &inner.participants[&new_id];
        let message = events::tick_message(state.config(), &inner, recipient);
        events::send_to_client(state, new_id, &message, "reconnect tick");
    }
    drop(inner);

    Ok(room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::AppState;
    use crate::state::room::{Difficulty, RoomMode, RoomState, Settings};
    use crate::state::state_machine::RoomEvent;
    use std::time::Duration;

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

    async fn seed_room(state: &SharedState, code: &str) -> (Arc<Room>, ClientId) {
        let host = Uuid::new_v4();
        let mut inner = RoomState::new(
            "reconnect".into(),
            None,
            RoomMode::Battle,
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
    async fn reissuing_replaces_the_previous_token() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "AAAAA").await;

        let mut inner = room.lock().await;
        let participant = inner.participants.get_mut(&host).unwrap();
        let first = issue_token(&state, "AAAAA", participant);
        let second = issue_token(&state, "AAAAA", participant);

        assert_ne!(first, second);
        assert!(!state.tokens().contains_key(&first));
        assert!(state.tokens().contains_key(&second));
        assert_eq!(participant.token.as_deref(), Some(second.as_str()));
    }

    #[tokio::test]
    async fn reconnect_round_trip_preserves_match_state() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "BBBBB").await;

        let token = {
            let mut inner = room.lock().await;
            inner.machine.apply(RoomEvent::Start).unwrap();
            let participant = inner.participants.get_mut(&host).unwrap();
            participant.score = 12;
            participant.problem_index = 12;
            participant.last_score_tick = 40;
            participant.connected = false;
            issue_token(&state, "BBBBB", participant)
        };

        let new_id = Uuid::new_v4();
        let returned = reconnect(&state, &token, new_id).await.unwrap();
        assert_eq!(returned.code, "BBBBB");

        let inner = room.lock().await;
        assert!(!inner.participants.contains_key(&host));
        let participant = &inner.participants[&new_id];
        assert_eq!(participant.score, 12);
        assert_eq!(participant.problem_index, 12);
        assert!(participant.alive);
        assert!(participant.connected);
        assert_eq!(inner.host_id, new_id);

        let entry = state.tokens().get(&token).unwrap();
        assert_eq!(entry.participant_id, new_id);
    }

    #[tokio::test]
    async fn unknown_token_fails() {
        let state = AppState::new(AppConfig::default());
        let err = reconnect(&state, "nope", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RoomError::ReconnectFailed));
    }

    #[tokio::test]
    async fn token_for_a_vanished_room_fails_and_is_dropped() {
        let state = AppState::new(AppConfig::default());
        let (room, host) = seed_room(&state, "CCCCC").await;

        let token = {
            let mut inner = room.lock().await;
            let participant = inner.participants.get_mut(&host).unwrap();
            issue_token(&state, "CCCCC", participant)
        };
        state.rooms().remove("CCCCC");

        let err = reconnect(&state, &token, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RoomError::ReconnectFailed));
        assert!(!state.tokens().contains_key(&token));
    }

    #[tokio::test]
    async fn expired_token_fails() {
        let mut config = AppConfig::default();
        config.idle_ttl = Duration::ZERO;
        let state = AppState::new(config);
        let (room, host) = seed_room(&state, "DDDDD").await;

        let token = {
            let mut inner = room.lock().await;
            let participant = inner.participants.get_mut(&host).unwrap();
            issue_token(&state, "DDDDD", participant)
        };
        // With a zero TTL any elapsed time at all is past the deadline.
        tokio::time::sleep(Duration::from_millis(2)).await;

        let err = reconnect(&state, &token, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RoomError::ReconnectFailed));
        assert!(!state.tokens().contains_key(&token));
    }
}
