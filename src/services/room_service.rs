//! Room lifecycle: creation, membership, settings negotiation, chat, and teardown.
//!
//! Every operation resolves the caller's room through its session binding,
//! takes the room's single-writer lock, mutates, and broadcasts from the
//! locked snapshot. Registry maps are only touched outside `await`s on the
//! same shard, so shard guards never overlap the room lock.

use std::sync::Arc;
use std::time::SystemTime;

use rand::Rng;
use tracing::{debug, info};
use validator::Validate;

use crate::{
    dto::{
        room::PublicRoomSummary,
        validation::{CODE_ALPHABET, CODE_LENGTH, validate_chat_text, validate_display_name},
        ws::ServerMessage,
    },
    error::RoomError,
    services::{bot_pacing, events, session_registry},
    state::{
        SharedState,
        room::{ChatEntry, ClientId, Participant, Room, RoomMode, RoomState, Settings},
    },
};

/// Length of a freshly generated puzzle seed, in hex characters.
const SEED_LENGTH: usize = 16;

/// Generate one candidate room code from the code alphabet.
fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a fresh puzzle seed for deterministic client-side generation.
pub fn generate_seed<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SEED_LENGTH)
        .map(|_| {
            let nibble = rng.random_range(0..16_u32);
            char::from_digit(nibble, 16).unwrap_or('0')
        })
        .collect()
}

fn normalize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.trim().is_empty())
}

fn validate_settings(settings: &Settings) -> Result<(), RoomError> {
    settings.validate()?;
    if settings.size_min > settings.size_max {
        return Err(RoomError::InvalidInput(
            "sizeMin must not exceed sizeMax".into(),
        ));
    }
    Ok(())
}

/// Resolve the room the given connection is bound to.
fn bound_room(state: &SharedState, requester: ClientId) -> Result<Arc<Room>, RoomError> {
    let code = state
        .session_room(requester)
        .ok_or(RoomError::RoomNotFound)?;
    state.room(&code).ok_or(RoomError::RoomNotFound)
}

/// Create a room with the requester as host and sole participant.
///
/// The join code is regenerated until it misses every live room, and the
/// room enters the registry fully formed (host included), so no observer can
/// ever see it empty.
pub async fn create_room(
    state: &SharedState,
    requester: ClientId,
    name: String,
    display_name: String,
    password: Option<String>,
    mode: RoomMode,
    settings: Settings,
) -> Result<Arc<Room>, RoomError> {
    if state.session_room(requester).is_some() {
        return Err(RoomError::AlreadyInRoom);
    }
    validate_display_name(&name).map_err(|e| RoomError::InvalidInput(e.to_string()))?;
    validate_display_name(&display_name).map_err(|e| RoomError::InvalidInput(e.to_string()))?;
    validate_settings(&settings)?;

    // `ThreadRng` is not `Send`; confine it to this block so the seed and
    // room code (both `Send`) are all that cross the later `.await`, keeping
    // the resulting future `Send` for axum's `on_upgrade`.
    let (seed, code) = {
        let mut rng = rand::rng();
        let seed = generate_seed(&mut rng);
        // Retry generation until the code misses every live room.
        let mut code = generate_code(&mut rng);
        while state.rooms().contains_key(&code) {
            code = generate_code(&mut rng);
        }
        (seed, code)
    };

    let mut inner = RoomState::new(
        display_name,
        normalize_password(password),
        mode,
        settings,
        seed,
        requester,
    );
    let seq = inner.next_join_seq();
    inner.participants.insert(
        requester,
        Participant::new(requester, name.trim().to_string(), seq, false),
    );

    let room = Arc::new(Room::new(code.clone(), inner));
    state.rooms().insert(code, room.clone());

    let mut inner = room.lock().await;
    if let Some(host) = inner.participants.get_mut(&requester) {
        let token = session_registry::issue_token(state, &room.code, host);
        events::send_to_client(state, requester, &ServerMessage::Token { token }, "token");
    }
    state.bind_session_room(requester, Some(room.code.clone()));

    info!(room = %room.code, host = %requester, "room created");
    events::broadcast_room_state(state, &room.code, &inner);
    drop(inner);

    Ok(room)
}

/// Join an existing room by code, optionally as a spectator.
pub async fn join_room(
    state: &SharedState,
    requester: ClientId,
    code: &str,
    name: String,
    password: Option<String>,
    spectate: bool,
) -> Result<Arc<Room>, RoomError> {
    if state.session_room(requester).is_some() {
        return Err(RoomError::AlreadyInRoom);
    }
    validate_display_name(&name).map_err(|e| RoomError::InvalidInput(e.to_string()))?;

    let code = code.trim().to_uppercase();
    let room = state.room(&code).ok_or(RoomError::RoomNotFound)?;

    let mut inner = room.lock().await;
    if let Some(expected) = inner.password.as_deref() {
        if password.as_deref() != Some(expected) {
            return Err(RoomError::WrongPassword);
        }
    }
    if inner.started() && !spectate {
        return Err(RoomError::MatchAlreadyStarted);
    }
    if !spectate && inner.human_count() >= state.config().capacity {
        return Err(RoomError::RoomFull);
    }

    let seq = inner.next_join_seq();
    let mut participant = Participant::new(requester, name.trim().to_string(), seq, spectate);
    let token = session_registry::issue_token(state, &room.code, &mut participant);
    inner.participants.insert(requester, participant);
    bot_pacing::reconcile_bots(state.config(), &mut inner);
    inner.touch();
    state.bind_session_room(requester, Some(room.code.clone()));

    info!(room = %room.code, client = %requester, spectate, "participant joined");
    events::send_to_client(state, requester, &ServerMessage::Token { token }, "token");
    events::broadcast_room_state(state, &room.code, &inner);
    drop(inner);

    Ok(room)
}

/// Remove a participant from its room, promoting a new host or tearing the
/// room down as needed. Shared by leave, kick, disconnect, and token expiry.
pub async fn remove_from_room(state: &SharedState, room: &Arc<Room>, target: ClientId) {
    let mut inner = room.lock().await;
    let Some(mut departing) = inner.participants.shift_remove(&target) else {
        return;
    };
    session_registry::revoke_token(state, &mut departing);
    inner.touch();

    if inner.participants.is_empty() {
        drop(inner);
        destroy_room(state, room).await;
        return;
    }

    if inner.host_id == target {
        if let Some(next_host) = inner.earliest_joined().map(|p| p.id) {
            inner.host_id = next_host;
            debug!(room = %room.code, host = %next_host, "promoted new host");
        }
    }
    bot_pacing::reconcile_bots(state.config(), &mut inner);
    events::broadcast_room_state(state, &room.code, &inner);
}

/// Explicit `room:leave` from a connection.
pub async fn leave_room(state: &SharedState, requester: ClientId) -> Result<(), RoomError> {
    let room = bound_room(state, requester)?;
    state.bind_session_room(requester, None);
    remove_from_room(state, &room, requester).await;
    info!(room = %room.code, client = %requester, "participant left");
    Ok(())
}

/// Host-only removal of another participant.
pub async fn kick(
    state: &SharedState,
    requester: ClientId,
    target: ClientId,
) -> Result<(), RoomError> {
    let room = bound_room(state, requester)?;
    {
        let inner = room.lock().await;
        if inner.host_id != requester {
            return Err(RoomError::Unauthorized(
                "only the host can remove players".into(),
            ));
        }
        if !inner.participants.contains_key(&target) {
            return Err(RoomError::InvalidInput("no such player".into()));
        }
    }

    events::send_to_client(state, target, &ServerMessage::Kicked, "kicked");
    state.bind_session_room(target, None);
    remove_from_room(state, &room, target).await;
    info!(room = %room.code, %target, "participant kicked");
    Ok(())
}

/// Host-only transfer of the host role.
pub async fn promote(
    state: &SharedState,
    requester: ClientId,
    target: ClientId,
) -> Result<(), RoomError> {
    let room = bound_room(state, requester)?;
    let mut inner = room.lock().await;
    if inner.host_id != requester {
        return Err(RoomError::Unauthorized(
            "only the host can promote players".into(),
        ));
    }
    if !inner.participants.contains_key(&target) {
        return Err(RoomError::InvalidInput("no such player".into()));
    }

    inner.host_id = target;
    inner.touch();
    events::broadcast_room_state(state, &room.code, &inner);
    info!(room = %room.code, host = %target, "host role transferred");
    Ok(())
}

/// Host-only settings update, permitted only while unstarted and unlocked.
///
/// A settings change invalidates in-flight puzzle state: the seed is
/// regenerated and every progress index resets to zero.
pub async fn update_settings(
    state: &SharedState,
    requester: ClientId,
    mode: RoomMode,
    settings: Settings,
) -> Result<(), RoomError> {
    validate_settings(&settings)?;
    let room = bound_room(state, requester)?;
    let mut inner = room.lock().await;
    if inner.host_id != requester {
        return Err(RoomError::Unauthorized(
            "only the host can change settings".into(),
        ));
    }
    if inner.started() {
        return Err(RoomError::MatchAlreadyStarted);
    }
    if inner.locked {
        return Err(RoomError::Unauthorized("settings are locked".into()));
    }

    inner.mode = mode;
    inner.settings = settings;
    inner.seed = generate_seed(&mut rand::rng());
    inner.problem_index = 0;
    for participant in inner.participants.values_mut() {
        participant.problem_index = 0;
    }
    inner.touch();
    events::broadcast_room_state(state, &room.code, &inner);
    debug!(room = %room.code, "settings updated, seed regenerated");
    Ok(())
}

/// Host-only settings freeze/unfreeze, independent of match start.
pub async fn toggle_lock(
    state: &SharedState,
    requester: ClientId,
    locked: bool,
) -> Result<(), RoomError> {
    let room = bound_room(state, requester)?;
    let mut inner = room.lock().await;
    if inner.host_id != requester {
        return Err(RoomError::Unauthorized(
            "only the host can lock settings".into(),
        ));
    }

    inner.locked = locked;
    inner.touch();
    events::broadcast_room_state(state, &room.code, &inner);
    Ok(())
}

/// Snapshot every public, non-ended room for the lobby browser.
///
/// Rooms are visited one at a time, so the listing tolerates a momentarily
/// stale view instead of locking the whole registry.
pub async fn list_public_rooms(state: &SharedState) -> Vec<PublicRoomSummary> {
    let rooms: Vec<Arc<Room>> = state
        .rooms()
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    let mut listing = Vec::new();
    for room in rooms {
        let inner = room.lock().await;
        if !inner.is_public() || inner.ended() {
            continue;
        }
        listing.push(PublicRoomSummary {
            id: room.code.clone(),
            display_name: inner.display_name.clone(),
            players: inner.human_count(),
            capacity: state.config().capacity,
            started: inner.started(),
        });
    }
    listing
}

/// Append a chat line and broadcast it to the room.
pub async fn post_chat(
    state: &SharedState,
    requester: ClientId,
    text: String,
) -> Result<(), RoomError> {
    validate_chat_text(&text).map_err(|e| RoomError::InvalidInput(e.to_string()))?;
    let room = bound_room(state, requester)?;
    let mut inner = room.lock().await;
    let Some(author) = inner.participants.get(&requester) else {
        return Err(RoomError::RoomNotFound);
    };

    let entry = ChatEntry {
        author: requester,
        name: author.name.clone(),
        text: text.trim().to_string(),
        sent_at: SystemTime::now(),
    };
    let capacity = state.config().chat_history;
    inner.push_chat(entry.clone(), capacity);
    inner.touch();
    events::broadcast_chat(state, &inner, &entry);
    Ok(())
}

/// Tear a room down: cancel its tick loop, revoke member tokens, and drop it
/// from the registry.
pub async fn destroy_room(state: &SharedState, room: &Arc<Room>) {
    state.rooms().remove(&room.code);

    let mut inner = room.lock().await;
    if let Some(ticker) = inner.ticker.take() {
        ticker.abort();
    }
    for participant in inner.participants.values_mut() {
        session_registry::revoke_token(state, participant);
        state.bind_session_room(participant.id, None);
    }
    info!(room = %room.code, "room destroyed");
}

/// Handle a dropped connection.
///
/// The participant is retained in a disconnected state while its reconnect
/// token is outstanding; otherwise it is removed like an explicit leave.
pub async fn handle_disconnect(state: &SharedState, requester: ClientId) {
    let binding = state
        .sessions()
        .remove(&requester)
        .and_then(|(_, session)| session.room);
    let Some(code) = binding else {
        return;
    };
    let Some(room) = state.room(&code) else {
        return;
    };

    let mut inner = room.lock().await;
    let Some(participant) = inner.participants.get_mut(&requester) else {
        return;
    };

    if participant.token.is_some() {
        participant.connected = false;
        session_registry::touch_token(state, participant);
        inner.touch();
        debug!(room = %code, client = %requester, "participant disconnected, awaiting reconnect");
        events::broadcast_room_state(state, &code, &inner);
    } else {
        drop(inner);
        remove_from_room(state, &room, requester).await;
    }
}
