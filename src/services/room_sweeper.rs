//! Periodic housekeeping for idle rooms and expired reconnect credentials.
//!
//! Expiry is a time-bounded transition evaluated here on a fixed cadence,
//! never a side effect of map iteration order: tokens past the idle TTL are
//! dropped first (removing their still-disconnected participants through the
//! normal leave path, with its host-promotion and teardown rules), then empty
//! and idle-unstarted rooms are deleted.

use std::sync::Arc;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    dto::ws::ServerMessage,
    services::{events, room_service},
    state::{
        SharedState,
        room::{ClientId, Room},
        state_machine::RoomPhase,
    },
};

/// Run the sweeper until the process shuts down.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep(&state).await;
    }
}

/// One housekeeping pass over tokens and rooms.
pub async fn sweep(state: &SharedState) {
    expire_tokens(state).await;
    collect_rooms(state).await;
}

/// Drop idle tokens and remove their disconnected participants.
async fn expire_tokens(state: &SharedState) {
    let ttl = state.config().idle_ttl;
    let expired: Vec<(String, String, ClientId)> = state
        .tokens()
        .iter()
        .filter(|entry| entry.value().last_seen.elapsed() > ttl)
        .map(|entry| {
            (
                entry.key().clone(),
                entry.value().room_code.clone(),
                entry.value().participant_id,
            )
        })
        .collect();

    for (token, room_code, participant_id) in expired {
        // A live connection keeps its credential: restart the idle clock.
        if state.sessions().contains_key(&participant_id) {
            if let Some(mut entry) = state.tokens().get_mut(&token) {
                entry.last_seen = std::time::Instant::now();
            }
            continue;
        }

        state.tokens().remove(&token);
        debug!(%participant_id, room = %room_code, "reconnect token expired");

        if let Some(room) = state.room(&room_code) {
            let disconnected = {
                let inner = room.lock().await;
                inner
                    .participants
                    .get(&participant_id)
                    .is_some_and(|p| !p.connected)
            };
            if disconnected {
                room_service::remove_from_room(state, &room, participant_id).await;
            }
        }
    }
}

/// Delete empty rooms immediately and unstarted rooms idle beyond the TTL.
async fn collect_rooms(state: &SharedState) {
    let ttl = state.config().idle_ttl;
    let rooms: Vec<Arc<Room>> = state
        .rooms()
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    for room in rooms {
        let verdict = {
            let inner = room.lock().await;
            if inner.participants.is_empty() {
                Some("empty")
            } else if inner.phase() == RoomPhase::Lobby && inner.last_active.elapsed() > ttl {
                Some("idle")
            } else {
                None
            }
        };

        let Some(reason) = verdict else { continue };
        if reason == "idle" {
            // Members of an expired lobby learn they were removed.
            let inner = room.lock().await;
            for participant in inner.participants.values() {
                if participant.connected {
                    events::send_to_client(
                        state,
                        participant.id,
                        &ServerMessage::Kicked,
                        "idle room expired",
                    );
                }
            }
        }
        info!(room = %room.code, reason, "sweeping room");
        room_service::destroy_room(state, &room).await;
    }
}
