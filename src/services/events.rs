//! Outbound event fan-out to room members.
//!
//! Every broadcast here takes `&RoomState` while the caller holds the room
//! lock, so snapshots are always derived from fully-applied state. Sends go
//! through each session's unbounded writer channel and never block.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    config::AppConfig,
    dto::{
        room::{ChatMessage, RoomSnapshot, YouSnapshot},
        ws::ServerMessage,
    },
    services::placement,
    state::{
        AppState,
        room::{ChatEntry, ClientId, Participant, RoomMode, RoomState},
        state_machine::RoomPhase,
    },
};

/// Serialize a payload and queue it onto the provided writer channel.
///
/// Serialization failures are programming errors and only logged; a closed
/// channel means the peer is tearing down and is ignored.
pub fn send_message_to_websocket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T, context: &str)
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, context, "failed to serialize message `{value:?}`");
            return;
        }
    };

    let _ = tx.send(Message::Text(payload.into()));
}

/// Send a message to one client, if its connection is still up.
pub fn send_to_client(state: &AppState, client_id: ClientId, message: &ServerMessage, context: &str) {
    if let Some(tx) = state.session_tx(client_id) {
        send_message_to_websocket(&tx, message, context);
    }
}

/// Broadcast the room snapshot to every connected member.
pub fn broadcast_room_state(state: &AppState, code: &str, room: &RoomState) {
    let snapshot = RoomSnapshot::from_room(code, room);
    for participant in room.participants.values() {
        if !participant.connected {
            continue;
        }
        let message = ServerMessage::RoomState {
            room: snapshot.clone(),
            you: YouSnapshot::for_participant(participant, room.host_id),
        };
        send_to_client(state, participant.id, &message, "room state");
    }
}

/// Human-readable battle banner carried in `room:tick`.
pub fn tick_status(config: &AppConfig, room: &RoomState) -> String {
    match room.mode {
        RoomMode::Battle => match config.cuts.get(room.cut_index) {
            Some(cut) => format!("next cut in {}s", cut.at.saturating_sub(room.t)),
            None => format!("{} remain", placement::alive_remaining(room)),
        },
        RoomMode::Classic => String::new(),
    }
}

/// Build the personalized `room:tick` message for one member.
pub fn tick_message(
    config: &AppConfig,
    room: &RoomState,
    recipient: &Participant,
) -> ServerMessage {
    let placement = if recipient.spectator {
        0
    } else {
        placement::placement_of(room, recipient.score, recipient.last_score_tick)
    };
    ServerMessage::Tick {
        time_left: room.time_left,
        leaderboard: placement::leaderboard(room, config.leaderboard_size),
        placement,
        status: tick_status(config, room),
        settings: room.settings.clone(),
        problem_index: recipient.problem_index,
        target_index: room.problem_index,
        room_mode: room.mode,
        winner_id: room.winner_id,
        eliminated: !recipient.spectator && !recipient.alive,
    }
}

/// Broadcast the per-tick snapshot, personalized per connected member.
pub fn broadcast_tick(state: &AppState, config: &AppConfig, room: &RoomState) {
    for participant in room.participants.values() {
        if !participant.connected {
            continue;
        }
        let message = tick_message(config, room, participant);
        send_to_client(state, participant.id, &message, "room tick");
    }
}

/// Broadcast a freshly posted chat line to every connected member.
pub fn broadcast_chat(state: &AppState, room: &RoomState, entry: &ChatEntry) {
    let message = ServerMessage::Chat {
        message: Some(ChatMessage::from(entry)),
        chat: None,
    };
    for participant in room.participants.values() {
        if participant.connected {
            send_to_client(state, participant.id, &message, "room chat");
        }
    }
}

/// Broadcast the terminal match status to every connected member.
pub fn broadcast_room_end(state: &AppState, room: &RoomState, status: &str) {
    debug_assert_eq!(room.phase(), RoomPhase::Ended);
    let message = ServerMessage::End {
        status: status.to_string(),
        winner_id: room.winner_id,
    };
    for participant in room.participants.values() {
        if participant.connected {
            send_to_client(state, participant.id, &message, "room end");
        }
    }
}
