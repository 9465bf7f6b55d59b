use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::room::{ChatEntry, ClientId, Participant, RoomMode, RoomState, Settings},
};

/// Snapshot of one room member as broadcast in `room:state`.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    #[schema(value_type = Uuid)]
    pub id: ClientId,
    pub name: String,
    pub is_host: bool,
    pub is_spectator: bool,
    pub connected: bool,
    pub alive: bool,
    pub score: u32,
}

impl ParticipantSummary {
    fn from_participant(participant: &Participant, host_id: ClientId) -> Self {
        Self {
            id: participant.id,
            name: participant.name.clone(),
            is_host: participant.id == host_id,
            is_spectator: participant.spectator,
            connected: participant.connected,
            alive: participant.alive,
            score: participant.score,
        }
    }
}

/// One chat line as sent over the wire.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ChatMessage {
    #[schema(value_type = Uuid)]
    pub id: ClientId,
    pub name: String,
    pub text: String,
    /// RFC3339 send timestamp.
    pub ts: String,
}

impl From<&ChatEntry> for ChatMessage {
    fn from(entry: &ChatEntry) -> Self {
        Self {
            id: entry.author,
            name: entry.name.clone(),
            text: entry.text.clone(),
            ts: format_system_time(entry.sent_at),
        }
    }
}

/// Full room snapshot delivered in `room:state`.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// The join code, doubling as the room's public identifier.
    pub id: String,
    pub display_name: String,
    pub mode: RoomMode,
    pub settings: Settings,
    pub settings_locked: bool,
    pub seed: String,
    #[schema(value_type = Uuid)]
    pub host_id: ClientId,
    pub started: bool,
    pub ended: bool,
    pub problem_index: u32,
    pub players_list: Vec<ParticipantSummary>,
    pub chat: Vec<ChatMessage>,
}

impl RoomSnapshot {
    /// Build the shared (non-personalized) part of a `room:state` broadcast.
    pub fn from_room(code: &str, room: &RoomState) -> Self {
        Self {
            id: code.to_string(),
            display_name: room.display_name.clone(),
            mode: room.mode,
            settings: room.settings.clone(),
            settings_locked: room.locked,
            seed: room.seed.clone(),
            host_id: room.host_id,
            started: room.started(),
            ended: room.ended(),
            problem_index: room.problem_index,
            players_list: room
                .participants
                .values()
                .map(|p| ParticipantSummary::from_participant(p, room.host_id))
                .collect(),
            chat: room.chat.iter().map(ChatMessage::from).collect(),
        }
    }
}

/// The recipient-specific half of a `room:state` broadcast.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct YouSnapshot {
    #[schema(value_type = Uuid)]
    pub id: ClientId,
    pub is_host: bool,
    pub is_spectator: bool,
}

impl YouSnapshot {
    /// Personalize a snapshot for one member.
    pub fn for_participant(participant: &Participant, host_id: ClientId) -> Self {
        Self {
            id: participant.id,
            is_host: participant.id == host_id,
            is_spectator: participant.spectator,
        }
    }
}

/// One row of a broadcast leaderboard.
///
/// Bots carry no `id`; clients use it to highlight the local player.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Uuid>)]
    pub id: Option<ClientId>,
    pub is_player: bool,
}

/// Listing row returned by `room:list`.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoomSummary {
    pub id: String,
    pub display_name: String,
    /// Current non-spectator humans.
    pub players: usize,
    /// Maximum competitors, humans and bots combined.
    pub capacity: usize,
    pub started: bool,
}
