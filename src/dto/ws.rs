use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::room::{ChatMessage, LeaderboardEntry, PublicRoomSummary, RoomSnapshot, YouSnapshot},
    state::room::{ClientId, RoomMode, Settings},
};

/// Messages accepted from game clients over the WebSocket.
///
/// Envelopes that fail to parse (unknown `type`, missing fields) are
/// silently discarded by the socket handler.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "room:create")]
    CreateRoom {
        name: String,
        display_name: String,
        #[serde(default)]
        password: Option<String>,
        mode: RoomMode,
        settings: Settings,
    },
    #[serde(rename = "room:join")]
    JoinRoom {
        room_id: String,
        name: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        spectate: bool,
    },
    #[serde(rename = "room:leave")]
    LeaveRoom,
    #[serde(rename = "room:reconnect")]
    Reconnect { token: String },
    #[serde(rename = "room:list")]
    ListRooms,
    #[serde(rename = "room:update-settings")]
    UpdateSettings { mode: RoomMode, settings: Settings },
    #[serde(rename = "room:lock")]
    Lock { locked: bool },
    #[serde(rename = "room:start")]
    Start,
    #[serde(rename = "room:chat")]
    Chat { text: String },
    #[serde(rename = "room:kick")]
    Kick {
        #[schema(value_type = Uuid)]
        player_id: ClientId,
    },
    #[serde(rename = "room:promote")]
    Promote {
        #[schema(value_type = Uuid)]
        player_id: ClientId,
    },
    #[serde(rename = "game:score")]
    Score {
        score: u32,
        dimension: u32,
        solve_seconds: u32,
        problem_index: u32,
    },
    #[serde(other)]
    Unknown,
}

/// Events pushed to game clients over the WebSocket.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Greeting carrying the connection-scoped client id.
    #[serde(rename = "hello")]
    Hello {
        #[schema(value_type = Uuid)]
        client_id: ClientId,
    },
    /// Full room snapshot plus the recipient's own membership view.
    #[serde(rename = "room:state")]
    RoomState {
        room: RoomSnapshot,
        you: YouSnapshot,
    },
    /// Reconnection credential for the client to store locally.
    #[serde(rename = "room:token")]
    Token { token: String },
    /// Per-tick match snapshot, personalized per recipient.
    #[serde(rename = "room:tick")]
    Tick {
        time_left: u64,
        leaderboard: Vec<LeaderboardEntry>,
        placement: usize,
        status: String,
        settings: Settings,
        problem_index: u32,
        target_index: u32,
        room_mode: RoomMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[schema(value_type = Option<Uuid>)]
        winner_id: Option<ClientId>,
        eliminated: bool,
    },
    /// Resynchronization instruction after a stale score submission.
    #[serde(rename = "room:sync")]
    Sync {
        problem_index: u32,
        target_index: u32,
        seed: String,
    },
    /// A chat line; `message` for increments, `chat` for full transcripts.
    #[serde(rename = "room:chat")]
    Chat {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<ChatMessage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        chat: Option<Vec<ChatMessage>>,
    },
    /// Terminal match status.
    #[serde(rename = "room:end")]
    End {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[schema(value_type = Option<Uuid>)]
        winner_id: Option<ClientId>,
    },
    /// Recoverable failure echoed to the originating connection.
    #[serde(rename = "room:error")]
    Error { message: String },
    /// The recipient was removed from its room by the host.
    #[serde(rename = "room:kicked")]
    Kicked,
    /// Listing of public rooms.
    #[serde(rename = "room:list")]
    RoomList { rooms: Vec<PublicRoomSummary> },
}
