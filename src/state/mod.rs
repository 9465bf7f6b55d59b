pub mod room;
pub mod state_machine;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::state::room::{ClientId, Room};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct SessionHandle {
    /// Writer channel of the connection's socket task.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Code of the room this connection is bound to, if any.
    pub room: Option<String>,
}

/// Everything a reconnect token can restore.
#[derive(Debug, Clone)]
pub struct ReconnectEntry {
    /// Room the participant belongs to.
    pub room_code: String,
    /// Connection id the participant was last bound to.
    pub participant_id: ClientId,
    /// Display name recorded at issue time.
    pub name: String,
    /// Refreshed on reconnect and on disconnect; drives idle expiry.
    pub last_seen: Instant,
}

/// Central application state storing live rooms, sessions, and reconnect tokens.
///
/// The keyed maps are sharded (`DashMap`), so registry access never takes a
/// global lock; per-room mutation serializes through each [`Room`]'s own mutex.
pub struct AppState {
    config: AppConfig,
    rooms: DashMap<String, Arc<Room>>,
    sessions: DashMap<ClientId, SessionHandle>,
    tokens: DashMap<String, ReconnectEntry>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            sessions: DashMap::new(),
            tokens: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live rooms keyed by join code.
    pub fn rooms(&self) -> &DashMap<String, Arc<Room>> {
        &self.rooms
    }

    /// Registry of connected sessions keyed by connection id.
    pub fn sessions(&self) -> &DashMap<ClientId, SessionHandle> {
        &self.sessions
    }

    /// Registry of outstanding reconnect tokens.
    pub fn tokens(&self) -> &DashMap<String, ReconnectEntry> {
        &self.tokens
    }

    /// Look up a room by code, cloning the handle out of the registry shard.
    pub fn room(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// The room code a connection is currently bound to.
    pub fn session_room(&self, id: ClientId) -> Option<String> {
        self.sessions
            .get(&id)
            .and_then(|entry| entry.value().room.clone())
    }

    /// Bind (or unbind) a connection to a room code.
    pub fn bind_session_room(&self, id: ClientId, code: Option<String>) {
        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.room = code;
        }
    }

    /// Writer channel for a connected client, if the connection is still up.
    pub fn session_tx(&self, id: ClientId) -> Option<mpsc::UnboundedSender<Message>> {
        self.sessions.get(&id).map(|entry| entry.tx.clone())
    }
}
