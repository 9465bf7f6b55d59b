use std::collections::VecDeque;
use std::time::{Instant, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::state_machine::{RoomPhase, RoomStateMachine};

/// Connection-scoped identifier for a client; reassigned on reconnect.
pub type ClientId = Uuid;

/// Match flavor selected at room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    /// Fixed-time solo-style scoring, no eliminations.
    Classic,
    /// Battle royale: scheduled percentile cuts until one competitor remains.
    Battle,
}

/// Difficulty tier controlling how fast simulated competitors score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Improbable,
}

/// Puzzle generation settings negotiated in the lobby.
///
/// The generator itself lives client-side; the server only relays these
/// values and derives the bot pacing size factor from the size bounds.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Match length in seconds for classic mode.
    #[validate(range(min = 10, max = 900))]
    pub time_limit: u64,
    /// Magnitude bound for generated matrix entries.
    #[validate(range(min = 2, max = 99))]
    pub range: u32,
    /// Whether generated matrices are symmetric.
    pub symmetric: bool,
    /// Smallest matrix dimension in play.
    #[validate(range(min = 2, max = 8))]
    pub size_min: u32,
    /// Largest matrix dimension in play.
    #[validate(range(min = 2, max = 8))]
    pub size_max: u32,
    /// Bot pacing tier.
    pub difficulty: Difficulty,
}

impl Settings {
    /// Mean of the configured size bounds, used by the pacing size factor.
    pub fn average_size(&self) -> f64 {
        f64::from(self.size_min + self.size_max) / 2.0
    }
}

/// A human member of a room.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Current connection id; swapped in place on reconnect.
    pub id: ClientId,
    /// Display name chosen at join time.
    pub name: String,
    /// Monotonic join sequence within the room, drives host promotion.
    pub joined_seq: u64,
    /// Spectators watch broadcasts but never score or count toward capacity.
    pub spectator: bool,
    /// Still in contention (battle mode cuts clear this).
    pub alive: bool,
    /// Whether a live connection is currently bound to this participant.
    pub connected: bool,
    /// Total accepted puzzle solutions this match.
    pub score: u32,
    /// Tick at which the score last increased.
    pub last_score_tick: u64,
    /// Index of the puzzle this participant should be solving next.
    pub problem_index: u32,
    /// Outstanding reconnect token, if one has been issued.
    pub token: Option<String>,
}

impl Participant {
    /// Build a fresh participant joining a room.
    pub fn new(id: ClientId, name: String, joined_seq: u64, spectator: bool) -> Self {
        Self {
            id,
            name,
            joined_seq,
            spectator,
            alive: !spectator,
            connected: true,
            score: 0,
            last_score_tick: 0,
            problem_index: 0,
            token: None,
        }
    }
}

/// A simulated competitor filling out the room up to capacity.
#[derive(Debug, Clone)]
pub struct Bot {
    /// Name drawn from the configured pool.
    pub name: String,
    /// Per-match scoring rate, sampled once at match start.
    pub rate: f64,
    /// Current simulated score.
    pub score: u32,
    /// Still in contention.
    pub alive: bool,
    /// Tick at which the score last increased.
    pub last_score_tick: u64,
}

/// One chat line retained in the room's bounded transcript.
#[derive(Debug, Clone)]
pub struct ChatEntry {
    /// Connection id of the author at send time.
    pub author: ClientId,
    /// Author display name.
    pub name: String,
    /// Message body.
    pub text: String,
    /// Wall-clock send time.
    pub sent_at: SystemTime,
}

/// A live room; all mutable state sits behind a single per-room mutex.
///
/// The mutex is the room's single-writer lane: connection tasks, the tick
/// loop, and the sweeper all serialize through it, so invariants like
/// alive/placement consistency hold across every broadcastable snapshot.
#[derive(Debug)]
pub struct Room {
    /// Short human-enterable join code, unique while the room is live.
    pub code: String,
    inner: Mutex<RoomState>,
}

impl Room {
    /// Wrap freshly built room state behind its mutation lock.
    pub fn new(code: String, state: RoomState) -> Self {
        Self {
            code,
            inner: Mutex::new(state),
        }
    }

    /// Acquire the room's single-writer lock.
    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.inner.lock().await
    }
}

/// Mutable state owned by a [`Room`].
#[derive(Debug)]
pub struct RoomState {
    /// Human-facing room title (distinct from the join code).
    pub display_name: String,
    /// Join password; `None` makes the room publicly listed.
    pub password: Option<String>,
    /// Match flavor.
    pub mode: RoomMode,
    /// Current puzzle settings.
    pub settings: Settings,
    /// Host-applied settings freeze, independent of match start.
    pub locked: bool,
    /// Seed all clients feed their deterministic puzzle generator.
    pub seed: String,
    /// Canonical count of puzzles validated as solved room-wide.
    pub problem_index: u32,
    /// Elapsed ticks since match start.
    pub t: u64,
    /// Remaining ticks in the current match, floored at zero.
    pub time_left: u64,
    /// Next elimination checkpoint to apply.
    pub cut_index: usize,
    /// Lifecycle machine gating which operations are reachable.
    pub machine: RoomStateMachine,
    /// Connection id of the current host.
    pub host_id: ClientId,
    /// Members in join order; keys are live connection ids.
    pub participants: IndexMap<ClientId, Participant>,
    /// Simulated competitors, populated at match start.
    pub bots: Vec<Bot>,
    /// Bounded chat transcript.
    pub chat: VecDeque<ChatEntry>,
    /// Winner of the last ended match, when exactly one human survived.
    pub winner_id: Option<ClientId>,
    /// Creation wall-clock timestamp.
    pub created_at: SystemTime,
    /// Last join/chat/score/tick activity, drives idle expiry.
    pub last_active: Instant,
    /// Monotonic counter backing [`Participant::joined_seq`].
    pub join_counter: u64,
    /// Handle of the running tick loop, if any.
    pub ticker: Option<JoinHandle<()>>,
}

impl RoomState {
    /// Build lobby-phase state for a freshly created room.
    pub fn new(
        display_name: String,
        password: Option<String>,
        mode: RoomMode,
        settings: Settings,
        seed: String,
        host_id: ClientId,
    ) -> Self {
        Self {
            display_name,
            password,
            mode,
            settings,
            locked: false,
            seed,
            problem_index: 0,
            t: 0,
            time_left: 0,
            cut_index: 0,
            machine: RoomStateMachine::new(),
            host_id,
            participants: IndexMap::new(),
            bots: Vec::new(),
            chat: VecDeque::new(),
            winner_id: None,
            created_at: SystemTime::now(),
            last_active: Instant::now(),
            join_counter: 0,
            ticker: None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// Whether a match is currently in progress.
    pub fn started(&self) -> bool {
        self.phase() == RoomPhase::Running
    }

    /// Whether the last match has ended and the room awaits a reset.
    pub fn ended(&self) -> bool {
        self.phase() == RoomPhase::Ended
    }

    /// Rooms without a password are publicly listed.
    pub fn is_public(&self) -> bool {
        self.password.is_none()
    }

    /// Count of non-spectator humans.
    pub fn human_count(&self) -> usize {
        self.participants.values().filter(|p| !p.spectator).count()
    }

    /// Count of competitors (humans and bots) still in contention.
    pub fn alive_count(&self) -> usize {
        let humans = self
            .participants
            .values()
            .filter(|p| !p.spectator && p.alive)
            .count();
        let bots = self.bots.iter().filter(|b| b.alive).count();
        humans + bots
    }

    /// Allocate the next join sequence number.
    pub fn next_join_seq(&mut self) -> u64 {
        let seq = self.join_counter;
        self.join_counter += 1;
        seq
    }

    /// Refresh the idle-expiry clock.
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Append a chat entry, evicting the oldest line past `capacity`.
    pub fn push_chat(&mut self, entry: ChatEntry, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.chat.len() >= capacity {
            self.chat.pop_front();
        }
        self.chat.push_back(entry);
    }

    /// The remaining earliest-joined participant, used for host promotion.
    pub fn earliest_joined(&self) -> Option<&Participant> {
        self.participants.values().min_by_key(|p| p.joined_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn state() -> RoomState {
        RoomState::new(
            "test".into(),
            None,
            RoomMode::Battle,
            settings(),
            "seed".into(),
            Uuid::new_v4(),
        )
    }

    #[test]
    fn chat_transcript_is_bounded() {
        let mut room = state();
        for i in 0..10 {
            let entry = ChatEntry {
                author: Uuid::new_v4(),
                name: "a".into(),
                text: format!("line {i}"),
                sent_at: SystemTime::now(),
            };
            room.push_chat(entry, 4);
        }
        assert_eq!(room.chat.len(), 4);
        assert_eq!(room.chat.front().unwrap().text, "line 6");
        assert_eq!(room.chat.back().unwrap().text, "line 9");
    }

    #[test]
    fn spectators_do_not_count_as_humans_or_alive() {
        let mut room = state();
        let player = Uuid::new_v4();
        let seq = room.next_join_seq();
        room.participants
            .insert(player, Participant::new(player, "player".into(), seq, false));
        let watcher = Uuid::new_v4();
        let seq = room.next_join_seq();
        room.participants
            .insert(watcher, Participant::new(watcher, "watcher".into(), seq, true));

        assert_eq!(room.human_count(), 1);
        assert_eq!(room.alive_count(), 1);
    }

    #[test]
    fn earliest_joined_survives_rekeying() {
        let mut room = state();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let seq = room.next_join_seq();
        room.participants
            .insert(first, Participant::new(first, "first".into(), seq, false));
        let seq = room.next_join_seq();
        room.participants
            .insert(second, Participant::new(second, "second".into(), seq, false));

        // Reconnect re-keys the first joiner under a new connection id,
        // moving it to the back of the map; join order must still win.
        let mut moved = room.participants.shift_remove(&first).unwrap();
        let new_id = Uuid::new_v4();
        moved.id = new_id;
        room.participants.insert(new_id, moved);

        assert_eq!(room.earliest_joined().unwrap().id, new_id);
    }

    #[test]
    fn average_size_is_midpoint() {
        let s = settings();
        assert!((s.average_size() - 2.5).abs() < f64::EPSILON);
    }
}
