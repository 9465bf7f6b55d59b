//! Percentile elimination cuts applied at scheduled checkpoints.

use tracing::debug;

use crate::state::room::{ClientId, RoomState};

/// Which competitor a cut slot refers to.
enum Slot {
    Human(ClientId),
    Bot(usize),
}

/// Apply a cut keeping `keep_percent` of the living pool.
///
/// The living set (humans and bots combined) is sorted ascending by
/// (score, last-score-tick) and the weakest `alive - keep` entries are marked
/// dead. `keep` is never below one, and a pool of one or zero is left
/// untouched, so a cut can never eliminate the last survivor.
///
/// Returns the ids of human participants eliminated by this cut so callers
/// can notify their sessions.
pub fn apply_cut(room: &mut RoomState, keep_percent: u8) -> Vec<ClientId> {
    let mut alive: Vec<(Slot, u32, u64)> = room
        .participants
        .values()
        .filter(|p| !p.spectator && p.alive)
        .map(|p| (Slot::Human(p.id), p.score, p.last_score_tick))
        .collect();
    alive.extend(
        room.bots
            .iter()
            .enumerate()
            .filter(|(_, b)| b.alive)
            .map(|(i, b)| (Slot::Bot(i), b.score, b.last_score_tick)),
    );

    if alive.len() <= 1 {
        return Vec::new();
    }

    let keep = keep_count(alive.len(), keep_percent);
    let cut = alive.len() - keep;
    if cut == 0 {
        return Vec::new();
    }

    alive.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

    let mut eliminated = Vec::new();
    for (slot, _, _) in alive.into_iter().take(cut) {
        match slot {
            Slot::Human(id) => {
                if let Some(p) = room.participants.get_mut(&id) {
                    p.alive = false;
                    eliminated.push(id);
                }
            }
            Slot::Bot(index) => room.bots[index].alive = false,
        }
    }

    debug!(
        room = %room.display_name,
        keep_percent,
        cut,
        humans = eliminated.len(),
        "applied elimination cut"
    );
    eliminated
}

/// Survivor count for a cut: `max(1, ceil(alive × keep_percent / 100))`.
fn keep_count(alive: usize, keep_percent: u8) -> usize {
    let keep = (alive * usize::from(keep_percent)).div_ceil(100);
    keep.max(1)
}
