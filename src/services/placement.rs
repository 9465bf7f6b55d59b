//! Rank computation across humans and bots.
//!
//! Ordering is (score desc, last-score-tick asc) everywhere: an entry with a
//! higher score, or the same score reached strictly earlier, counts ahead.
//! Iteration order (join order for humans, roster order for bots) is the
//! final tie-break, so equal (score, tick) pairs rank deterministically.

use crate::{dto::room::LeaderboardEntry, state::room::RoomState};

/// Rank for a competitor holding the given score state.
pub fn placement_of(room: &RoomState, score: u32, last_score_tick: u64) -> usize {
    let humans = room
        .participants
        .values()
        .filter(|p| !p.spectator && p.alive)
        .map(|p| (p.score, p.last_score_tick));
    let bots = room
        .bots
        .iter()
        .filter(|b| b.alive)
        .map(|b| (b.score, b.last_score_tick));

    1 + humans
        .chain(bots)
        .filter(|&(s, t)| s > score || (s == score && t < last_score_tick))
        .count()
}

/// Competitors still in contention, humans and bots combined.
pub fn alive_remaining(room: &RoomState) -> usize {
    room.alive_count()
}

/// Build the broadcast leaderboard: every human (eliminated ones included,
/// so clients can grey them out) plus living bots, sorted and truncated.
pub fn leaderboard(room: &RoomState, limit: usize) -> Vec<LeaderboardEntry> {
    // Keyed by last-score tick for the sort; the DTO carries no timing field.
    let humans = room.participants.values().filter(|p| !p.spectator).map(|p| {
        (
            p.last_score_tick,
            LeaderboardEntry {
                name: p.name.clone(),
                score: p.score,
                alive: p.alive,
                id: Some(p.id),
                is_player: true,
            },
        )
    });
    let bots = room.bots.iter().filter(|b| b.alive).map(|b| {
        (
            b.last_score_tick,
            LeaderboardEntry {
                name: b.name.clone(),
                score: b.score,
                alive: true,
                id: None,
                is_player: false,
            },
        )
    });

    let mut keyed: Vec<(u64, LeaderboardEntry)> = humans.chain(bots).collect();
    keyed.sort_by(|(at, a), (bt, b)| b.score.cmp(&a.score).then(at.cmp(bt)));

    keyed
        .into_iter()
        .take(limit)
        .map(|(_, entry)| entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::{Bot, Difficulty, Participant, RoomMode, Settings};
    use uuid::Uuid;

    fn room() -> RoomState {
        RoomState::new(
            "rank".into(),
            None,
            RoomMode::Battle,
            Settings {
                time_limit: 120,
                range: 6,
                symmetric: false,
                size_min: 2,
                size_max: 3,
                difficulty: Difficulty::Medium,
            },
            "seed".into(),
            Uuid::new_v4(),
        )
    }

    fn add_human(room: &mut RoomState, name: &str, score: u32, tick: u64, alive: bool) -> Uuid {
        let id = Uuid::new_v4();
        let seq = room.next_join_seq();
        let mut p = Participant::new(id, name.into(), seq, false);
        p.score = score;
        p.last_score_tick = tick;
        p.alive = alive;
        room.participants.insert(id, p);
        id
    }

    fn add_bot(room: &mut RoomState, name: &str, score: u32, tick: u64, alive: bool) {
        room.bots.push(Bot {
            name: name.into(),
            rate: 0.1,
            score,
            alive,
            last_score_tick: tick,
        });
    }

    #[test]
    fn higher_score_ranks_first() {
        let mut room = room();
        add_human(&mut room, "low", 3, 10, true);
        add_bot(&mut room, "high", 7, 10, true);

        assert_eq!(placement_of(&room, 7, 10), 1);
        assert_eq!(placement_of(&room, 3, 10), 2);
    }

    #[test]
    fn equal_scores_break_on_last_score_tick() {
        let mut room = room();
        add_human(&mut room, "early", 5, 4, true);
        add_human(&mut room, "late", 5, 9, true);

        // The entry that reached the score strictly earlier counts ahead.
        assert_eq!(placement_of(&room, 5, 4), 1);
        assert_eq!(placement_of(&room, 5, 9), 2);
    }

    #[test]
    fn eliminated_entries_do_not_count_against_placement() {
        let mut room = room();
        add_human(&mut room, "dead", 50, 1, false);
        add_bot(&mut room, "deadbot", 60, 1, false);
        add_human(&mut room, "alive", 2, 8, true);

        assert_eq!(placement_of(&room, 2, 8), 1);
    }

    #[test]
    fn identical_score_and_tick_is_stable() {
        let mut room = room();
        add_human(&mut room, "a", 5, 3, true);
        add_human(&mut room, "b", 5, 3, true);

        // Neither counts ahead of the other; both see the same rank and
        // the leaderboard order follows join order deterministically.
        assert_eq!(placement_of(&room, 5, 3), 1);
        let board = leaderboard(&room, 20);
        assert_eq!(board[0].name, "a");
        assert_eq!(board[1].name, "b");
    }

    #[test]
    fn leaderboard_sorts_and_truncates() {
        let mut room = room();
        for i in 0..30 {
            add_bot(&mut room, &format!("bot{i}"), i, 30 - u64::from(i), true);
        }
        let board = leaderboard(&room, 20);
        assert_eq!(board.len(), 20);
        assert_eq!(board[0].score, 29);
        for pair in board.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn leaderboard_keeps_eliminated_humans_but_drops_dead_bots() {
        let mut room = room();
        add_human(&mut room, "ghost", 9, 2, false);
        add_bot(&mut room, "deadbot", 9, 2, false);
        add_bot(&mut room, "livebot", 1, 5, true);

        let board = leaderboard(&room, 20);
        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ghost", "livebot"]);
        assert!(!board[0].alive);
    }
}
