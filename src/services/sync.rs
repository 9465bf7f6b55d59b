//! Reconciles client-reported puzzle progress with the room's bookkeeping.
//!
//! Clients generate puzzles locally from `(seed, index)`, so the server only
//! has to keep everyone's index honest: a submission whose reported index
//! disagrees with the participant's recorded index is rejected with the data
//! needed to regenerate the right puzzle, instead of being scored.

use tracing::debug;

use crate::{
    error::RoomError,
    state::{room::{ClientId, RoomState}, state_machine::RoomPhase},
};

/// A submission that passed reconciliation and was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedScore {
    /// The participant's score after the max-merge.
    pub score: u32,
    /// The participant's advanced problem index.
    pub problem_index: u32,
}

/// Apply one `game:score` submission.
///
/// Returns `Ok(None)` when the submission is silently ignored (no running
/// match, unknown participant, or spectator), `Ok(Some(_))` when accepted,
/// and [`RoomError::StaleProgress`] when the reported index disagrees with
/// the server's records.
pub fn apply_score_submission(
    room: &mut RoomState,
    participant_id: ClientId,
    submitted_score: u32,
    reported_index: u32,
) -> Result<Option<AcceptedScore>, RoomError> {
    if room.phase() != RoomPhase::Running {
        debug!(%participant_id, "ignoring score submission outside a running match");
        return Ok(None);
    }

    let seed = room.seed.clone();
    let target_index = room.problem_index;
    let current_tick = room.t;

    let Some(participant) = room.participants.get_mut(&participant_id) else {
        return Ok(None);
    };
    if participant.spectator {
        return Ok(None);
    }

    if reported_index != participant.problem_index {
        return Err(RoomError::StaleProgress {
            problem_index: participant.problem_index,
            target_index,
            seed,
        });
    }

    // Only strictly increasing scores are accepted; a replayed or delayed
    // submission can never lower the recorded score.
    participant.score = participant.score.max(submitted_score);
    participant.problem_index += 1;
    participant.last_score_tick = current_tick;

    let accepted = AcceptedScore {
        score: participant.score,
        problem_index: participant.problem_index,
    };

    // The canonical index tracks the furthest validated progress, so a
    // participant's index never exceeds it at the moment it is recorded.
    room.problem_index = room.problem_index.max(accepted.problem_index);
    room.touch();

    Ok(Some(accepted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::{Difficulty, Participant, RoomMode, Settings};
    use crate::state::state_machine::RoomEvent;
    use uuid::Uuid;

    fn running_room() -> (RoomState, Uuid) {
        let mut room = RoomState::new(
            "sync".into(),
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
            "feedbeef".into(),
            Uuid::new_v4(),
        );
        let id = Uuid::new_v4();
        let seq = room.next_join_seq();
        room.participants
            .insert(id, Participant::new(id, "solver".into(), seq, false));
        room.machine.apply(RoomEvent::Start).unwrap();
        (room, id)
    }

    #[test]
    fn accepted_submission_advances_index_by_exactly_one() {
        let (mut room, id) = running_room();
        room.t = 7;

        let accepted = apply_score_submission(&mut room, id, 1, 0).unwrap().unwrap();
        assert_eq!(accepted.score, 1);
        assert_eq!(accepted.problem_index, 1);

        let p = &room.participants[&id];
        assert_eq!(p.problem_index, 1);
        assert_eq!(p.last_score_tick, 7);
        assert_eq!(room.problem_index, 1);
    }

    #[test]
    fn scores_never_decrease() {
        let (mut room, id) = running_room();
        apply_score_submission(&mut room, id, 5, 0).unwrap();
        apply_score_submission(&mut room, id, 2, 1).unwrap();
        assert_eq!(room.participants[&id].score, 5);
        assert_eq!(room.participants[&id].problem_index, 2);
    }

    #[test]
    fn stale_index_yields_resync_with_canonical_data() {
        let (mut room, id) = running_room();
        apply_score_submission(&mut room, id, 1, 0).unwrap();

        let err = apply_score_submission(&mut room, id, 2, 0).unwrap_err();
        match err {
            RoomError::StaleProgress {
                problem_index,
                target_index,
                seed,
            } => {
                assert_eq!(problem_index, 1);
                assert_eq!(target_index, 1);
                assert_eq!(seed, "feedbeef");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The rejected submission left the participant untouched.
        assert_eq!(room.participants[&id].problem_index, 1);
        assert_eq!(room.participants[&id].score, 1);
    }

    #[test]
    fn ahead_of_server_index_is_also_stale() {
        let (mut room, id) = running_room();
        let err = apply_score_submission(&mut room, id, 1, 3).unwrap_err();
        assert!(matches!(err, RoomError::StaleProgress { problem_index: 0, .. }));
    }

    #[test]
    fn participant_index_never_exceeds_canonical() {
        let (mut room, id) = running_room();
        for i in 0..5 {
            apply_score_submission(&mut room, id, i + 1, i).unwrap();
            assert!(room.participants[&id].problem_index <= room.problem_index);
        }
    }

    #[test]
    fn ended_rooms_accept_no_submissions() {
        let (mut room, id) = running_room();
        room.machine.apply(RoomEvent::TimeExpired).unwrap();
        let outcome = apply_score_submission(&mut room, id, 9, 0).unwrap();
        assert!(outcome.is_none());
        assert_eq!(room.participants[&id].score, 0);
    }

    #[test]
    fn spectators_cannot_score() {
        let (mut room, _) = running_room();
        let id = Uuid::new_v4();
        let seq = room.next_join_seq();
        room.participants
            .insert(id, Participant::new(id, "watcher".into(), seq, true));
        let outcome = apply_score_submission(&mut room, id, 3, 0).unwrap();
        assert!(outcome.is_none());
    }
}
