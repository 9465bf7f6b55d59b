//! Pacing model for simulated competitors.
//!
//! Each bot gets a per-match rate sampled from a normal distribution keyed to
//! the room's difficulty tier. During the match its score tracks
//! `floor(rate × size_factor × elapsed_ticks)`, never regressing, so the pool
//! as a whole accelerates smoothly without per-tick randomness.

use rand::{Rng, seq::SliceRandom};

use crate::{
    config::{AppConfig, PacingParams},
    state::room::{Bot, RoomState, Settings},
};

/// Sample a normally distributed value via the Box-Muller transform.
fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let mut u = 0.0_f64;
    let mut v = 0.0_f64;
    while u == 0.0 {
        u = rng.random();
    }
    while v == 0.0 {
        v = rng.random();
    }
    let z = (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos();
    mean + z * std
}

/// Sample one bot's per-match rate, clamped to the configured floor.
pub fn sample_rate<R: Rng + ?Sized>(rng: &mut R, params: PacingParams, floor: f64) -> f64 {
    sample_normal(rng, params.mean, params.std).max(floor)
}

/// Slowdown applied to bot pacing as configured puzzles grow.
///
/// Monotonically decreasing in the average puzzle size, so rooms playing
/// larger matrices see proportionally slower simulated competitors.
pub fn size_factor(settings: &Settings) -> f64 {
    2.0 / settings.average_size().max(2.0).powf(1.21)
}

/// Expected score for a bot after `t` ticks.
pub fn expected_score(rate: f64, factor: f64, t: u64) -> u32 {
    (rate * factor * t as f64).floor().max(0.0) as u32
}

/// Populate the bot roster up to room capacity, sampling rates once.
///
/// Names are drawn without replacement from a shuffled pool and reused
/// cyclically if the pool runs short of the roster size.
pub fn populate_bots<R: Rng + ?Sized>(rng: &mut R, config: &AppConfig, room: &mut RoomState) {
    let target = config.capacity.saturating_sub(room.human_count());
    let params = config.pacing(room.settings.difficulty);

    let mut names: Vec<&String> = config.bot_names.iter().collect();
    names.shuffle(rng);

    room.bots = (0..target)
        .map(|i| Bot {
            name: names[i % names.len()].clone(),
            rate: sample_rate(rng, params, config.min_bot_rate),
            score: 0,
            alive: true,
            last_score_tick: 0,
        })
        .collect();
}

/// Trim the roster so bots plus humans never exceed capacity.
///
/// Invoked at join, leave, and pre-start transitions; filling only happens at
/// match start so rates stay sampled-once.
pub fn reconcile_bots(config: &AppConfig, room: &mut RoomState) {
    let target = config.capacity.saturating_sub(room.human_count());
    if room.bots.len() > target {
        room.bots.truncate(target);
    }
}

/// Raise each living bot to its expected score for the current tick.
pub fn advance_bots(room: &mut RoomState) {
    let factor = size_factor(&room.settings);
    let t = room.t;
    for bot in room.bots.iter_mut().filter(|b| b.alive) {
        let expected = expected_score(bot.rate, factor, t);
        if expected > bot.score {
            bot.score = expected;
            bot.last_score_tick = t;
        }
    }
}
