//! Application-level configuration loading, including pacing and cut schedules.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::room::Difficulty;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "EIGENMAC_BACK_CONFIG_PATH";

/// Ticks at which elimination cuts fire during a battle match.
const DEFAULT_CUT_TIMES: [u64; 9] = [20, 33, 47, 57, 67, 80, 93, 107, 120];
/// Percentage of the living pool kept at each matching cut checkpoint.
const DEFAULT_CUT_KEEPS: [u8; 9] = [80, 60, 50, 40, 30, 20, 15, 10, 5];

/// Name pool simulated competitors draw from (shuffled per match).
const DEFAULT_BOT_NAMES: [&str; 30] = [
    "Marla Kingsley",
    "Devon Pike",
    "Avery Holt",
    "Rowan Hale",
    "Sloan Mercer",
    "Quinn Calder",
    "Talia Wren",
    "Elias Brook",
    "Nora Voss",
    "Milo Hart",
    "Juno Vale",
    "Sasha Reed",
    "Iris Dane",
    "Luca Frost",
    "Remy Clarke",
    "Vera Lane",
    "Alden Cross",
    "Mae Lennox",
    "Zara Finch",
    "Theo Black",
    "Aria Knox",
    "Kian Rhodes",
    "Elise Gray",
    "Bram Noble",
    "Skye Arden",
    "Mira Holt",
    "Gideon Park",
    "Lyra Stone",
    "Owen Vale",
    "Hazel Quinn",
];

/// Mean/standard deviation of a bot's per-tick scoring rate.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PacingParams {
    /// Expected score gained per tick before the size factor applies.
    pub mean: f64,
    /// Spread of the sampled per-match rate.
    pub std: f64,
}

/// One scheduled elimination checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct CutCheckpoint {
    /// Tick at which the cut fires.
    pub at: u64,
    /// Percentage of the living pool that survives the cut.
    pub keep_percent: u8,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum competitors per room, humans and bots combined.
    pub capacity: usize,
    /// Real-time duration of one simulation tick.
    pub tick_interval: Duration,
    /// Fixed match length, in ticks, for battle mode.
    pub battle_duration: u64,
    /// Idle time after which unstarted rooms and reconnect tokens expire.
    pub idle_ttl: Duration,
    /// Interval between housekeeping sweeps.
    pub sweep_interval: Duration,
    /// Maximum chat messages retained per room.
    pub chat_history: usize,
    /// Maximum entries in a broadcast leaderboard.
    pub leaderboard_size: usize,
    /// Lower bound for sampled bot pacing rates.
    pub min_bot_rate: f64,
    /// Ordered elimination checkpoints applied in battle mode.
    pub cuts: Vec<CutCheckpoint>,
    /// Names assigned to simulated competitors.
    pub bot_names: Vec<String>,
    easy: PacingParams,
    medium: PacingParams,
    hard: PacingParams,
    improbable: PacingParams,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Pacing parameters for the given difficulty tier.
    pub fn pacing(&self, difficulty: Difficulty) -> PacingParams {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
            Difficulty::Improbable => self.improbable,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// On-disk configuration shape; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    capacity: Option<usize>,
    tick_interval_ms: Option<u64>,
    battle_duration: Option<u64>,
    idle_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    chat_history: Option<usize>,
    leaderboard_size: Option<usize>,
    min_bot_rate: Option<f64>,
    cut_times: Option<Vec<u64>>,
    cut_keep_percents: Option<Vec<u8>>,
    bot_names: Option<Vec<String>>,
    easy: Option<PacingParams>,
    medium: Option<PacingParams>,
    hard: Option<PacingParams>,
    improbable: Option<PacingParams>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let cut_times = raw.cut_times.unwrap_or_else(|| DEFAULT_CUT_TIMES.to_vec());
        let cut_keeps = raw
            .cut_keep_percents
            .unwrap_or_else(|| DEFAULT_CUT_KEEPS.to_vec());
        if cut_times.len() != cut_keeps.len() {
            warn!(
                times = cut_times.len(),
                keeps = cut_keeps.len(),
                "cut schedule lengths differ; extra entries are ignored"
            );
        }
        let cuts = cut_times
            .into_iter()
            .zip(cut_keeps)
            .map(|(at, keep_percent)| CutCheckpoint { at, keep_percent })
            .collect();

        let bot_names = raw
            .bot_names
            .filter(|names| !names.is_empty())
            .unwrap_or_else(|| DEFAULT_BOT_NAMES.iter().map(|s| s.to_string()).collect());

        Self {
            capacity: raw.capacity.unwrap_or(100),
            tick_interval: Duration::from_millis(raw.tick_interval_ms.unwrap_or(1_000)),
            battle_duration: raw.battle_duration.unwrap_or(120),
            idle_ttl: Duration::from_secs(raw.idle_ttl_secs.unwrap_or(600)),
            sweep_interval: Duration::from_secs(raw.sweep_interval_secs.unwrap_or(60)),
            chat_history: raw.chat_history.unwrap_or(50),
            leaderboard_size: raw.leaderboard_size.unwrap_or(20),
            min_bot_rate: raw.min_bot_rate.unwrap_or(0.02),
            cuts,
            bot_names,
            easy: raw.easy.unwrap_or(PacingParams {
                mean: 0.07,
                std: 0.03,
            }),
            medium: raw.medium.unwrap_or(PacingParams {
                mean: 0.10,
                std: 0.04,
            }),
            hard: raw.hard.unwrap_or(PacingParams {
                mean: 0.13,
                std: 0.05,
            }),
            improbable: raw.improbable.unwrap_or(PacingParams {
                mean: 0.17,
                std: 0.06,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_cut_schedule_aligned() {
        let config = AppConfig::default();
        assert_eq!(config.cuts.len(), DEFAULT_CUT_TIMES.len());
        assert_eq!(config.cuts[0].at, 20);
        assert_eq!(config.cuts[0].keep_percent, 80);
        assert_eq!(config.cuts.last().unwrap().keep_percent, 5);
    }

    #[test]
    fn mismatched_schedule_is_truncated() {
        let raw = RawConfig {
            cut_times: Some(vec![10, 20, 30]),
            cut_keep_percents: Some(vec![50, 25]),
            ..RawConfig::default()
        };
        let config: AppConfig = raw.into();
        assert_eq!(config.cuts.len(), 2);
        assert_eq!(config.cuts[1].at, 20);
    }

    #[test]
    fn empty_bot_pool_falls_back_to_defaults() {
        let raw = RawConfig {
            bot_names: Some(Vec::new()),
            ..RawConfig::default()
        };
        let config: AppConfig = raw.into();
        assert_eq!(config.bot_names.len(), DEFAULT_BOT_NAMES.len());
    }
}
